//! The trampoline node-relay core: receives an inbound multi-part HTLC set
//! addressed to this node as a trampoline hop, validates the embedded relay
//! instructions, and dispatches an outbound payment that carries the funds
//! one hop further along the trampoline chain (or to a non-trampoline
//! recipient, clear or blinded).
//!
//! Onion parsing, the multi-part receive FSM, the outbound payment lifecycle
//! FSM, the router, the channel register, persistence of pending commands,
//! the event bus, metrics, the blinded-path resolver, the async-payment
//! triggerer, and the parent supervisor that spawns/stops per-payment relay
//! actors are all external collaborators with the narrow interfaces defined
//! in [`collaborators`].

/// Narrow traits for every external collaborator the relay core depends on.
pub mod collaborators;
/// Node-supplied policy knobs (fee schedule, expiry delta, async-payment
/// support) the relay's validation and dispatch logic are parameterized
/// over.
pub mod config;
/// Outbound dispatch: route-search bounds, recipient selection, and
/// `SendPaymentConfig` assembly.
pub mod dispatch;
/// Domain events published to the event bus.
pub mod events;
/// Upstream-visible BOLT-4 failures and downstream-failure translation.
pub mod failure;
/// Inbound HTLCs and the accumulated upstream set they form.
pub mod htlc;
/// Identifiers for a single relay instance.
pub mod ids;
/// The decrypted inner relay payload handed in by the onion layer.
pub mod instructions;
/// Metrics emitted over a relay instance's lifetime.
pub mod metrics;
/// The per-payment relay state machine: the core of this crate.
pub mod relay;
/// Upstream HTLC settlement: fulfill, fail, and the stray-HTLC path.
pub mod settlement;
/// Relay/fee/expiry validation.
pub mod validation;

pub use ids::RelayId;
pub use relay::{NodeRelayPacket, Relay, RelayComplete, RelayMsg};
