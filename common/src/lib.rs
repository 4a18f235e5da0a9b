//! The `common` crate contains Bitcoin / Lightning newtypes and small
//! standalone utilities shared between the relay core and its tests.

/// Hex encode/decode utilities.
pub mod hex;
/// Bitcoin / Lightning newtypes: amounts, payment ids, routes.
pub mod ln;
/// Cryptographically secure random number generation.
pub mod rng;
/// Shared `#[serde(with = "...")]` helper modules.
pub mod serde_helpers;
/// `TimestampMs`.
pub mod time;
