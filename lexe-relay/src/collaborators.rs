//! Narrow traits for every external collaborator named in §1/§6: the
//! channel register, the outbound payment executor, the async-payment
//! triggerer, the blinded-path resolver, and the event bus.
//!
//! These are intentionally thin "trait alias"-style seams, in the same
//! spirit as the teacher's `LexeChannelManager`/`LexePersister` traits:
//! the relay core is generic over them so it can be driven against mocks in
//! tests without pulling in a concrete channel manager or router.

use async_trait::async_trait;
use common::ln::{
    amount::Amount, node_id::{LxChannelId, NodePk}, payments::LxPaymentPreimage, route::LxRoute,
};

use crate::{
    dispatch::SendPaymentConfig,
    events::RelayEvent,
    failure::{DownstreamFailure, UpstreamFailure},
    htlc::HtlcId,
    instructions::CompactBlindedPath,
    ids::RelayId,
};

/// The current chain tip, as seen by this node. Validation (§4.2 check 3)
/// and the default `IncorrectOrUnknownPaymentDetails` failure reason (§4.5)
/// both need the current block height; this is the narrow seam for it
/// instead of threading a full chain-sync collaborator through the core.
pub trait ChainTip: Send + Sync {
    fn current_height(&self) -> u32;
}

/// Events the incoming MPP aggregator reports back to the relay (§6
/// "Aggregator events").
///
/// `ExtraPart` means a part was pushed and accepted but the set is still
/// incomplete: no state transition follows. `Failed`/`Succeeded` close the
/// set and drive the big `Receiving` → `{Stopping | ...}` transition.
#[derive(Clone, Debug)]
pub enum AggregatorEvent {
    ExtraPart,
    Failed { reason: UpstreamFailure },
    Succeeded,
}

/// A handle to the incoming MPP aggregator the relay instance owns
/// (§2 "a reference to an incoming MPP aggregator").
///
/// `push` is non-blocking (§5 "no blocking I/O occurs inside the relay");
/// the aggregator's response to a pushed part arrives later via `recv`.
#[async_trait]
pub trait AggregatorHandle: Send {
    fn push(&mut self, htlc: crate::htlc::IncomingHtlcRecord);

    async fn recv(&mut self) -> AggregatorEvent;
}

/// The channel register: owns the live channels and is the only way to
/// actually fulfill or fail an upstream HTLC.
///
/// Implementations are expected to route these calls through a persistent
/// pending-commands store with safe-send/dedup-by-`(channel_id, htlc_id)`
/// semantics (§4.5); this trait only states *what* must eventually happen,
/// not how durability is achieved.
#[async_trait]
pub trait UpstreamRegister: Send + Sync {
    async fn fulfill_htlc(
        &self,
        channel_id: LxChannelId,
        htlc_id: HtlcId,
        preimage: LxPaymentPreimage,
    );

    async fn fail_htlc(
        &self,
        channel_id: LxChannelId,
        htlc_id: HtlcId,
        reason: UpstreamFailure,
    );
}

/// Events the outbound payment executor reports back to the relay once
/// spawned (§6 "Outbound executor events").
#[derive(Clone, Debug)]
pub enum ExecutorEvent {
    PreimageReceived(LxPaymentPreimage),
    PaymentSent {
        preimage: LxPaymentPreimage,
        parts: Vec<Amount>,
        recipient_node_id: NodePk,
        recipient_amount: Amount,
    },
    PaymentFailed { failures: Vec<DownstreamFailure> },
}

/// A handle to a spawned outbound executor: a stream of at most one
/// `PreimageReceived` followed by exactly one of `PaymentSent`/`PaymentFailed`
/// (the executor's own lifecycle guarantee; this trait just consumes it).
#[async_trait]
pub trait OutboundExecutorHandle: Send {
    async fn recv(&mut self) -> Option<ExecutorEvent>;
}

/// Spawns either a single-part or multi-part outbound payment executor,
/// selected per §4.3's recipient/multi-part table.
#[async_trait]
pub trait OutboundExecutorFactory: Send + Sync {
    type Handle: OutboundExecutorHandle;

    async fn spawn(
        &self,
        relay_id: RelayId,
        config: SendPaymentConfig,
        multi_part: bool,
    ) -> Self::Handle;
}

/// Events the async-payment triggerer reports after being asked to `watch`
/// an outgoing node for payment-readiness (§6 "Async-trigger events").
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerEvent {
    Triggered,
    Timeout,
    Canceled,
}

/// A handle yielding exactly one [`TriggerEvent`].
#[async_trait]
pub trait TriggerHandle: Send {
    async fn recv(self) -> TriggerEvent;
}

/// Watches an outgoing node for payment-readiness, bounded by a deadline
/// block height (§4.1 WaitingForAsyncTrigger, §5 "Cancellation and
/// timeouts").
#[async_trait]
pub trait AsyncPaymentTriggerer: Send + Sync {
    type Handle: TriggerHandle;

    async fn watch(
        &self,
        outgoing_node_id: NodePk,
        relay_id: RelayId,
        deadline_block: u32,
    ) -> Self::Handle;
}

/// A handle yielding the (possibly empty) resolved set of blinded-path
/// routes.
#[async_trait]
pub trait ResolveHandle: Send {
    async fn recv(self) -> Vec<LxRoute>;
}

/// Resolves compact blinded-path references from the onion into full,
/// routable [`LxRoute`]s (§4.1 ResolvingBlindedPaths).
#[async_trait]
pub trait BlindedPathResolver: Send + Sync {
    type Handle: ResolveHandle;

    async fn resolve(
        &self,
        compact_paths: Vec<CompactBlindedPath>,
    ) -> Self::Handle;
}

/// Write-only event bus the core publishes domain events to (§4.6).
/// Grounded in the teacher's `EventsBus<T>` broadcast wrapper.
pub trait RelayEventBus: Send + Sync {
    fn publish(&self, event: RelayEvent);
}
