//! Public domain events published to [`RelayEventBus`](crate::collaborators::RelayEventBus)
//! (§4.6), for observers such as a UI or an admin API — not consumed by the
//! relay state machine itself.

use common::ln::{amount::Amount, node_id::NodePk, payments::LxPaymentHash};

/// Published once a relay instance has an aggregated upstream set and valid
/// instructions and is about to dispatch the outbound payment (or, for an
/// async-payment hold, once it starts waiting on the trigger).
#[derive(Clone, Debug)]
pub struct WaitingToRelayPayment {
    pub outgoing_node_id: NodePk,
    pub payment_hash: LxPaymentHash,
}

/// Published once a trampoline relay completes successfully: the upstream
/// HTLCs are fulfilled and the outbound payment is settled.
#[derive(Clone, Debug)]
pub struct TrampolinePaymentRelayed {
    pub payment_hash: LxPaymentHash,
    pub incoming_parts: Vec<Amount>,
    pub outgoing_parts: Vec<Amount>,
    pub recipient_node_id: NodePk,
    pub recipient_amount: Amount,
}

/// The full set of domain events a relay instance may publish over its
/// lifetime.
#[derive(Clone, Debug)]
pub enum RelayEvent {
    WaitingToRelayPayment(WaitingToRelayPayment),
    TrampolinePaymentRelayed(TrampolinePaymentRelayed),
}

/// The production [`RelayEventBus`](crate::collaborators::RelayEventBus):
/// a broadcast bus any number of observers (a UI, an admin API) can
/// subscribe to, grounded in the teacher's `EventsBus<T>` (§4.6, §9 "Message
/// adapters" — this is the narrow typed event surface the core exposes
/// rather than its internal state-machine variants).
impl crate::collaborators::RelayEventBus for lexe_tokio::events_bus::EventsBus<RelayEvent> {
    fn publish(&self, event: RelayEvent) {
        self.notify(event);
    }
}
