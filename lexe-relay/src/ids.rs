//! Identifiers for a single relay instance.

use std::fmt;

use common::ln::payments::LxPaymentHash;
use lightning::ln::channelmanager::PaymentId;

/// Opaque unique identifier for a whole relay instance.
///
/// A relay instance's id doubles as the [`PaymentId`] of the outbound
/// payment it spawns: LDK already recommends using the payment hash as the
/// `PaymentId` for a forwarded payment, and since exactly one relay instance
/// exists per `(payment_hash, payment_secret)` for the instance's lifetime,
/// reusing the inbound hash avoids minting a second identifier space.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct RelayId(LxPaymentHash);

impl RelayId {
    pub fn new(payment_hash: LxPaymentHash) -> Self {
        Self(payment_hash)
    }

    pub fn payment_hash(&self) -> LxPaymentHash {
        self.0
    }
}

impl fmt::Debug for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayId({})", self.0)
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RelayId> for PaymentId {
    fn from(id: RelayId) -> Self {
        id.0.into()
    }
}
