//! Node-supplied policy knobs the relay's validation and dispatch logic
//! (§4.2/§4.3) are parameterized over, so fee/expiry policy can be tuned
//! without touching the state machine.

use common::ln::amount::Amount;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The minimum trampoline fee this node charges to forward a given amount,
/// expressed the same way LDK expresses routing fees: a flat base plus a
/// proportional component (in millionths of the forwarded amount).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MinFeeSchedule {
    pub base: Amount,
    pub proportional_millionths: u64,
}

impl MinFeeSchedule {
    pub fn flat(base: Amount) -> Self {
        Self {
            base,
            proportional_millionths: 0,
        }
    }

    /// The minimum acceptable fee for forwarding `amount_to_forward`.
    pub fn min_fee(&self, amount_to_forward: Amount) -> Amount {
        let proportional = amount_to_forward
            * (Decimal::from(self.proportional_millionths) / dec!(1_000_000));
        self.base + proportional
    }
}

/// Policy configuration for one node's trampoline relay behavior.
#[derive(Copy, Clone, Debug)]
pub struct RelayConfig {
    /// Minimum `expiry_in − outgoing_cltv` this node requires before it will
    /// forward a payment (§4.2 check 2).
    pub channel_expiry_delta: u32,
    /// This node's minimum acceptable trampoline fee schedule (§4.2 check 1).
    pub min_trampoline_fee: MinFeeSchedule,
    /// Maximum number of outbound payment attempts the executor may make
    /// before giving up (§4.3's `SendPaymentConfig::max_payment_attempts`).
    pub max_payment_attempts: usize,
    /// How long before the binding upstream expiry the async-payment hold
    /// must cancel itself, regardless of the hold-timeout-from-now bound
    /// (§5 "Cancellation and timeouts").
    pub async_payment_cancel_safety_delta: u32,
    /// How many blocks from now the async-payment hold-timeout bound is set
    /// to, before the cancel-safety-delta clamp is applied (§5).
    pub async_payment_hold_timeout_blocks: u32,
    /// Whether this node advertises the async-payment feature. A
    /// `ToTrampoline` relay only enters `WaitingForAsyncTrigger` when both
    /// the instructions ask for it *and* this is true (§4.1); otherwise an
    /// `is_async_payment` request is simply ignored and sent immediately.
    pub async_payments_supported: bool,
}

impl RelayConfig {
    #[cfg(any(test, feature = "test-utils"))]
    pub fn test_default() -> Self {
        Self {
            channel_expiry_delta: 40,
            min_trampoline_fee: MinFeeSchedule::flat(Amount::from_msat(1_000)),
            max_payment_attempts: 3,
            async_payment_cancel_safety_delta: 6,
            async_payment_hold_timeout_blocks: 144,
            async_payments_supported: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_fee_schedule_ignores_amount() {
        let schedule = MinFeeSchedule::flat(Amount::from_msat(1_000));
        assert_eq!(
            schedule.min_fee(Amount::from_msat(990_000)),
            Amount::from_msat(1_000)
        );
        assert_eq!(
            schedule.min_fee(Amount::from_msat(999_990)),
            Amount::from_msat(1_000)
        );
    }
}
