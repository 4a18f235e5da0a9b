//! Inbound HTLCs and the accumulated set they form for one relay instance.

use common::{
    ln::{amount::Amount, node_id::LxChannelId},
    time::TimestampMs,
};

/// The id LDK assigns an HTLC on a specific channel. Combined with
/// [`LxChannelId`], `(channel_id, htlc_id)` uniquely identifies an HTLC for
/// the lifetime of the channel, which is exactly the dedup key the
/// pending-commands store's safe-send interface uses (§4.5/§5).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HtlcId(pub u64);

/// One inbound HTLC belonging to this relay instance's MPP set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IncomingHtlcRecord {
    pub htlc_id: HtlcId,
    pub channel_id: LxChannelId,
    pub amount: Amount,
    pub cltv_expiry: u32,
    pub received_at_ms: TimestampMs,
}

/// The accumulated set of inbound HTLCs for one relay instance, in arrival
/// order.
///
/// The aggregator (an external collaborator, out of scope) is the authority
/// on *completeness*; this type is a plain accumulator the relay appends to
/// as HTLCs arrive and reads from once the aggregator reports success or
/// failure.
#[derive(Clone, Debug, Default)]
pub struct UpstreamSet {
    htlcs: Vec<IncomingHtlcRecord>,
}

impl UpstreamSet {
    pub fn new() -> Self {
        Self { htlcs: Vec::new() }
    }

    pub fn push(&mut self, htlc: IncomingHtlcRecord) {
        self.htlcs.push(htlc);
    }

    pub fn htlcs(&self) -> &[IncomingHtlcRecord] {
        &self.htlcs
    }

    pub fn is_empty(&self) -> bool {
        self.htlcs.is_empty()
    }

    /// The total amount received across every HTLC in the set.
    pub fn amount_in(&self) -> Amount {
        self.htlcs.iter().map(|htlc| htlc.amount).sum()
    }

    /// The minimum `cltv_expiry` across every HTLC in the set: the binding
    /// constraint for how much expiry delta the relay can offer downstream.
    ///
    /// Returns `None` for an empty set; callers only call this once the
    /// aggregator has reported a non-empty, complete set.
    pub fn expiry_in(&self) -> Option<u32> {
        self.htlcs.iter().map(|htlc| htlc.cltv_expiry).min()
    }
}

#[cfg(test)]
mod test {
    use common::ln::amount::Amount;

    use super::*;

    fn htlc(amount_sat: u64, cltv_expiry: u32) -> IncomingHtlcRecord {
        IncomingHtlcRecord {
            htlc_id: HtlcId(0),
            channel_id: LxChannelId::new([0u8; 32]),
            amount: Amount::from_sats_u32(amount_sat as u32),
            cltv_expiry,
            received_at_ms: TimestampMs::from(0u32),
        }
    }

    #[test]
    fn amount_in_sums_all_parts() {
        let mut set = UpstreamSet::new();
        set.push(htlc(600, 900));
        set.push(htlc(400, 950));
        assert_eq!(set.amount_in(), Amount::from_sats_u32(1_000));
    }

    #[test]
    fn expiry_in_is_the_minimum() {
        let mut set = UpstreamSet::new();
        set.push(htlc(600, 950));
        set.push(htlc(400, 900));
        assert_eq!(set.expiry_in(), Some(900));
    }

    #[test]
    fn empty_set_has_no_expiry() {
        let set = UpstreamSet::new();
        assert_eq!(set.expiry_in(), None);
    }
}
