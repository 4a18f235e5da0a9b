//! Upstream settlement (§4.5): fulfilling or failing the accumulated inbound
//! HTLC set, and the stray single-HTLC rejection path.

use common::ln::{amount::Amount, payments::LxPaymentPreimage};

use crate::{
    collaborators::{ChainTip, UpstreamRegister},
    failure::UpstreamFailure,
    htlc::{IncomingHtlcRecord, UpstreamSet},
};

/// Fulfills every HTLC in `upstream` with `preimage` (§4.5 "Fulfill").
///
/// The register is expected to persist-then-send under the hood (§5
/// "Upstream settlement commands are persisted before being handed to the
/// register"); this helper only states which HTLCs get which command.
pub async fn fulfill_all(
    register: &impl UpstreamRegister,
    upstream: &UpstreamSet,
    preimage: LxPaymentPreimage,
) {
    for htlc in upstream.htlcs() {
        register
            .fulfill_htlc(htlc.channel_id, htlc.htlc_id, preimage)
            .await;
    }
}

/// Fails every HTLC in `upstream` with `reason` (§4.5 "Fail").
pub async fn fail_all(
    register: &impl UpstreamRegister,
    upstream: &UpstreamSet,
    reason: UpstreamFailure,
) {
    for htlc in upstream.htlcs() {
        register
            .fail_htlc(htlc.channel_id, htlc.htlc_id, reason.clone())
            .await;
    }
}

/// Fails a single late-arriving HTLC after the set was already closed (§4.5
/// "Extra HTLC"), leaving the rest of the relay unaffected.
pub async fn fail_stray(
    register: &impl UpstreamRegister,
    htlc: &IncomingHtlcRecord,
    chain_tip: &impl ChainTip,
) {
    let reason = UpstreamFailure::incorrect_or_unknown_payment_details(
        htlc.amount,
        chain_tip.current_height(),
    );
    register.fail_htlc(htlc.channel_id, htlc.htlc_id, reason).await;
}

/// The default upstream failure reason when none is supplied by the
/// aggregator or downstream executor, e.g. an MPP-aggregation timeout
/// (§4.5 "Default reason").
pub fn default_timeout_reason(amount_in: Amount, current_block_height: u32) -> UpstreamFailure {
    UpstreamFailure::incorrect_or_unknown_payment_details(amount_in, current_block_height)
}
