//! Relay/fee/expiry validation (§4.2). The first failing check determines
//! the returned message, so order matters.

use common::ln::amount::Amount;

use crate::{config::RelayConfig, failure::UpstreamFailure, instructions::RelayInstructions};

/// The subset of the accumulated [`UpstreamSet`](crate::htlc::UpstreamSet)
/// validation needs: the total amount received and the binding (minimum)
/// expiry across all inbound HTLCs.
#[derive(Copy, Clone, Debug)]
pub struct UpstreamTotals {
    pub amount_in: Amount,
    pub expiry_in: u32,
}

/// Validates a complete, aggregated inbound set against the relay
/// instructions it's paired with, per §4.2's five checks (in order).
pub fn validate(
    upstream: UpstreamTotals,
    instructions: &RelayInstructions,
    config: &RelayConfig,
    current_block_height: u32,
) -> Result<(), UpstreamFailure> {
    let amount_to_forward = instructions.amount_to_forward();
    let outgoing_cltv = instructions.outgoing_cltv();

    // 1. Fee sufficiency.
    let offered_fee = upstream
        .amount_in
        .checked_sub(amount_to_forward)
        .ok_or(UpstreamFailure::TrampolineFeeInsufficient)?;
    let min_fee = config.min_trampoline_fee.min_fee(amount_to_forward);
    if offered_fee < min_fee {
        return Err(UpstreamFailure::TrampolineFeeInsufficient);
    }

    // 2. Expiry delta sufficiency.
    let expiry_delta = upstream.expiry_in.checked_sub(outgoing_cltv);
    match expiry_delta {
        Some(delta) if delta >= config.channel_expiry_delta => {}
        _ => return Err(UpstreamFailure::TrampolineExpiryTooSoon),
    }

    // 3. Outgoing CLTV not in the past.
    if outgoing_cltv <= current_block_height {
        return Err(UpstreamFailure::TrampolineExpiryTooSoon);
    }

    // 4. Positive forward amount.
    if amount_to_forward == Amount::ZERO {
        return Err(UpstreamFailure::InvalidOnionPayload { tag: 2, offset: 0 });
    }

    // 5. Payment-secret presence for non-trampoline (clear) forwarding.
    if let RelayInstructions::ToTrampoline {
        invoice_features: Some(_),
        payment_secret: None,
        ..
    } = instructions
    {
        return Err(UpstreamFailure::InvalidOnionPayload { tag: 8, offset: 0 });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use common::ln::{node_id::NodePk, payments::LxPaymentSecret};

    use super::*;

    fn node_pk() -> NodePk {
        use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x44; 32]).unwrap();
        NodePk(PublicKey::from_secret_key(&secp, &sk))
    }

    fn trampoline(
        amount_to_forward: Amount,
        outgoing_cltv: u32,
    ) -> RelayInstructions {
        RelayInstructions::ToTrampoline {
            outgoing_node_id: node_pk(),
            amount_to_forward,
            outgoing_cltv,
            invoice_features: None,
            invoice_routing_info: None,
            payment_secret: None,
            payment_metadata: None,
            is_async_payment: false,
            next_onion_packet: None,
        }
    }

    /// S1: 1_000_000 msat total, forwards 990_000 msat at H+80.
    #[test]
    fn s1_happy_path_validates() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 880, // H+80 relative to current=800, delta>=40
        };
        let instructions = trampoline(Amount::from_msat(990_000), 840);
        let result = validate(upstream, &instructions, &config, 800);
        assert!(result.is_ok());
    }

    /// S2: forwards 999_990 msat (fee 10 msat) with min fee 1_000 msat.
    #[test]
    fn s2_insufficient_fee_rejected() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        };
        let instructions = trampoline(Amount::from_msat(999_990), 840);
        let result = validate(upstream, &instructions, &config, 800);
        assert_eq!(result, Err(UpstreamFailure::TrampolineFeeInsufficient));
    }

    /// S3: expiry_in = H+50, outgoing_cltv = H+40, channel_expiry_delta=40.
    #[test]
    fn s3_expiry_too_soon_rejected() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 850, // H+50 where H=800
        };
        let instructions = trampoline(Amount::from_msat(990_000), 840); // H+40
        let result = validate(upstream, &instructions, &config, 800);
        assert_eq!(result, Err(UpstreamFailure::TrampolineExpiryTooSoon));
    }

    #[test]
    fn outgoing_cltv_in_the_past_is_expiry_too_soon() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        };
        let instructions = trampoline(Amount::from_msat(990_000), 800);
        let result = validate(upstream, &instructions, &config, 800);
        assert_eq!(result, Err(UpstreamFailure::TrampolineExpiryTooSoon));
    }

    #[test]
    fn zero_forward_amount_is_invalid_onion_payload() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        };
        let instructions = trampoline(Amount::ZERO, 840);
        let result = validate(upstream, &instructions, &config, 800);
        assert_eq!(
            result,
            Err(UpstreamFailure::InvalidOnionPayload { tag: 2, offset: 0 })
        );
    }

    #[test]
    fn missing_payment_secret_for_clear_recipient_is_invalid_onion_payload() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        };
        let instructions = RelayInstructions::ToTrampoline {
            outgoing_node_id: node_pk(),
            amount_to_forward: Amount::from_msat(990_000),
            outgoing_cltv: 840,
            invoice_features: Some(crate::instructions::InvoiceFeatures {
                basic_mpp: true,
            }),
            invoice_routing_info: None,
            payment_secret: None,
            payment_metadata: None,
            is_async_payment: false,
            next_onion_packet: None,
        };
        let result = validate(upstream, &instructions, &config, 800);
        assert_eq!(
            result,
            Err(UpstreamFailure::InvalidOnionPayload { tag: 8, offset: 0 })
        );
    }

    #[test]
    fn present_payment_secret_for_clear_recipient_passes_check_5() {
        let config = RelayConfig::test_default();
        let upstream = UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        };
        let instructions = RelayInstructions::ToTrampoline {
            outgoing_node_id: node_pk(),
            amount_to_forward: Amount::from_msat(990_000),
            outgoing_cltv: 840,
            invoice_features: Some(crate::instructions::InvoiceFeatures {
                basic_mpp: true,
            }),
            invoice_routing_info: None,
            payment_secret: Some(LxPaymentSecret::new([0xAA; 32])),
            payment_metadata: None,
            is_async_payment: false,
            next_onion_packet: None,
        };
        let result = validate(upstream, &instructions, &config, 800);
        assert!(result.is_ok());
    }
}
