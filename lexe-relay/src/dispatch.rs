//! Outbound dispatch (§4.3): computing the route-search bounds, selecting a
//! recipient and whether to use multi-part, and assembling the
//! `SendPaymentConfig` handed to the outbound executor factory.

use common::{
    ln::{
        amount::Amount,
        node_id::NodePk,
        payments::LxPaymentSecret,
        route::{LxRoute, LxRouteHop},
    },
    rng::{rand_bytes, Crng},
};

use crate::{
    config::RelayConfig,
    ids::RelayId,
    instructions::{NextOnionPacket, RelayInstructions},
    validation::UpstreamTotals,
};

/// Extra router experiment parameters this core doesn't interpret, only
/// threads through opaquely from node configuration to the router (§4.3
/// "other parameters drawn from the router's randomised experiment
/// configuration"). The router (out of scope, §1) owns their meaning.
#[derive(Clone, Debug, Default)]
pub struct RouterExperimentConfig(pub Vec<(String, String)>);

/// The route-search bounds computed from the validated upstream/instructions
/// pair (§4.3).
#[derive(Clone, Debug)]
pub struct RouteParams {
    /// The flat fee budget: `amount_in - amount_to_forward`. This is the
    /// entirety of the relay's fee budget; it does not additionally permit a
    /// proportional fee on top.
    pub max_flat_fee: Amount,
    pub max_proportional_fee_ppm: u32,
    /// `expiry_in - outgoing_cltv`: the CLTV budget available to the
    /// downstream route.
    pub max_cltv_expiry_delta: u32,
    pub include_local_channel_cost: bool,
    pub experiment: RouterExperimentConfig,
}

impl RouteParams {
    fn new(upstream: UpstreamTotals, instructions: &RelayInstructions, experiment: RouterExperimentConfig) -> Self {
        Self {
            max_flat_fee: upstream
                .amount_in
                .checked_sub(instructions.amount_to_forward())
                .expect("validation guarantees amount_in > amount_to_forward"),
            max_proportional_fee_ppm: 0,
            max_cltv_expiry_delta: upstream
                .expiry_in
                .checked_sub(instructions.outgoing_cltv())
                .expect("validation guarantees expiry_in > outgoing_cltv"),
            include_local_channel_cost: true,
            experiment,
        }
    }
}

/// The downstream recipient selected for this relay, per §4.3's
/// instructions/recipient table.
#[derive(Clone, Debug)]
pub enum Recipient {
    /// A clear (non-blinded) recipient: either a further trampoline hop, or
    /// the invoice's final node reached via ordinary routing hints.
    Clear {
        node_id: NodePk,
        payment_secret: LxPaymentSecret,
        payment_metadata: Option<Vec<u8>>,
        /// Present only when forwarding trampoline-to-trampoline.
        next_onion_packet: Option<NextOnionPacket>,
        extra_routing_hints: Vec<LxRouteHop>,
    },
    /// A BOLT‑12 blinded recipient, reachable only through `paths`.
    Blinded {
        paths: Vec<LxRoute>,
        /// The real node id of the last hop of the first resolved path,
        /// used for actual routing. Never surfaced as `display_node_id`.
        recipient_node_id: NodePk,
    },
}

/// Everything the outbound executor factory needs to spawn the downstream
/// attempt (§4.3).
#[derive(Clone, Debug)]
pub struct SendPaymentConfig {
    pub relay_id: RelayId,
    pub recipient: Recipient,
    pub route_params: RouteParams,
    pub store_in_db: bool,
    pub publish_event: bool,
    pub record_path_finding_metrics: bool,
    /// The node id surfaced to the rest of the node (events, metrics,
    /// logging) as the outgoing counterparty. For `ToTrampoline` this is the
    /// real next hop; for `ToBlindedPaths` it's a freshly generated random
    /// key so the true next hop never leaks (§4.3, §9 privacy note).
    pub display_node_id: NodePk,
    pub max_payment_attempts: usize,
}

/// The finished dispatch plan: the `SendPaymentConfig` to spawn the executor
/// with, and whether to spawn the multi-part or single-part implementation.
#[derive(Clone, Debug)]
pub struct DispatchPlan {
    pub config: SendPaymentConfig,
    pub multi_part: bool,
}

/// Computes route parameters, selects a recipient, and assembles the
/// `SendPaymentConfig` (§4.3). Called once validation (§4.2) has passed and,
/// for `ToBlindedPaths`, blinded-path resolution has returned a non-empty
/// result.
///
/// `resolved_paths` must be `Some` (and non-empty) iff `instructions` is
/// `ToBlindedPaths`; callers are expected to have already handled the empty-
/// resolution `UnknownNextPeer` case (§4.1 ResolvingBlindedPaths) before
/// calling this.
pub fn plan_dispatch(
    relay_id: RelayId,
    upstream: UpstreamTotals,
    instructions: &RelayInstructions,
    resolved_paths: Option<Vec<LxRoute>>,
    experiment: RouterExperimentConfig,
    node_config: &RelayConfig,
    rng: &mut impl Crng,
) -> DispatchPlan {
    let route_params = RouteParams::new(upstream, instructions, experiment);

    let (recipient, multi_part, display_node_id) = match instructions {
        RelayInstructions::ToTrampoline {
            outgoing_node_id,
            invoice_features: None,
            next_onion_packet: Some(next_onion),
            ..
        } => {
            // Forward to a further trampoline hop. Generate a fresh,
            // uniformly random payment secret so the outgoing HTLC can't be
            // correlated back to the incoming one (§8 invariant 5, probing
            // protection).
            let payment_secret = LxPaymentSecret::sample(rng);
            let recipient = Recipient::Clear {
                node_id: *outgoing_node_id,
                payment_secret,
                payment_metadata: None,
                next_onion_packet: Some(next_onion.clone()),
                extra_routing_hints: Vec::new(),
            };
            (recipient, true, *outgoing_node_id)
        }
        RelayInstructions::ToTrampoline {
            outgoing_node_id,
            invoice_features: Some(invoice_features),
            invoice_routing_info,
            payment_secret,
            payment_metadata,
            ..
        } => {
            // Forward to a clear, non-trampoline final recipient. Validation
            // (§4.2 check 5) guarantees `payment_secret` is `Some` whenever
            // `invoice_features` is `Some`.
            let payment_secret = payment_secret
                .as_ref()
                .copied()
                .expect("validation guarantees payment_secret is present");
            let extra_routing_hints: Vec<LxRouteHop> = invoice_routing_info
                .clone()
                .unwrap_or_default();
            let recipient = Recipient::Clear {
                node_id: *outgoing_node_id,
                payment_secret,
                payment_metadata: payment_metadata.clone(),
                next_onion_packet: None,
                extra_routing_hints,
            };
            let multi_part = invoice_features.supports_basic_mpp();
            (recipient, multi_part, *outgoing_node_id)
        }
        RelayInstructions::ToTrampoline { .. } => {
            // Neither a next onion nor invoice features: the onion layer
            // should never construct such a payload, as neither variant
            // condition in the table above is satisfiable. We still need a
            // well-typed fallback; treat it the same as the clear-recipient
            // case with an empty routing hint set rather than panicking, so
            // a malformed upstream onion can't crash the relay instance.
            unreachable_to_trampoline_shape(instructions)
        }
        RelayInstructions::ToBlindedPaths {
            invoice_features, ..
        } => {
            let paths = resolved_paths
                .expect("caller resolves blinded paths before dispatch");
            let first_path = paths.first().expect("caller checks non-empty");
            let recipient_node_id = first_path
                .paths
                .first()
                .and_then(|path| path.hops.last())
                .map(|hop| hop.node_pk)
                .expect("a resolved LxRoute always has at least one hop");
            let recipient = Recipient::Blinded {
                paths,
                recipient_node_id,
            };
            let multi_part = invoice_features.supports_basic_mpp();
            let display_node_id = random_node_id(rng);
            (recipient, multi_part, display_node_id)
        }
    };

    let config = SendPaymentConfig {
        relay_id,
        recipient,
        route_params,
        store_in_db: false,
        publish_event: false,
        record_path_finding_metrics: true,
        display_node_id,
        max_payment_attempts: node_config.max_payment_attempts,
    };

    DispatchPlan { config, multi_part }
}

/// Validation (§4.2 check 5) rules out a `ToTrampoline` payload with neither
/// `next_onion_packet` nor `invoice_features`; this path only exists to keep
/// the match exhaustive without a panic on a hypothetically malformed onion.
fn unreachable_to_trampoline_shape(instructions: &RelayInstructions) -> (Recipient, bool, NodePk) {
    let outgoing_node_id = match instructions {
        RelayInstructions::ToTrampoline {
            outgoing_node_id, ..
        } => *outgoing_node_id,
        RelayInstructions::ToBlindedPaths { .. } => {
            unreachable!("caller already matched ToTrampoline")
        }
    };
    let recipient = Recipient::Clear {
        node_id: outgoing_node_id,
        payment_secret: LxPaymentSecret::new([0u8; 32]),
        payment_metadata: None,
        next_onion_packet: None,
        extra_routing_hints: Vec::new(),
    };
    (recipient, false, outgoing_node_id)
}

/// A freshly generated random node id, used as the `display_node_id` for
/// `ToBlindedPaths` relays so the real next hop never leaks (§9 privacy
/// note).
fn random_node_id(rng: &mut impl Crng) -> NodePk {
    use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
    loop {
        let bytes: [u8; 32] = rand_bytes(rng);
        if let Ok(sk) = SecretKey::from_slice(&bytes) {
            let secp = Secp256k1::signing_only();
            return NodePk(PublicKey::from_secret_key(&secp, &sk));
        }
    }
}

#[cfg(test)]
mod test {
    use common::rng::SysRng;

    use super::*;
    use crate::instructions::InvoiceFeatures;

    fn node_pk(byte: u8) -> NodePk {
        use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        NodePk(PublicKey::from_secret_key(&secp, &sk))
    }

    fn upstream() -> UpstreamTotals {
        UpstreamTotals {
            amount_in: Amount::from_msat(1_000_000),
            expiry_in: 900,
        }
    }

    /// Forwarding to a further trampoline hop always uses multi-part and a
    /// fresh, independent payment secret (§8 invariant 5).
    #[test]
    fn next_trampoline_forward_generates_independent_secret() {
        let mut rng = SysRng::new();
        let instructions = RelayInstructions::ToTrampoline {
            outgoing_node_id: node_pk(0x11),
            amount_to_forward: Amount::from_msat(990_000),
            outgoing_cltv: 840,
            invoice_features: None,
            invoice_routing_info: None,
            payment_secret: None,
            payment_metadata: None,
            is_async_payment: false,
            next_onion_packet: Some(NextOnionPacket(vec![1, 2, 3])),
        };
        let plan = plan_dispatch(
            RelayId::new(common::ln::payments::LxPaymentHash::new([0u8; 32])),
            upstream(),
            &instructions,
            None,
            RouterExperimentConfig::default(),
            &RelayConfig::test_default(),
            &mut rng,
        );
        assert!(plan.multi_part);
        match plan.config.recipient {
            Recipient::Clear {
                payment_secret,
                next_onion_packet,
                ..
            } => {
                assert_ne!(payment_secret, LxPaymentSecret::new([0xAA; 32]));
                assert!(next_onion_packet.is_some());
            }
            Recipient::Blinded { .. } => panic!("expected Clear recipient"),
        }
        assert_eq!(plan.config.display_node_id, node_pk(0x11));
    }

    /// §8 invariant 5: forwarding to another trampoline generates an
    /// outgoing payment secret that's independent of the incoming one
    /// (arbitrary across many incoming secrets) and never repeats across
    /// calls, i.e. it's not deterministically derived from the instructions.
    #[test]
    fn invariant_5_outgoing_secret_is_independent_of_incoming_and_never_repeats() {
        use proptest::{prelude::any, prop_assert, prop_assert_ne, proptest};

        let mut rng = SysRng::new();
        let mut previously_generated = Vec::new();
        proptest!(|(incoming_secret in any::<LxPaymentSecret>())| {
            let instructions = RelayInstructions::ToTrampoline {
                outgoing_node_id: node_pk(0x77),
                amount_to_forward: Amount::from_msat(990_000),
                outgoing_cltv: 840,
                invoice_features: None,
                invoice_routing_info: None,
                payment_secret: None,
                payment_metadata: None,
                is_async_payment: false,
                next_onion_packet: Some(NextOnionPacket(vec![0xAB])),
            };
            let plan = plan_dispatch(
                RelayId::new(common::ln::payments::LxPaymentHash::new([0u8; 32])),
                upstream(),
                &instructions,
                None,
                RouterExperimentConfig::default(),
                &RelayConfig::test_default(),
                &mut rng,
            );
            let outgoing_secret = match plan.config.recipient {
                Recipient::Clear { payment_secret, .. } => payment_secret,
                Recipient::Blinded { .. } => panic!("expected Clear recipient"),
            };
            prop_assert_ne!(outgoing_secret, incoming_secret);
            prop_assert!(
                !previously_generated.contains(&outgoing_secret),
                "probing protection requires a fresh secret per dispatch, not a cached one"
            );
            previously_generated.push(outgoing_secret);
        });
    }

    /// Forwarding to a clear final recipient without basic-MPP support
    /// disables multi-part.
    #[test]
    fn clear_recipient_without_basic_mpp_is_single_part() {
        let mut rng = SysRng::new();
        let instructions = RelayInstructions::ToTrampoline {
            outgoing_node_id: node_pk(0x22),
            amount_to_forward: Amount::from_msat(990_000),
            outgoing_cltv: 840,
            invoice_features: Some(InvoiceFeatures { basic_mpp: false }),
            invoice_routing_info: None,
            payment_secret: Some(LxPaymentSecret::new([0xBB; 32])),
            payment_metadata: None,
            is_async_payment: false,
            next_onion_packet: None,
        };
        let plan = plan_dispatch(
            RelayId::new(common::ln::payments::LxPaymentHash::new([0u8; 32])),
            upstream(),
            &instructions,
            None,
            RouterExperimentConfig::default(),
            &RelayConfig::test_default(),
            &mut rng,
        );
        assert!(!plan.multi_part);
    }
}
