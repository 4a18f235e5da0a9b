//! The decrypted inner relay payload handed in by the onion layer, and the
//! small supporting types it's built from.

use common::ln::{
    amount::Amount, node_id::NodePk, payments::LxPaymentSecret, route::LxRouteHop,
};

/// Whether the final recipient's invoice advertises support for relevant
/// protocol features. A full feature-bitset type belongs to the onion-parsing
/// layer (out of scope, §1); the relay core only ever asks one question of
/// it, so it's modeled as that one question rather than re-deriving LDK's
/// whole `Bolt11InvoiceFeatures` bitset API.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct InvoiceFeatures {
    pub basic_mpp: bool,
}

impl InvoiceFeatures {
    pub fn supports_basic_mpp(&self) -> bool {
        self.basic_mpp
    }
}

/// Extra routing-graph edges the sender's invoice advertised (BOLT‑11 routing
/// hints), used to extend the router's search when forwarding to a clear,
/// non-trampoline final recipient.
pub type InvoiceRoutingInfo = Vec<LxRouteHop>;

/// An opaque, already-encrypted onion packet destined for the next
/// trampoline hop. The relay core never parses it; it only ever forwards it
/// unchanged as part of the outbound `SendPaymentConfig`.
#[derive(Clone, Eq, PartialEq)]
pub struct NextOnionPacket(pub Vec<u8>);

impl std::fmt::Debug for NextOnionPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NextOnionPacket({} bytes)", self.0.len())
    }
}

/// A compact, not-yet-resolved reference to a BOLT‑12 blinded path, as
/// received in the onion; resolved into a full [`LxRoute`] blinded tail by
/// the external blinded-path resolver (§6.1).
///
/// [`LxRoute`]: common::ln::route::LxRoute
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompactBlindedPath(pub Vec<u8>);

/// The decrypted inner relay payload: what this node has been instructed to
/// do with the funds it just received.
#[derive(Clone, Debug)]
pub enum RelayInstructions {
    /// Forward the payment to another node, either a further trampoline hop
    /// (opaque `next_onion_packet`, no `invoice_features`) or a clear
    /// non-trampoline final recipient (`invoice_features` present, no
    /// `next_onion_packet`).
    ToTrampoline {
        outgoing_node_id: NodePk,
        amount_to_forward: Amount,
        outgoing_cltv: u32,
        invoice_features: Option<InvoiceFeatures>,
        invoice_routing_info: Option<InvoiceRoutingInfo>,
        payment_secret: Option<LxPaymentSecret>,
        payment_metadata: Option<Vec<u8>>,
        is_async_payment: bool,
        next_onion_packet: Option<NextOnionPacket>,
    },
    /// Forward the payment to a recipient reachable only via one or more
    /// BOLT‑12 blinded paths.
    ToBlindedPaths {
        amount_to_forward: Amount,
        outgoing_cltv: u32,
        invoice_features: InvoiceFeatures,
        outgoing_blinded_paths: Vec<CompactBlindedPath>,
    },
}

impl RelayInstructions {
    pub fn amount_to_forward(&self) -> Amount {
        match self {
            Self::ToTrampoline {
                amount_to_forward, ..
            } => *amount_to_forward,
            Self::ToBlindedPaths {
                amount_to_forward, ..
            } => *amount_to_forward,
        }
    }

    pub fn outgoing_cltv(&self) -> u32 {
        match self {
            Self::ToTrampoline { outgoing_cltv, .. } => *outgoing_cltv,
            Self::ToBlindedPaths { outgoing_cltv, .. } => *outgoing_cltv,
        }
    }

    /// Whether this is a `ToTrampoline` relay with an `invoice_features`
    /// payload set, i.e. a relay to a clear non-trampoline final recipient.
    pub fn is_to_clear_recipient(&self) -> bool {
        matches!(
            self,
            Self::ToTrampoline {
                invoice_features: Some(_),
                ..
            }
        )
    }

    /// Whether this is a `ToTrampoline` relay carrying an opaque next onion,
    /// i.e. a forward to a further trampoline hop.
    pub fn is_to_next_trampoline(&self) -> bool {
        matches!(
            self,
            Self::ToTrampoline {
                invoice_features: None,
                next_onion_packet: Some(_),
                ..
            }
        )
    }
}
