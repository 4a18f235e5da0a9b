//! Upstream-visible BOLT‑4 failures, and the translation from a downstream
//! payment failure (§4.4) into one of them.

use common::ln::{amount::Amount, node_id::NodePk};

/// A violated programming invariant (§7 "Programming invariants"): a bug in
/// the parent dispatcher, not a condition this instance can recover from.
/// Returned (never panicked) from the actor loop so `LxTask` surfaces it to
/// the supervisor as an ordinary task failure rather than unwinding the task.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error(
        "payment-secret mismatch on inbound HTLC: parent-dispatcher bug \
         routed a part of a different MPP set to this relay instance"
    )]
    PaymentSecretMismatch,
}

/// A BOLT‑4 failure message, as returned upstream in an HTLC `fail`.
///
/// This is the closed, typed "crosses the wire" error set (§7), distinct
/// from the `anyhow::Error` used for purely internal/operational failures.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("trampoline fee insufficient")]
    TrampolineFeeInsufficient,
    #[error("trampoline expiry too soon")]
    TrampolineExpiryTooSoon,
    #[error("invalid onion payload (tag={tag}, offset={offset})")]
    InvalidOnionPayload { tag: u16, offset: u16 },
    #[error("incorrect or unknown payment details")]
    IncorrectOrUnknownPaymentDetails {
        htlc_amount: Amount,
        current_block_height: u32,
    },
    #[error("temporary node failure")]
    TemporaryNodeFailure,
    #[error("unknown next peer")]
    UnknownNextPeer,
    /// A decrypted remote failure forwarded verbatim from further downstream.
    #[error("forwarded remote failure")]
    Forwarded(RemoteFailureMessage),
}

impl UpstreamFailure {
    /// A short, stable classifier used as the metrics label for the
    /// relay-failure counter (§4.6).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrampolineFeeInsufficient => "trampoline_fee_insufficient",
            Self::TrampolineExpiryTooSoon => "trampoline_expiry_too_soon",
            Self::InvalidOnionPayload { .. } => "invalid_onion_payload",
            Self::IncorrectOrUnknownPaymentDetails { .. } =>
                "incorrect_or_unknown_payment_details",
            Self::TemporaryNodeFailure => "temporary_node_failure",
            Self::UnknownNextPeer => "unknown_next_peer",
            Self::Forwarded(_) => "forwarded_remote_failure",
        }
    }

    /// The failure returned for an async-payment hold that timed out or was
    /// canceled (§4.1, §9 "Open question": both map to the same provisional
    /// code, centralised here so a future BOLT update is a one-line change).
    pub fn async_unavailable() -> Self {
        Self::TemporaryNodeFailure
    }

    pub fn incorrect_or_unknown_payment_details(
        htlc_amount: Amount,
        current_block_height: u32,
    ) -> Self {
        Self::IncorrectOrUnknownPaymentDetails {
            htlc_amount,
            current_block_height,
        }
    }
}

/// An opaque, already-decrypted remote failure message. The relay core
/// forwards this unparsed; only the outbound executor understands BOLT‑4
/// failure-message encoding well enough to have decrypted it in the first
/// place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteFailureMessage(pub Vec<u8>);

/// A single reason a downstream routing attempt failed, as reported by the
/// outbound executor (§6 "Outbound executor events", `PaymentFailed`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DownstreamFailure {
    /// We couldn't even attempt to send: a local routing/liquidity problem.
    LocalFailure(LocalFailureReason),
    /// A remote hop returned (and we successfully decrypted) a BOLT‑4
    /// failure message.
    RemoteFailure {
        /// The node id the failure is attributed to, if determined.
        originating_node_id: Option<NodePk>,
        message: RemoteFailureMessage,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LocalFailureReason {
    BalanceTooLow,
    RouteNotFound,
}

/// Translate a downstream `PaymentFailed(failures)` into the BOLT‑4 message
/// to return upstream, per §4.4.
///
/// `offered_fee` is the fee the sender offered us (`amount_in -
/// amount_to_forward`); `min_trampoline_fee` is this node's minimum
/// acceptable fee for the attempted forward amount. `outgoing_node_id` is
/// the declared next hop for `ToTrampoline` relays; `None` for
/// `ToBlindedPaths`, since blinded relays must never attribute (or forward)
/// a remote failure — doing so could leak that the final recipient lies
/// beyond the introduction node (§8 invariant 6).
pub fn translate_downstream_failure(
    failures: &[DownstreamFailure],
    offered_fee: Amount,
    min_trampoline_fee: Amount,
    outgoing_node_id: Option<NodePk>,
) -> UpstreamFailure {
    if failures.is_empty() {
        // Should not occur; treat defensively as `TemporaryNodeFailure`.
        return UpstreamFailure::TemporaryNodeFailure;
    }

    if let [DownstreamFailure::LocalFailure(LocalFailureReason::BalanceTooLow)] =
        failures
    {
        let five_x_min = min_trampoline_fee.checked_mul(rust_decimal_macros::dec!(5));
        let sender_overpaid_futilely = match five_x_min {
            Some(five_x_min) => offered_fee >= five_x_min,
            // An overflowing 5x threshold can never be met by a real offer.
            None => false,
        };
        return if sender_overpaid_futilely {
            UpstreamFailure::TemporaryNodeFailure
        } else {
            UpstreamFailure::TrampolineFeeInsufficient
        };
    }

    let any_route_not_found = failures.iter().any(|f| {
        matches!(
            f,
            DownstreamFailure::LocalFailure(LocalFailureReason::RouteNotFound)
        )
    });
    if any_route_not_found {
        return UpstreamFailure::TrampolineFeeInsufficient;
    }

    // Blinded-path relays must never forward a decrypted remote failure:
    // every remote hop beyond the introduction node is inside the blinded
    // tail, and surfacing its failure would leak information about the
    // recipient's position relative to it.
    let Some(outgoing_node_id) = outgoing_node_id else {
        return UpstreamFailure::TemporaryNodeFailure;
    };

    let remote_failures = failures.iter().filter_map(|f| match f {
        DownstreamFailure::RemoteFailure {
            originating_node_id,
            message,
        } => Some((*originating_node_id, message)),
        DownstreamFailure::LocalFailure(_) => None,
    });

    let mut any_remote = None;
    for (originating_node_id_opt, message) in remote_failures {
        if any_remote.is_none() {
            any_remote = Some(message.clone());
        }
        if originating_node_id_opt == Some(outgoing_node_id) {
            return UpstreamFailure::Forwarded(message.clone());
        }
    }

    match any_remote {
        Some(message) => UpstreamFailure::Forwarded(message),
        None => UpstreamFailure::TemporaryNodeFailure,
    }
}
