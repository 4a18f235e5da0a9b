//! Identifiers for an individual Lightning payment: hash, preimage, secret.

use std::{fmt, str::FromStr};

use bitcoin_hashes::{sha256, Hash};
use lightning::ln::channelmanager::PaymentId;
use lightning::ln::{PaymentHash, PaymentPreimage, PaymentSecret};
use serde::{Deserialize, Serialize};

use crate::hex::{self, FromHex};

/// Newtype for [`PaymentHash`] which impls [`Serialize`] / [`Deserialize`]
/// and a non-secret hex [`Display`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[derive(Serialize, Deserialize)]
pub struct LxPaymentHash(#[serde(with = "crate::serde_helpers::hexstr_or_bytes")] [u8; 32]);

/// Newtype for [`PaymentPreimage`]. [`Debug`] is redacted since the preimage
/// is the secret that claims the HTLC.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LxPaymentPreimage(#[serde(with = "crate::serde_helpers::hexstr_or_bytes")] [u8; 32]);

/// Newtype for [`PaymentSecret`]. [`Debug`] is redacted; every inbound HTLC
/// of a given MPP set must carry the identical value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LxPaymentSecret(#[serde(with = "crate::serde_helpers::hexstr_or_bytes")] [u8; 32]);

// --- impl LxPaymentHash --- //

impl LxPaymentHash {
    pub fn new(inner: [u8; 32]) -> Self {
        Self(inner)
    }

    pub fn as_inner(&self) -> &[u8; 32] {
        &self.0
    }
}

// --- impl LxPaymentPreimage --- //

impl LxPaymentPreimage {
    pub fn new(inner: [u8; 32]) -> Self {
        Self(inner)
    }

    /// Computes the [`LxPaymentHash`] corresponding to this preimage.
    pub fn compute_hash(&self) -> LxPaymentHash {
        let sha256_hash = sha256::Hash::hash(&self.0);
        LxPaymentHash::from(sha256_hash)
    }
}

// --- impl LxPaymentSecret --- //

impl LxPaymentSecret {
    pub fn new(inner: [u8; 32]) -> Self {
        Self(inner)
    }

    /// Generates a fresh, uniformly random payment secret, independent of
    /// any other secret. Used to construct the probing-resistant outgoing
    /// secret when forwarding trampoline-to-trampoline.
    pub fn sample<R: crate::rng::Crng>(rng: &mut R) -> Self {
        Self(crate::rng::rand_bytes(rng))
    }
}

// --- Redact secret information --- //

impl fmt::Debug for LxPaymentPreimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LxPaymentPreimage(..)")
    }
}

impl fmt::Debug for LxPaymentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LxPaymentSecret(..)")
    }
}

impl fmt::Debug for LxPaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LxPaymentHash({self})")
    }
}

// --- Conversions: bitcoin / LDK <-> Lexe --- //

impl From<sha256::Hash> for LxPaymentHash {
    fn from(hash: sha256::Hash) -> Self {
        Self(hash.to_byte_array())
    }
}

impl From<PaymentHash> for LxPaymentHash {
    fn from(hash: PaymentHash) -> Self {
        Self(hash.0)
    }
}
impl From<PaymentPreimage> for LxPaymentPreimage {
    fn from(preimage: PaymentPreimage) -> Self {
        Self(preimage.0)
    }
}
impl From<PaymentSecret> for LxPaymentSecret {
    fn from(secret: PaymentSecret) -> Self {
        Self(secret.0)
    }
}

impl From<LxPaymentHash> for PaymentHash {
    fn from(hash: LxPaymentHash) -> Self {
        Self(hash.0)
    }
}
impl From<LxPaymentPreimage> for PaymentPreimage {
    fn from(preimage: LxPaymentPreimage) -> Self {
        Self(preimage.0)
    }
}
impl From<LxPaymentSecret> for PaymentSecret {
    fn from(secret: LxPaymentSecret) -> Self {
        Self(secret.0)
    }
}

// As recommended by LDK, we use LxPaymentHash as our PaymentId
impl From<PaymentId> for LxPaymentHash {
    fn from(id: PaymentId) -> Self {
        Self(id.0)
    }
}
impl From<LxPaymentHash> for PaymentId {
    fn from(hash: LxPaymentHash) -> Self {
        Self(hash.0)
    }
}

// --- FromStr / Display --- //

impl FromStr for LxPaymentHash {
    type Err = hex::DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 32]>::from_hex(s).map(Self)
    }
}
impl FromStr for LxPaymentPreimage {
    type Err = hex::DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 32]>::from_hex(s).map(Self)
    }
}
impl FromStr for LxPaymentSecret {
    type Err = hex::DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <[u8; 32]>::from_hex(s).map(Self)
    }
}

impl fmt::Display for LxPaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::display(&self.0))
    }
}
// Preimage and secret intentionally have no Display impl; use hex::encode
// explicitly at call sites that truly need to serialize one to a string,
// so that a stray `{}` format doesn't leak a secret into logs.

#[cfg(any(test, feature = "test-utils"))]
mod arbitrary_impl {
    use proptest::{
        arbitrary::{any, Arbitrary},
        strategy::{BoxedStrategy, Strategy},
    };

    use super::*;

    impl Arbitrary for LxPaymentHash {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(Self).boxed()
        }
    }
    impl Arbitrary for LxPaymentPreimage {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(Self).boxed()
        }
    }
    impl Arbitrary for LxPaymentSecret {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(Self).boxed()
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::{prop_assert_eq, proptest};

    use super::*;

    #[test]
    fn hash_json_string_roundtrips() {
        proptest!(|(hash: LxPaymentHash)| {
            let s = serde_json::to_string(&hash).unwrap();
            let hash2: LxPaymentHash = serde_json::from_str(&s).unwrap();
            prop_assert_eq!(hash, hash2);
        })
    }

    #[test]
    fn preimage_hashes_to_consistent_hash() {
        proptest!(|(preimage: LxPaymentPreimage)| {
            let hash1 = preimage.compute_hash();
            let hash2 = preimage.compute_hash();
            prop_assert_eq!(hash1, hash2);
        })
    }

    #[test]
    fn preimage_debug_is_redacted() {
        let preimage = LxPaymentPreimage::new([0x42; 32]);
        assert_eq!(format!("{preimage:?}"), "LxPaymentPreimage(..)");
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = LxPaymentSecret::new([0x42; 32]);
        assert_eq!(format!("{secret:?}"), "LxPaymentSecret(..)");
    }
}
