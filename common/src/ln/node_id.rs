//! Identifiers for Lightning Network peers and channels.

use std::{fmt, str::FromStr};

use bitcoin::secp256k1;
use serde::{Deserialize, Serialize};

/// A node's public key, identifying it on the Lightning Network.
///
/// We don't represent the inner value as `[u8; 33]` because not every
/// `[u8; 33]` is a valid compressed pubkey; we use `secp256k1::PublicKey`'s
/// own (de)serialization so invalid keys are rejected at the parse boundary.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodePk(pub secp256k1::PublicKey);

impl NodePk {
    pub fn inner(self) -> secp256k1::PublicKey {
        self.0
    }

    pub fn as_inner(&self) -> &secp256k1::PublicKey {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, secp256k1::Error> {
        secp256k1::PublicKey::from_slice(bytes).map(Self)
    }

    pub fn to_array(&self) -> [u8; 33] {
        self.0.serialize()
    }
}

impl FromStr for NodePk {
    type Err = secp256k1::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        secp256k1::PublicKey::from_str(s).map(Self)
    }
}

impl fmt::Display for NodePk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodePk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePk({self})")
    }
}

impl From<secp256k1::PublicKey> for NodePk {
    fn from(public_key: secp256k1::PublicKey) -> Self {
        Self(public_key)
    }
}

impl From<NodePk> for secp256k1::PublicKey {
    fn from(node_pk: NodePk) -> secp256k1::PublicKey {
        node_pk.0
    }
}

/// A newtype for the `short_channel_id` (`scid`) used throughout LDK to
/// identify a hop's next-hop channel in a route.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[derive(Serialize, Deserialize)]
pub struct Scid(pub u64);

impl fmt::Display for Scid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Scid {
    fn from(scid: u64) -> Self {
        Self(scid)
    }
}

/// A channel's funding-tx-derived identifier, as used by LDK to name the
/// specific channel an inbound HTLC arrived on.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct LxChannelId(#[serde(with = "crate::serde_helpers::hexstr_or_bytes")] pub [u8; 32]);

impl LxChannelId {
    pub fn new(inner: [u8; 32]) -> Self {
        Self(inner)
    }
}

impl fmt::Display for LxChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::hex::display(&self.0))
    }
}

impl fmt::Debug for LxChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LxChannelId({self})")
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod arbitrary_impl {
    use proptest::{
        arbitrary::{any, Arbitrary},
        strategy::{BoxedStrategy, Strategy},
    };

    use super::*;

    impl Arbitrary for NodePk {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>()
                .prop_filter_map("not a valid secret key", |bytes| {
                    secp256k1::SecretKey::from_slice(&bytes).ok()
                })
                .prop_map(|sk| {
                    let secp = secp256k1::Secp256k1::signing_only();
                    NodePk(secp256k1::PublicKey::from_secret_key(&secp, &sk))
                })
                .boxed()
        }
    }

    impl Arbitrary for Scid {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<u64>().prop_map(Scid).boxed()
        }
    }

    impl Arbitrary for LxChannelId {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(LxChannelId).boxed()
        }
    }
}
