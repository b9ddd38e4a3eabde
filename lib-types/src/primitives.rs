//! Fixed-size primitive types shared by every consensus-facing crate.
//!
//! All identifiers are 32-byte arrays wrapped in newtypes. They are cheap to
//! copy, deterministically encodable, and render as lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{CodecError, Decoder, Encoder};

/// Block height in the chain (0-indexed).
pub type BlockHeight = u64;

/// Chain timestamp, in seconds since the unix epoch.
pub type Timestamp = u64;

/// Unlock-hash type byte.
pub type UnlockType = u8;

/// Unlock type of the nil condition.
pub const UNLOCK_TYPE_NIL: UnlockType = 0;
/// Unlock type of a regular public-key address.
pub const UNLOCK_TYPE_PUBKEY: UnlockType = 1;

/// Number of checksum bytes appended to the hex form of an [`UnlockHash`].
const UNLOCK_HASH_CHECKSUM_SIZE: usize = 6;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub const fn zero() -> Self {
                Self([0u8; 32])
            }

            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn encode(&self, enc: &mut Encoder) {
                enc.put_bytes_32(&self.0);
            }

            pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
                Ok(Self(dec.take_bytes_32()?))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), hex::encode(&self.0[..8]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = hex::decode(s).map_err(|_| CodecError::InvalidHex)?;
                let bytes: [u8; 32] =
                    raw.try_into().map_err(|_| CodecError::InvalidLength)?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

id_type! {
    /// Identifier of a coin output, derived from the parent transaction or
    /// block by the protocol. Opaque to everything downstream.
    CoinOutputId
}

id_type! {
    /// Identifier of a block: the consensus hash of its canonical header
    /// encoding.
    BlockId
}

id_type! {
    /// Identifier of a transaction: the consensus hash of its canonical
    /// encoding.
    TransactionId
}

/// An address-level hash with a leading type byte.
///
/// The canonical string form is `<type byte hex><hash hex><checksum hex>`,
/// where the checksum is the first 6 bytes of the consensus hash of the
/// type byte followed by the hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UnlockHash {
    pub unlock_type: UnlockType,
    pub hash: [u8; 32],
}

impl UnlockHash {
    pub const fn new(unlock_type: UnlockType, hash: [u8; 32]) -> Self {
        Self { unlock_type, hash }
    }

    fn checksum(&self) -> [u8; UNLOCK_HASH_CHECKSUM_SIZE] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[self.unlock_type]);
        hasher.update(&self.hash);
        let digest: [u8; 32] = hasher.finalize().into();
        let mut out = [0u8; UNLOCK_HASH_CHECKSUM_SIZE];
        out.copy_from_slice(&digest[..UNLOCK_HASH_CHECKSUM_SIZE]);
        out
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.unlock_type);
        enc.put_bytes_32(&self.hash);
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let unlock_type = dec.take_u8()?;
        let hash = dec.take_bytes_32()?;
        Ok(Self { unlock_type, hash })
    }
}

impl fmt::Debug for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnlockHash({:02x}:{})", self.unlock_type, hex::encode(&self.hash[..8]))
    }
}

impl fmt::Display for UnlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{}{}",
            self.unlock_type,
            hex::encode(self.hash),
            hex::encode(self.checksum())
        )
    }
}

impl FromStr for UnlockHash {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|_| CodecError::InvalidHex)?;
        if raw.len() != 1 + 32 + UNLOCK_HASH_CHECKSUM_SIZE {
            return Err(CodecError::InvalidLength);
        }
        let unlock_type = raw[0];
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&raw[1..33]);
        let uh = Self { unlock_type, hash };
        if raw[33..] != uh.checksum() {
            return Err(CodecError::InvalidChecksum);
        }
        Ok(uh)
    }
}

impl Serialize for UnlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UnlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
