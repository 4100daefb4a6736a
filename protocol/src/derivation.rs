//! # Deterministic Vault Addresses
//!
//! A vault's address is computable by anyone, before the vault exists, from
//! nothing but its creation parameters. The construction mirrors CREATE2:
//!
//! ```text
//! salt      = BLAKE3-derive_key(SALT_CONTEXT, enc(creator) || enc(purpose))
//! init_hash = BLAKE3-derive_key(INIT_CONTEXT, enc(creator) || enc(assets) || lock || enc(purpose))
//! address   = BLAKE3(0xff || factory_id || salt || init_hash)[12..32]
//! ```
//!
//! `enc(s)` is a `u32` big-endian length followed by the UTF-8 bytes, so no
//! two distinct field tuples share a preimage. `enc(assets)` is a `u32` count
//! followed by each asset id encoded the same way. `lock` is a `u64`
//! big-endian.
//!
//! The factory id namespaces addresses: two factories on different networks
//! (or with different deployment labels) never hand out the same address for
//! the same arguments.
//!
//! Uniqueness is probabilistic. It rests on BLAKE3's collision resistance
//! and nothing else, which is why the factory still checks for duplicates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    ADDRESS_LENGTH, ADDRESS_PREFIX_BYTE, FACTORY_CONTEXT, HASH_OUTPUT_LENGTH, INIT_CONTEXT,
    SALT_CONTEXT,
};
use crate::crypto::hash::{blake3_hash_multi, domain_separated_hash};
use crate::identity::{AccountId, AssetId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing a hex-encoded identifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseIdError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The input decoded to the wrong number of bytes.
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        got: usize,
    },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed)?;
    if bytes.len() != N {
        return Err(ParseIdError::InvalidLength {
            expected: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Implements `Display`/`Debug`/`FromStr` and string-form serde for a
/// fixed-width byte newtype. JSON map keys must be strings, and so must
/// anything a human will paste into a URL.
macro_rules! hex_identifier {
    ($name:ident, $len:expr) => {
        impl $name {
            /// Wraps raw bytes.
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Returns the `0x`-prefixed lowercase hex form.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A 20-byte vault address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaultAddress([u8; ADDRESS_LENGTH]);

hex_identifier!(VaultAddress, ADDRESS_LENGTH);

/// The 32-byte digest of `(creator, purpose)` used as derivation input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; HASH_OUTPUT_LENGTH]);

hex_identifier!(Salt, HASH_OUTPUT_LENGTH);

/// Namespace of one factory deployment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryId([u8; HASH_OUTPUT_LENGTH]);

hex_identifier!(FactoryId, HASH_OUTPUT_LENGTH);

impl FactoryId {
    /// Derives a factory namespace from the network name and a deployment
    /// label. The same pair always yields the same id.
    pub fn derive(network: &str, label: &str) -> Self {
        let mut preimage = Vec::with_capacity(network.len() + label.len() + 8);
        encode_str(&mut preimage, network.as_bytes());
        encode_str(&mut preimage, label.as_bytes());
        Self(domain_separated_hash(FACTORY_CONTEXT, &preimage))
    }
}

// ---------------------------------------------------------------------------
// Canonical encoding
// ---------------------------------------------------------------------------

fn encode_str(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Hash of every creation parameter, the analogue of CREATE2's init code hash.
pub fn init_params_hash(
    creator: &AccountId,
    allowed_assets: &[AssetId],
    lock_duration_secs: u64,
    purpose: &str,
) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(128);
    encode_str(&mut preimage, creator.as_bytes());
    preimage.extend_from_slice(&(allowed_assets.len() as u32).to_be_bytes());
    for asset in allowed_assets {
        encode_str(&mut preimage, asset.as_bytes());
    }
    preimage.extend_from_slice(&lock_duration_secs.to_be_bytes());
    encode_str(&mut preimage, purpose.as_bytes());
    domain_separated_hash(INIT_CONTEXT, &preimage)
}

// ---------------------------------------------------------------------------
// IdentifierDeriver
// ---------------------------------------------------------------------------

/// Pure derivation of salts and vault addresses for one factory namespace.
///
/// Holds no state beyond the factory id; cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierDeriver {
    factory: FactoryId,
}

impl IdentifierDeriver {
    /// Creates a deriver bound to `factory`.
    pub fn new(factory: FactoryId) -> Self {
        Self { factory }
    }

    /// The factory namespace this deriver writes into.
    pub fn factory(&self) -> FactoryId {
        self.factory
    }

    /// Digest of `(creator, purpose)`. Independent of the factory.
    pub fn derive_salt(creator: &AccountId, purpose: &str) -> Salt {
        let mut preimage = Vec::with_capacity(creator.as_str().len() + purpose.len() + 8);
        encode_str(&mut preimage, creator.as_bytes());
        encode_str(&mut preimage, purpose.as_bytes());
        Salt(domain_separated_hash(SALT_CONTEXT, &preimage))
    }

    /// Address of the vault these parameters would create.
    ///
    /// Performs no validation: callers that need the creation rules go
    /// through the factory.
    pub fn derive_identifier(
        &self,
        creator: &AccountId,
        allowed_assets: &[AssetId],
        lock_duration_secs: u64,
        purpose: &str,
        salt: &Salt,
    ) -> VaultAddress {
        let init_hash = init_params_hash(creator, allowed_assets, lock_duration_secs, purpose);
        let digest = blake3_hash_multi(&[
            &[ADDRESS_PREFIX_BYTE],
            self.factory.as_bytes(),
            salt.as_bytes(),
            &init_hash,
        ]);
        let mut address = [0u8; ADDRESS_LENGTH];
        address.copy_from_slice(&digest[HASH_OUTPUT_LENGTH - ADDRESS_LENGTH..]);
        VaultAddress(address)
    }
}
