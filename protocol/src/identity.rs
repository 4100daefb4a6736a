//! # Account & Asset Identifiers
//!
//! Accounts (vault creators, depositors, owners, custody accounts) and asset
//! types are both opaque strings at this layer. They get distinct newtypes so
//! that an asset can never be passed where an account is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::CUSTODY_ACCOUNT_PREFIX;
use crate::derivation::VaultAddress;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identity of a ledger participant.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps an account name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ledger account that custodies a vault's funds.
    pub fn custody_for(address: &VaultAddress) -> Self {
        Self(format!("{}{}", CUSTODY_ACCOUNT_PREFIX, address))
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UTF-8 bytes fed into derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns `true` for the empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Identity of a fungible asset type (a token contract, a currency code...).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Wraps an asset name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UTF-8 bytes fed into derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns `true` for the empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
