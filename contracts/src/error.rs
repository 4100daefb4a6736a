//! Error types shared by the factory and the vaults.
//!
//! Every failure is a typed outcome returned to the caller. Nothing here is
//! retried or swallowed locally.

use chrono::{DateTime, Utc};
use piggybank_protocol::{AccountId, AssetId, LedgerError, VaultAddress};
use thiserror::Error;

/// Errors that can occur during factory or vault operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Malformed creation request: wrong asset count, duplicate or empty
    /// asset ids, lock duration out of range, oversized purpose.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The derived address is already registered.
    #[error("duplicate account: a vault already exists at {0}")]
    DuplicateAccount(VaultAddress),

    /// The asset is not one of the vault's three allowed assets.
    #[error("unsupported asset: {0}")]
    UnsupportedAsset(AssetId),

    /// Deposits must move a positive amount.
    #[error("invalid amount: deposits must be greater than zero")]
    InvalidAmount,

    /// Only the owner may withdraw.
    #[error("unauthorized: {caller} is not the vault owner")]
    Unauthorized {
        /// Who tried.
        caller: AccountId,
    },

    /// The time lock has not expired yet.
    #[error("still locked: vault unlocks at {unlock_at}")]
    StillLocked {
        /// When the vault unlocks.
        unlock_at: DateTime<Utc>,
    },

    /// The vault has already paid out.
    #[error("vault already withdrawn")]
    AlreadyWithdrawn,

    /// Deposits are refused once the vault has paid out.
    #[error("vault is finalized: deposits are closed after withdrawal")]
    Finalized,

    /// The vault's book for this asset cannot hold the deposit.
    #[error("balance overflow: vault holds {current} {asset}, deposit of {amount} would exceed u64::MAX")]
    BalanceOverflow {
        /// The asset being deposited.
        asset: AssetId,
        /// The vault's current balance.
        current: u64,
        /// The rejected deposit.
        amount: u64,
    },

    /// The ledger refused a transfer. Propagated unchanged.
    #[error("ledger failure: {0}")]
    LedgerFailure(#[from] LedgerError),

    /// No vault is registered at this address.
    #[error("vault not found: {0}")]
    VaultNotFound(VaultAddress),
}

impl VaultError {
    /// Stable variant name, used as the machine-readable error kind on the
    /// wire.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::InvalidArguments(_) => "InvalidArguments",
            VaultError::DuplicateAccount(_) => "DuplicateAccount",
            VaultError::UnsupportedAsset(_) => "UnsupportedAsset",
            VaultError::InvalidAmount => "InvalidAmount",
            VaultError::Unauthorized { .. } => "Unauthorized",
            VaultError::StillLocked { .. } => "StillLocked",
            VaultError::AlreadyWithdrawn => "AlreadyWithdrawn",
            VaultError::Finalized => "Finalized",
            VaultError::BalanceOverflow { .. } => "BalanceOverflow",
            VaultError::LedgerFailure(_) => "LedgerFailure",
            VaultError::VaultNotFound(_) => "VaultNotFound",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_convert_unchanged() {
        let inner = LedgerError::AssetFrozen("X".into());
        let err: VaultError = inner.clone().into();
        assert_eq!(err, VaultError::LedgerFailure(inner));
        assert_eq!(err.kind(), "LedgerFailure");
    }

    #[test]
    fn messages_name_the_offender() {
        let err = VaultError::Unauthorized {
            caller: "mallory".into(),
        };
        assert_eq!(err.to_string(), "unauthorized: mallory is not the vault owner");
        assert_eq!(
            VaultError::UnsupportedAsset("W".into()).to_string(),
            "unsupported asset: W"
        );
    }
}
