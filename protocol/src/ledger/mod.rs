//! # Asset Ledger
//!
//! The ledger is the component that actually moves value. Vaults never touch
//! balances held elsewhere; they ask the ledger to pull funds from a depositor
//! into the vault's custody account, or to push them back out to the owner.
//!
//! ```text
//! mod.rs    : AssetLedger trait and LedgerError
//! memory.rs : MemoryLedger: in-process ledger with a transfer journal
//! ```
//!
//! Contract every implementation must honour: a transfer either fully
//! succeeds or fails with no side effect. Callers rely on that to keep their
//! own books consistent with the ledger's.

pub mod memory;

use thiserror::Error;

use crate::identity::{AccountId, AssetId};

pub use memory::{EntryKind, LedgerEntry, MemoryLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors a ledger may report for a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The paying account does not hold enough of the asset.
    #[error("insufficient balance: {account} holds {available} {asset}, requested {requested}")]
    InsufficientBalance {
        /// The paying account.
        account: AccountId,
        /// The asset being moved.
        asset: AssetId,
        /// What the account holds.
        available: u64,
        /// What the transfer asked for.
        requested: u64,
    },

    /// Crediting the receiving account would exceed `u64::MAX`.
    #[error("balance overflow: crediting {amount} {asset} to {account}")]
    Overflow {
        /// The receiving account.
        account: AccountId,
        /// The asset being moved.
        asset: AssetId,
        /// The amount that did not fit.
        amount: u64,
    },

    /// Transfers of this asset are currently suspended.
    #[error("asset frozen: {0}")]
    AssetFrozen(AssetId),

    /// Any other refusal from the ledger.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Moves fungible assets in and out of a vault's custody account.
///
/// Both operations are atomic. Implementations must be safe to call from
/// several vaults at once.
pub trait AssetLedger: Send + Sync {
    /// Moves `amount` of `asset` from `from` into `custody`.
    fn transfer_in(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` of `asset` from `custody` out to `to`.
    fn transfer_out(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError>;
}
