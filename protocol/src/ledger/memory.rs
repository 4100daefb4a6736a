//! # In-Memory Ledger
//!
//! A complete [`AssetLedger`] that keeps balances in a hash map behind one
//! mutex. It backs the devnet node and every test that needs real transfers.
//!
//! Invariants:
//!
//! 1. No negative balances. A debit larger than the balance is refused.
//! 2. No overflow. A credit that would wrap is refused.
//! 3. Every successful movement is journaled (append-only).
//! 4. A failed transfer leaves balances and journal untouched.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssetLedger, LedgerError};
use crate::identity::{AccountId, AssetId};

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// What caused a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// New supply credited by [`MemoryLedger::mint`].
    Mint,
    /// Deposit into a custody account.
    TransferIn,
    /// Payout from a custody account.
    TransferOut,
}

/// One successful balance movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id.
    pub entry_id: Uuid,
    /// Kind of movement.
    pub kind: EntryKind,
    /// Paying account. `None` for mints.
    pub from: Option<AccountId>,
    /// Receiving account.
    pub to: AccountId,
    /// Asset moved.
    pub asset: AssetId,
    /// Amount moved.
    pub amount: u64,
    /// When the movement was applied.
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerBook {
    balances: HashMap<(AccountId, AssetId), u64>,
    frozen: HashSet<AssetId>,
    journal: Vec<LedgerEntry>,
}

impl LedgerBook {
    fn balance(&self, account: &AccountId, asset: &AssetId) -> u64 {
        self.balances
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn set_balance(&mut self, account: &AccountId, asset: &AssetId, amount: u64) {
        self.balances
            .insert((account.clone(), asset.clone()), amount);
    }

    fn credited(&self, account: &AccountId, asset: &AssetId, amount: u64) -> Result<u64, LedgerError> {
        self.balance(account, asset)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: account.clone(),
                asset: asset.clone(),
                amount,
            })
    }

    fn record(&mut self, kind: EntryKind, from: Option<&AccountId>, to: &AccountId, asset: &AssetId, amount: u64) {
        self.journal.push(LedgerEntry {
            entry_id: Uuid::new_v4(),
            kind,
            from: from.cloned(),
            to: to.clone(),
            asset: asset.clone(),
            amount,
            recorded_at: Utc::now(),
        });
    }
}

/// Thread-safe in-process ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    book: Mutex<LedgerBook>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits new supply to `to`. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the credit would exceed `u64::MAX`.
    pub fn mint(&self, to: &AccountId, asset: &AssetId, amount: u64) -> Result<u64, LedgerError> {
        let mut book = self.book.lock();
        let new_balance = book.credited(to, asset, amount)?;
        book.set_balance(to, asset, new_balance);
        book.record(EntryKind::Mint, None, to, asset, amount);
        tracing::debug!(account = %to, asset = %asset, amount, "minted");
        Ok(new_balance)
    }

    /// Returns the balance of `account` in `asset`, or 0.
    pub fn balance_of(&self, account: &AccountId, asset: &AssetId) -> u64 {
        self.book.lock().balance(account, asset)
    }

    /// Suspends (or resumes) every transfer of `asset`. Mints are unaffected.
    pub fn set_frozen(&self, asset: &AssetId, frozen: bool) {
        let mut book = self.book.lock();
        if frozen {
            book.frozen.insert(asset.clone());
        } else {
            book.frozen.remove(asset);
        }
    }

    /// Returns a copy of the journal in application order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.book.lock().journal.clone()
    }

    fn transfer(
        &self,
        kind: EntryKind,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::Rejected("zero-amount transfer".into()));
        }

        let mut book = self.book.lock();
        if book.frozen.contains(asset) {
            return Err(LedgerError::AssetFrozen(asset.clone()));
        }

        let available = book.balance(from, asset);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.clone(),
                asset: asset.clone(),
                available,
                requested: amount,
            });
        }

        // Compute both sides before touching either.
        let debited = available - amount;
        let credited = if from == to {
            available
        } else {
            book.credited(to, asset, amount)?
        };

        if from != to {
            book.set_balance(from, asset, debited);
            book.set_balance(to, asset, credited);
        }
        book.record(kind, Some(from), to, asset, amount);
        Ok(())
    }
}

impl AssetLedger for MemoryLedger {
    fn transfer_in(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.transfer(EntryKind::TransferIn, asset, from, custody, amount)
    }

    fn transfer_out(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        self.transfer(EntryKind::TransferOut, asset, custody, to, amount)
    }
}
