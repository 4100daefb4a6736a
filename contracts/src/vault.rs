//! # Time-Locked Vault
//!
//! A vault holds up to three asset types on behalf of its owner. Anyone may
//! pay in; only the owner may take out, and only once the lock has expired.
//! The lifecycle is:
//!
//! 1. **Active**: deposits accepted, withdrawal refused with `StillLocked`.
//! 2. **Unlocked**: the clock has reached `unlock_at`. Deposits are still
//!    accepted and the owner may withdraw.
//! 3. **Withdrawn**: every balance has been paid to the owner. Terminal.
//!
//! The state is never stored. It is computed from the clock and the
//! withdrawn flag, so a vault unlocks without anyone touching it.
//!
//! Funds live in a custody account on the [`AssetLedger`]. The vault's own
//! book mirrors what custody holds for it, and every operation keeps the two
//! in step: a ledger refusal leaves the book untouched. If a failed
//! withdrawal cannot return an earlier payout, that payout stays with the
//! owner and is struck from the book as well.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use piggybank_protocol::{AccountId, AssetId, AssetLedger, Clock, LedgerError, VaultAddress};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::VaultError;
use crate::validation::AllowedAssets;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a vault is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultState {
    /// Locked. Deposits only.
    Active,
    /// The lock has expired and the owner may withdraw.
    Unlocked,
    /// Paid out. No further deposits or withdrawals.
    Withdrawn,
}

impl std::fmt::Display for VaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultState::Active => write!(f, "Active"),
            VaultState::Unlocked => write!(f, "Unlocked"),
            VaultState::Withdrawn => write!(f, "Withdrawn"),
        }
    }
}

/// One asset paid to the owner by a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// The asset paid.
    pub asset: AssetId,
    /// The amount paid.
    pub amount: u64,
}

/// Result of a successful withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// The vault that paid out.
    pub vault: VaultAddress,
    /// Who received the funds.
    pub owner: AccountId,
    /// Non-zero payouts in allowed-asset order. Empty if the vault held nothing.
    pub payouts: Vec<Payout>,
    /// When the vault was finalized.
    pub withdrawn_at: DateTime<Utc>,
}

/// Point-in-time view of a vault, for queries and the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// The vault's address.
    pub address: VaultAddress,
    /// The ledger account holding the vault's funds.
    pub custody: AccountId,
    /// The owner (the creator).
    pub owner: AccountId,
    /// The asset whitelist.
    pub allowed_assets: AllowedAssets,
    /// Balances in allowed-asset order.
    pub balances: Vec<(AssetId, u64)>,
    /// Lifecycle state at the time of the snapshot.
    pub state: VaultState,
    /// When the vault was created.
    pub created_at: DateTime<Utc>,
    /// When the lock expires.
    pub unlock_at: DateTime<Utc>,
    /// When the vault paid out, if it has.
    pub withdrawn_at: Option<DateTime<Utc>>,
}

/// The mutable half of a vault.
#[derive(Debug)]
struct VaultBook {
    balances: HashMap<AssetId, u64>,
    withdrawn_at: Option<DateTime<Utc>>,
}

impl VaultBook {
    fn is_withdrawn(&self) -> bool {
        self.withdrawn_at.is_some()
    }

    fn balance(&self, asset: &AssetId) -> u64 {
        self.balances.get(asset).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A time-locked multi-asset vault.
///
/// Every operation locks the vault's book for its whole duration, ledger
/// calls included, so operations on one vault are linearizable. Distinct
/// vaults never share a lock.
pub struct Vault {
    address: VaultAddress,
    custody: AccountId,
    owner: AccountId,
    allowed_assets: AllowedAssets,
    created_at: DateTime<Utc>,
    unlock_at: DateTime<Utc>,
    book: Mutex<VaultBook>,
    ledger: Arc<dyn AssetLedger>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("address", &self.address)
            .field("owner", &self.owner)
            .field("allowed_assets", &self.allowed_assets)
            .field("unlock_at", &self.unlock_at)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Creates an empty vault. Only the factory builds vaults, after
    /// validating the parameters.
    pub(crate) fn new(
        address: VaultAddress,
        owner: AccountId,
        allowed_assets: AllowedAssets,
        created_at: DateTime<Utc>,
        unlock_at: DateTime<Utc>,
        ledger: Arc<dyn AssetLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let balances = allowed_assets.iter().map(|a| (a.clone(), 0)).collect();
        Self {
            address,
            custody: AccountId::custody_for(&address),
            owner,
            allowed_assets,
            created_at,
            unlock_at,
            book: Mutex::new(VaultBook {
                balances,
                withdrawn_at: None,
            }),
            ledger,
            clock,
        }
    }

    /// Pays `amount` of `asset` from `caller` into the vault. Returns the
    /// vault's new balance of that asset.
    ///
    /// # Errors
    ///
    /// Checked in order:
    /// [`VaultError::Finalized`] once the vault has paid out,
    /// [`VaultError::UnsupportedAsset`] for an asset outside the whitelist,
    /// [`VaultError::InvalidAmount`] for zero,
    /// [`VaultError::BalanceOverflow`] if the book cannot hold the sum,
    /// [`VaultError::LedgerFailure`] if the ledger refuses the transfer.
    pub fn deposit(
        &self,
        caller: &AccountId,
        asset: &AssetId,
        amount: u64,
    ) -> Result<u64, VaultError> {
        let mut book = self.book.lock();

        if book.is_withdrawn() {
            return Err(VaultError::Finalized);
        }
        if !self.allows(asset) {
            return Err(VaultError::UnsupportedAsset(asset.clone()));
        }
        if amount == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let current = book.balance(asset);
        let new_balance =
            current
                .checked_add(amount)
                .ok_or_else(|| VaultError::BalanceOverflow {
                    asset: asset.clone(),
                    current,
                    amount,
                })?;

        if let Err(e) = self.ledger.transfer_in(&self.custody, asset, caller, amount) {
            warn!(vault = %self.address, asset = %asset, amount, caller = %caller, error = %e, "deposit refused by ledger");
            return Err(e.into());
        }

        book.balances.insert(asset.clone(), new_balance);
        info!(vault = %self.address, asset = %asset, amount, caller = %caller, balance = new_balance, "deposit");
        Ok(new_balance)
    }

    /// Pays every balance to the owner and finalizes the vault.
    ///
    /// All or nothing: if any transfer fails, the transfers already made are
    /// reversed and the vault is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Checked in order:
    /// [`VaultError::Unauthorized`] unless `caller` is the owner,
    /// [`VaultError::StillLocked`] before `unlock_at`,
    /// [`VaultError::AlreadyWithdrawn`] on a second withdrawal,
    /// [`VaultError::LedgerFailure`] if a payout is refused.
    pub fn withdraw(&self, caller: &AccountId) -> Result<WithdrawalReceipt, VaultError> {
        let mut book = self.book.lock();

        if caller != &self.owner {
            return Err(VaultError::Unauthorized {
                caller: caller.clone(),
            });
        }
        let now = self.clock.now();
        if now < self.unlock_at {
            return Err(VaultError::StillLocked {
                unlock_at: self.unlock_at,
            });
        }
        if book.is_withdrawn() {
            return Err(VaultError::AlreadyWithdrawn);
        }

        let mut paid: Vec<Payout> = Vec::new();
        for asset in &self.allowed_assets {
            let amount = book.balance(asset);
            if amount == 0 {
                continue;
            }
            if let Err(e) = self
                .ledger
                .transfer_out(&self.custody, asset, &self.owner, amount)
            {
                warn!(vault = %self.address, asset = %asset, amount, error = %e, "payout refused by ledger, rolling back");
                self.roll_back(&mut book, &paid);
                return Err(e.into());
            }
            paid.push(Payout {
                asset: asset.clone(),
                amount,
            });
        }

        for balance in book.balances.values_mut() {
            *balance = 0;
        }
        book.withdrawn_at = Some(now);

        info!(vault = %self.address, owner = %self.owner, payouts = paid.len(), "withdrawn");
        Ok(WithdrawalReceipt {
            vault: self.address,
            owner: self.owner.clone(),
            payouts: paid,
            withdrawn_at: now,
        })
    }

    /// Returns completed payouts to custody, newest first. A payout that
    /// cannot be reversed stays with the owner and is debited from the book,
    /// so the book keeps matching custody.
    fn roll_back(&self, book: &mut VaultBook, paid: &[Payout]) {
        for payout in paid.iter().rev() {
            let reversal: Result<(), LedgerError> = self.ledger.transfer_in(
                &self.custody,
                &payout.asset,
                &self.owner,
                payout.amount,
            );
            if let Err(e) = reversal {
                error!(
                    vault = %self.address,
                    asset = %payout.asset,
                    amount = payout.amount,
                    error = %e,
                    "rollback transfer failed, payout stays with owner"
                );
                let remaining = book.balance(&payout.asset).saturating_sub(payout.amount);
                book.balances.insert(payout.asset.clone(), remaining);
            }
        }
    }

    fn allows(&self, asset: &AssetId) -> bool {
        self.allowed_assets.contains(asset)
    }

    /// Lifecycle state as of now.
    pub fn state(&self) -> VaultState {
        let book = self.book.lock();
        self.state_of(&book)
    }

    fn state_of(&self, book: &VaultBook) -> VaultState {
        if book.is_withdrawn() {
            VaultState::Withdrawn
        } else if self.clock.now() >= self.unlock_at {
            VaultState::Unlocked
        } else {
            VaultState::Active
        }
    }

    /// Balance of `asset`. Zero for assets outside the whitelist.
    pub fn balance_of(&self, asset: &AssetId) -> u64 {
        self.book.lock().balance(asset)
    }

    /// All balances, in allowed-asset order.
    pub fn balances(&self) -> Vec<(AssetId, u64)> {
        let book = self.book.lock();
        self.allowed_assets
            .iter()
            .map(|a| (a.clone(), book.balance(a)))
            .collect()
    }

    /// The vault's address.
    pub fn address(&self) -> VaultAddress {
        self.address
    }

    /// The ledger account holding this vault's funds.
    pub fn custody(&self) -> &AccountId {
        &self.custody
    }

    /// The owner.
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// The asset whitelist.
    pub fn allowed_assets(&self) -> &AllowedAssets {
        &self.allowed_assets
    }

    /// When the vault was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the lock expires.
    pub fn unlock_at(&self) -> DateTime<Utc> {
        self.unlock_at
    }

    /// When the vault paid out, if it has.
    pub fn withdrawn_at(&self) -> Option<DateTime<Utc>> {
        self.book.lock().withdrawn_at
    }

    /// A consistent copy of the vault's public state.
    pub fn snapshot(&self) -> VaultSnapshot {
        let book = self.book.lock();
        VaultSnapshot {
            address: self.address,
            custody: self.custody.clone(),
            owner: self.owner.clone(),
            allowed_assets: self.allowed_assets.clone(),
            balances: self
                .allowed_assets
                .iter()
                .map(|a| (a.clone(), book.balance(a)))
                .collect(),
            state: self.state_of(&book),
            created_at: self.created_at,
            unlock_at: self.unlock_at,
            withdrawn_at: book.withdrawn_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
