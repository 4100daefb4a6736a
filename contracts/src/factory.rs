//! # Vault Factory
//!
//! Creates vaults at deterministic addresses and keeps the public registry
//! of every vault it has created.
//!
//! ## Creation
//!
//! `create_vault` validates the request, derives the salt and address,
//! rejects an address that is already taken, builds the vault and appends
//! its record. All of that happens under the registry's write lock, so two
//! identical requests racing each other produce exactly one vault.
//!
//! ## Prediction
//!
//! `compute_identifier` and `predict_identifier` run the same validation
//! and derivation without touching the registry. A prediction that succeeds
//! names the address a later `create_vault` with the same arguments will use.
//!
//! ## Registry
//!
//! Append-only. Records are never edited or removed and are returned in
//! creation order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use piggybank_protocol::{
    AccountId, AssetId, AssetLedger, Clock, FactoryId, IdentifierDeriver, Salt, VaultAddress,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VaultError;
use crate::validation::{validate_creation, AllowedAssets};
use crate::vault::Vault;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The immutable registry entry for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// The vault's address.
    pub identifier: VaultAddress,
    /// Who created (and owns) the vault.
    pub creator: AccountId,
    /// The asset whitelist, in the creator's order.
    pub allowed_assets: AllowedAssets,
    /// Lock length requested at creation.
    pub lock_duration_secs: u64,
    /// The creator's label for the vault.
    pub purpose: String,
    /// Salt the address was derived with.
    pub salt: Salt,
    /// When the vault was created.
    pub created_at: DateTime<Utc>,
    /// When the lock expires.
    pub unlock_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    records: Vec<VaultRecord>,
    index: HashMap<VaultAddress, usize>,
    vaults: HashMap<VaultAddress, Arc<Vault>>,
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Creates vaults and answers registry queries. Share it behind an `Arc`.
pub struct VaultFactory {
    deriver: IdentifierDeriver,
    ledger: Arc<dyn AssetLedger>,
    clock: Arc<dyn Clock>,
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for VaultFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultFactory")
            .field("factory_id", &self.deriver.factory())
            .field("vaults", &self.vault_count())
            .finish_non_exhaustive()
    }
}

impl VaultFactory {
    /// Creates an empty factory in the `factory_id` namespace. Every vault
    /// it builds moves funds through `ledger` and reads time from `clock`.
    pub fn new(factory_id: FactoryId, ledger: Arc<dyn AssetLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            deriver: IdentifierDeriver::new(factory_id),
            ledger,
            clock,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Creates a vault owned by `creator` and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArguments`] if the request breaks a
    /// creation rule (see [`crate::validation`]).
    /// Returns [`VaultError::DuplicateAccount`] if the derived address is
    /// already registered.
    pub fn create_vault(
        &self,
        creator: &AccountId,
        allowed_assets: &[AssetId],
        lock_duration_secs: u64,
        purpose: &str,
    ) -> Result<(VaultAddress, VaultRecord), VaultError> {
        let mut registry = self.registry.write();

        let params = validate_creation(allowed_assets, lock_duration_secs, purpose)?;
        let salt = IdentifierDeriver::derive_salt(creator, purpose);
        let identifier = self.deriver.derive_identifier(
            creator,
            &params.allowed_assets,
            lock_duration_secs,
            purpose,
            &salt,
        );

        if registry.index.contains_key(&identifier) {
            return Err(VaultError::DuplicateAccount(identifier));
        }

        let created_at = self.clock.now();
        let unlock_at = created_at
            .checked_add_signed(params.lock_duration)
            .ok_or_else(|| {
                VaultError::InvalidArguments(format!(
                    "unlock time overflows: {} + {}s",
                    created_at, lock_duration_secs
                ))
            })?;

        let record = VaultRecord {
            identifier,
            creator: creator.clone(),
            allowed_assets: params.allowed_assets.clone(),
            lock_duration_secs,
            purpose: purpose.to_string(),
            salt,
            created_at,
            unlock_at,
        };
        let vault = Vault::new(
            identifier,
            creator.clone(),
            params.allowed_assets,
            created_at,
            unlock_at,
            self.ledger.clone(),
            self.clock.clone(),
        );

        let position = registry.records.len();
        registry.records.push(record.clone());
        registry.index.insert(identifier, position);
        registry.vaults.insert(identifier, Arc::new(vault));

        info!(
            vault = %identifier,
            creator = %creator,
            lock_secs = lock_duration_secs,
            purpose,
            "vault created"
        );
        Ok((identifier, record))
    }

    /// The address `create_vault` would assign, given an explicit salt.
    /// Read-only.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArguments`] under the same rules as
    /// [`create_vault`](Self::create_vault).
    pub fn compute_identifier(
        &self,
        creator: &AccountId,
        allowed_assets: &[AssetId],
        lock_duration_secs: u64,
        purpose: &str,
        salt: &Salt,
    ) -> Result<VaultAddress, VaultError> {
        let params = validate_creation(allowed_assets, lock_duration_secs, purpose)?;
        let identifier = self.deriver.derive_identifier(
            creator,
            &params.allowed_assets,
            lock_duration_secs,
            purpose,
            salt,
        );
        debug!(vault = %identifier, creator = %creator, "identifier computed");
        Ok(identifier)
    }

    /// Like [`compute_identifier`](Self::compute_identifier), deriving the
    /// salt from `(creator, purpose)` the way creation does.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidArguments`] for an invalid request.
    pub fn predict_identifier(
        &self,
        creator: &AccountId,
        allowed_assets: &[AssetId],
        lock_duration_secs: u64,
        purpose: &str,
    ) -> Result<(VaultAddress, Salt), VaultError> {
        let salt = IdentifierDeriver::derive_salt(creator, purpose);
        let identifier =
            self.compute_identifier(creator, allowed_assets, lock_duration_secs, purpose, &salt)?;
        Ok((identifier, salt))
    }

    /// Every record, in creation order.
    pub fn get_all_records(&self) -> Vec<VaultRecord> {
        self.registry.read().records.clone()
    }

    /// A window of the registry. Out-of-range offsets yield an empty page.
    pub fn records_page(&self, offset: usize, limit: usize) -> Vec<VaultRecord> {
        self.registry
            .read()
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Records created by `creator`, in creation order.
    pub fn records_by_creator(&self, creator: &AccountId) -> Vec<VaultRecord> {
        self.registry
            .read()
            .records
            .iter()
            .filter(|r| &r.creator == creator)
            .cloned()
            .collect()
    }

    /// The record for `identifier`, if registered.
    pub fn record(&self, identifier: &VaultAddress) -> Option<VaultRecord> {
        let registry = self.registry.read();
        registry
            .index
            .get(identifier)
            .map(|&i| registry.records[i].clone())
    }

    /// The live vault at `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultNotFound`] for an unknown address.
    pub fn vault(&self, identifier: &VaultAddress) -> Result<Arc<Vault>, VaultError> {
        self.registry
            .read()
            .vaults
            .get(identifier)
            .cloned()
            .ok_or(VaultError::VaultNotFound(*identifier))
    }

    /// Number of registered vaults.
    pub fn vault_count(&self) -> usize {
        self.registry.read().records.len()
    }

    /// This factory's namespace.
    pub fn factory_id(&self) -> FactoryId {
        self.deriver.factory()
    }
}
