//! Integration tests for the vault factory and vault lifecycle.
//!
//! These drive the public API the way a client would: create through the
//! factory, look the vault up by address, deposit from several accounts,
//! move the clock past the lock and withdraw.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, TimeZone, Utc};
use piggybank_contracts::{VaultError, VaultFactory, VaultState};
use piggybank_protocol::{
    AccountId, AssetId, AssetLedger, FactoryId, IdentifierDeriver, LedgerError, ManualClock,
    MemoryLedger,
};

struct Env {
    factory: VaultFactory,
    ledger: Arc<MemoryLedger>,
    clock: Arc<ManualClock>,
}

/// Helper: a devnet factory over a funded in-memory ledger.
fn env() -> Env {
    let ledger = Arc::new(MemoryLedger::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    ));
    for account in ["U1", "U2"] {
        for asset in ["X", "Y", "Z", "W"] {
            ledger.mint(&account.into(), &asset.into(), 10_000).unwrap();
        }
    }
    let factory = VaultFactory::new(
        FactoryId::derive("devnet", "integration"),
        ledger.clone(),
        clock.clone(),
    );
    Env {
        factory,
        ledger,
        clock,
    }
}

fn assets(names: &[&str]) -> Vec<AssetId> {
    names.iter().map(|n| AssetId::from(*n)).collect()
}

fn u1() -> AccountId {
    "U1".into()
}

// ---------------------------------------------------------------------------
// Scenario Tests
// ---------------------------------------------------------------------------

#[test]
fn test_savings_scenario() {
    let env = env();
    let x = AssetId::from("X");

    let (predicted, _) = env
        .factory
        .predict_identifier(&u1(), &assets(&["X", "Y", "Z"]), 86_400, "Test Savings")
        .unwrap();
    let (addr, record) = env
        .factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 86_400, "Test Savings")
        .unwrap();
    assert_eq!(predicted, addr);
    assert_eq!(record.purpose, "Test Savings");
    assert_eq!(env.factory.get_all_records().len(), 1);

    let vault = env.factory.vault(&addr).unwrap();
    assert_eq!(vault.deposit(&u1(), &x, 500).unwrap(), 500);
    assert_eq!(vault.balance_of(&x), 500);

    // 1. Still locked one second early
    env.clock.advance(Duration::seconds(86_399));
    assert!(matches!(
        vault.withdraw(&u1()),
        Err(VaultError::StillLocked { .. })
    ));

    // 2. Unlocked at exactly unlock_at
    env.clock.advance(Duration::seconds(1));
    assert_eq!(vault.state(), VaultState::Unlocked);
    let receipt = vault.withdraw(&u1()).unwrap();
    assert_eq!(receipt.payouts.len(), 1);
    assert_eq!(receipt.payouts[0].amount, 500);
    assert_eq!(env.ledger.balance_of(&u1(), &x), 10_000);

    // 3. Only once
    assert_eq!(vault.withdraw(&u1()).unwrap_err(), VaultError::AlreadyWithdrawn);
    assert_eq!(vault.state(), VaultState::Withdrawn);
}

#[test]
fn two_asset_list_is_invalid() {
    let env = env();
    let two = assets(&["X", "Y"]);
    let salt = IdentifierDeriver::derive_salt(&u1(), "Test Savings");

    assert!(matches!(
        env.factory
            .compute_identifier(&u1(), &two, 86_400, "Test Savings", &salt),
        Err(VaultError::InvalidArguments(_))
    ));
    assert!(matches!(
        env.factory.create_vault(&u1(), &two, 86_400, "Test Savings"),
        Err(VaultError::InvalidArguments(_))
    ));
    assert!(env.factory.get_all_records().is_empty());
}

#[test]
fn duplicate_creation_is_rejected() {
    let env = env();
    env.factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 60, "rainy day")
        .unwrap();
    assert!(matches!(
        env.factory
            .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 60, "rainy day"),
        Err(VaultError::DuplicateAccount(_))
    ));
    assert_eq!(env.factory.vault_count(), 1);
}

#[test]
fn different_factories_hand_out_different_addresses() {
    let a = env();
    let b = VaultFactory::new(
        FactoryId::derive("testnet", "integration"),
        Arc::new(MemoryLedger::new()),
        Arc::new(ManualClock::default()),
    );
    let (addr_a, _) = a
        .factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 60, "p")
        .unwrap();
    let (addr_b, _) = b
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 60, "p")
        .unwrap();
    assert_ne!(addr_a, addr_b);
}

#[test]
fn deposits_are_monotonic_across_depositors() {
    let env = env();
    let (addr, _) = env
        .factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 60, "p")
        .unwrap();
    let vault = env.factory.vault(&addr).unwrap();
    let y = AssetId::from("Y");

    let mut last = 0;
    for (depositor, amount) in [("U1", 5), ("U2", 7), ("U1", 1)] {
        let balance = vault.deposit(&depositor.into(), &y, amount).unwrap();
        assert_eq!(balance, last + amount);
        last = balance;
    }
    assert_eq!(env.ledger.balance_of(vault.custody(), &y), 13);
}

#[test]
fn rolled_back_withdrawal_leaves_every_balance_as_it_was() {
    let env = env();
    let (addr, _) = env
        .factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 0, "p")
        .unwrap();
    let vault = env.factory.vault(&addr).unwrap();
    for asset in ["X", "Y", "Z"] {
        vault.deposit(&"U2".into(), &asset.into(), 100).unwrap();
    }
    env.ledger.set_frozen(&"Y".into(), true);

    assert!(matches!(
        vault.withdraw(&u1()),
        Err(VaultError::LedgerFailure(LedgerError::AssetFrozen(_)))
    ));
    for asset in assets(&["X", "Y", "Z"]) {
        assert_eq!(vault.balance_of(&asset), 100);
        assert_eq!(env.ledger.balance_of(vault.custody(), &asset), 100);
        assert_eq!(env.ledger.balance_of(&u1(), &asset), 10_000);
    }
    assert!(vault.withdrawn_at().is_none());
}

// ---------------------------------------------------------------------------
// Ledger failure
// ---------------------------------------------------------------------------

/// A ledger that refuses everything.
struct ClosedLedger;

impl AssetLedger for ClosedLedger {
    fn transfer_in(
        &self,
        _custody: &AccountId,
        _asset: &AssetId,
        _from: &AccountId,
        _amount: u64,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Rejected("ledger closed".into()))
    }

    fn transfer_out(
        &self,
        _custody: &AccountId,
        _asset: &AssetId,
        _to: &AccountId,
        _amount: u64,
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Rejected("ledger closed".into()))
    }
}

#[test]
fn failed_transfer_in_changes_nothing() {
    let factory = VaultFactory::new(
        FactoryId::derive("devnet", "closed"),
        Arc::new(ClosedLedger),
        Arc::new(ManualClock::default()),
    );
    let (addr, _) = factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 0, "p")
        .unwrap();
    let vault = factory.vault(&addr).unwrap();

    let err = vault.deposit(&u1(), &"X".into(), 10).unwrap_err();
    assert_eq!(
        err,
        VaultError::LedgerFailure(LedgerError::Rejected("ledger closed".into()))
    );
    assert!(vault.balances().iter().all(|(_, b)| *b == 0));

    // Nothing to pay out, so the closed ledger is never asked.
    assert!(vault.withdraw(&u1()).unwrap().payouts.is_empty());
}

// ---------------------------------------------------------------------------
// Failed reversal
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryLedger`] and refuses chosen assets per direction.
struct PausableLedger {
    inner: MemoryLedger,
    paused_in: Mutex<HashSet<AssetId>>,
    paused_out: Mutex<HashSet<AssetId>>,
}

impl PausableLedger {
    fn new(inner: MemoryLedger) -> Self {
        Self {
            inner,
            paused_in: Mutex::new(HashSet::new()),
            paused_out: Mutex::new(HashSet::new()),
        }
    }

    fn refused(set: &Mutex<HashSet<AssetId>>, asset: &AssetId) -> Result<(), LedgerError> {
        if set.lock().unwrap().contains(asset) {
            return Err(LedgerError::Rejected(format!("{} paused", asset)));
        }
        Ok(())
    }
}

impl AssetLedger for PausableLedger {
    fn transfer_in(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        from: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        Self::refused(&self.paused_in, asset)?;
        self.inner.transfer_in(custody, asset, from, amount)
    }

    fn transfer_out(
        &self,
        custody: &AccountId,
        asset: &AssetId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        Self::refused(&self.paused_out, asset)?;
        self.inner.transfer_out(custody, asset, to, amount)
    }
}

#[test]
fn failed_reversal_debits_book_and_vault_stays_withdrawable() {
    let inner = MemoryLedger::new();
    for asset in ["X", "Y", "Z"] {
        inner.mint(&u1(), &asset.into(), 10).unwrap();
    }
    let ledger = Arc::new(PausableLedger::new(inner));
    let factory = VaultFactory::new(
        FactoryId::derive("devnet", "pausable"),
        ledger.clone(),
        Arc::new(ManualClock::default()),
    );
    let (addr, _) = factory
        .create_vault(&u1(), &assets(&["X", "Y", "Z"]), 0, "p")
        .unwrap();
    let vault = factory.vault(&addr).unwrap();
    for asset in ["X", "Y", "Z"] {
        vault.deposit(&u1(), &asset.into(), 10).unwrap();
    }

    // X pays out, Y is refused, and returning X to custody is refused too.
    ledger.paused_out.lock().unwrap().insert("Y".into());
    ledger.paused_in.lock().unwrap().insert("X".into());
    assert_eq!(
        vault.withdraw(&u1()).unwrap_err(),
        VaultError::LedgerFailure(LedgerError::Rejected("Y paused".into()))
    );

    for asset in assets(&["X", "Y", "Z"]) {
        assert_eq!(
            vault.balance_of(&asset),
            ledger.inner.balance_of(vault.custody(), &asset),
            "book and custody disagree on {}",
            asset
        );
    }
    assert_eq!(vault.balance_of(&"X".into()), 0);
    assert_eq!(ledger.inner.balance_of(&u1(), &"X".into()), 10);

    ledger.paused_out.lock().unwrap().clear();
    let receipt = vault.withdraw(&u1()).unwrap();
    let paid: Vec<&str> = receipt.payouts.iter().map(|p| p.asset.as_str()).collect();
    assert_eq!(paid, vec!["Y", "Z"]);
    assert_eq!(vault.state(), VaultState::Withdrawn);
}
