// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PiggyBank Protocol: Core Primitives
//!
//! Everything the vault factory needs that is not the factory itself:
//! typed identities, the deterministic address derivation, the asset ledger
//! seam, and a clock you can actually control in tests.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants. Every magic number lives here.
//! - **crypto**: BLAKE3 hashing helpers with domain separation.
//! - **identity**: Account and asset identifiers.
//! - **derivation**: Salt and vault address derivation (CREATE2-shaped).
//! - **ledger**: The `AssetLedger` trait plus an in-memory implementation.
//! - **clock**: Wall clock and manual clock behind one trait.
//!
//! ## Design Philosophy
//!
//! 1. Derivation is pure. Same inputs, same address, on every machine.
//! 2. Value moves only through the ledger trait, so it can be swapped out.
//! 3. Amounts are `u64` in smallest units and every addition is checked.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod derivation;
pub mod identity;
pub mod ledger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use derivation::{FactoryId, IdentifierDeriver, Salt, VaultAddress};
pub use identity::{AccountId, AssetId};
pub use ledger::{AssetLedger, LedgerError, MemoryLedger};
