//! # PiggyBank Contracts
//!
//! The vault factory and the vaults it creates.
//!
//! - **Factory**: validates creation requests, derives the vault address
//!   deterministically, instantiates the vault and appends an immutable
//!   record to an append-only registry that anyone can query.
//! - **Vault**: accepts deposits of exactly three asset types and releases
//!   everything to its owner, once, after the time lock expires.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. `checked_add` everywhere.
//! 2. State transitions are explicit: [`VaultState`] is an enum, not a
//!    pair of booleans.
//! 3. Nothing is half-applied. A failed ledger call leaves the vault's books
//!    exactly as they were.
//! 4. Every public record type is serializable (serde) for wire transport.

pub mod error;
pub mod factory;
pub mod validation;
pub mod vault;

pub use error::VaultError;
pub use factory::{VaultFactory, VaultRecord};
pub use vault::{Payout, Vault, VaultSnapshot, VaultState, WithdrawalReceipt};
