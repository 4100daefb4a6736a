//! # Cryptographic Primitives
//!
//! Thin wrappers around BLAKE3. Nothing here is clever, and that's the point.

pub mod hash;

pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash};
