//! # Hashing Utilities
//!
//! BLAKE3 is the only hash function PiggyBank uses. It is fast, it is a
//! proper cryptographic hash, and its `derive_key` mode gives us domain
//! separation without hand-rolled tag prefixes.
//!
//! Every digest that ends up inside an address goes through one of the
//! functions below, so the address format is defined in exactly one place
//! together with [`crate::derivation`].

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use piggybank_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"piggybank");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeding the parts sequentially into one hasher yields the same digest as
/// hashing their concatenation.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("a", data)` and `domain_separated_hash("b", data)`
/// never collide, because the context selects a different internal IV.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}
