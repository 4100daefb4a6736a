//! # Protocol Configuration & Constants
//!
//! Every magic number in PiggyBank lives here. If you're hardcoding a
//! constant somewhere else, move it here.
//!
//! The derivation contexts are part of the address format. Changing any of
//! them changes every vault address ever predicted, so treat them as frozen.

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Mainnet factory namespace.
pub const NETWORK_MAINNET: &str = "mainnet";

/// Testnet factory namespace.
pub const NETWORK_TESTNET: &str = "testnet";

/// Devnet: the only network where the node's faucet is enabled.
pub const NETWORK_DEVNET: &str = "devnet";

/// Factory label used when the operator does not provide one.
pub const DEFAULT_FACTORY_LABEL: &str = "piggybank-factory-v1";

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Vault Parameters
// ---------------------------------------------------------------------------

/// Number of asset types every vault must accept. Not "at least", exactly.
pub const ALLOWED_ASSET_COUNT: usize = 3;

/// Upper bound on the lock duration: 100 years of 365 days.
///
/// Keeps `created_at + lock_duration` inside chrono's representable range.
pub const MAX_LOCK_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Maximum purpose label length in bytes.
pub const MAX_PURPOSE_LENGTH: usize = 256;

// ---------------------------------------------------------------------------
// Derivation Parameters
// ---------------------------------------------------------------------------

/// Vault address length in bytes. Same width as an EVM address.
pub const ADDRESS_LENGTH: usize = 20;

/// BLAKE3 output length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Leading byte of the address preimage, mirroring CREATE2.
pub const ADDRESS_PREFIX_BYTE: u8 = 0xff;

/// BLAKE3 `derive_key` context for salts.
pub const SALT_CONTEXT: &str = "piggybank 2026-01 vault salt v1";

/// BLAKE3 `derive_key` context for the creation-parameter hash.
pub const INIT_CONTEXT: &str = "piggybank 2026-01 vault init params v1";

/// BLAKE3 `derive_key` context for factory namespaces.
pub const FACTORY_CONTEXT: &str = "piggybank 2026-01 factory id v1";

/// Prefix of the ledger account that holds a vault's funds.
pub const CUSTODY_ACCOUNT_PREFIX: &str = "vault:";

// ---------------------------------------------------------------------------
// Node Parameters
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Default page size for record listings.
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Hard cap on a single record page.
pub const MAX_PAGE_LIMIT: usize = 1_000;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Returns `true` for the three networks the node knows how to run.
pub fn is_known_network(name: &str) -> bool {
    matches!(name, NETWORK_MAINNET | NETWORK_TESTNET | NETWORK_DEVNET)
}

/// Normalizes a network name for logging. Unknown names are flagged rather
/// than guessed.
pub fn network_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    if is_known_network(&lowered) {
        lowered
    } else {
        format!("unknown({})", name)
    }
}
