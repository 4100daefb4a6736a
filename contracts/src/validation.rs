//! Validation rules for vault creation requests.
//!
//! The factory's `create_vault` and its read-only twin `compute_identifier`
//! both run [`validate_creation`] before deriving anything, so a request that
//! predicts successfully will also create successfully (unless the same
//! vault was created in between).
//!
//! Rules, checked in order and short-circuiting on the first failure:
//!
//! 1. exactly [`ALLOWED_ASSET_COUNT`] asset ids, none empty, none repeated;
//! 2. lock duration at most [`MAX_LOCK_DURATION_SECS`];
//! 3. purpose at most [`MAX_PURPOSE_LENGTH`] bytes.

use std::collections::HashSet;

use chrono::Duration;
use piggybank_protocol::config::{ALLOWED_ASSET_COUNT, MAX_LOCK_DURATION_SECS, MAX_PURPOSE_LENGTH};
use piggybank_protocol::AssetId;

use crate::error::VaultError;

/// The fixed-size asset whitelist every vault carries.
pub type AllowedAssets = [AssetId; ALLOWED_ASSET_COUNT];

/// A creation request that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParams {
    /// The asset whitelist, in the caller's order.
    pub allowed_assets: AllowedAssets,
    /// The lock duration, ready to add to a timestamp.
    pub lock_duration: Duration,
}

/// Checks the asset list and returns it as a fixed-size array.
pub fn validate_allowed_assets(assets: &[AssetId]) -> Result<AllowedAssets, VaultError> {
    if assets.len() != ALLOWED_ASSET_COUNT {
        return Err(VaultError::InvalidArguments(format!(
            "exactly {} allowed assets required, got {}",
            ALLOWED_ASSET_COUNT,
            assets.len()
        )));
    }

    if let Some(pos) = assets.iter().position(AssetId::is_empty) {
        return Err(VaultError::InvalidArguments(format!(
            "allowed asset #{} is empty",
            pos
        )));
    }

    let mut seen = HashSet::with_capacity(ALLOWED_ASSET_COUNT);
    for asset in assets {
        if !seen.insert(asset) {
            return Err(VaultError::InvalidArguments(format!(
                "allowed asset {} is listed more than once",
                asset
            )));
        }
    }

    assets
        .to_vec()
        .try_into()
        .map_err(|_| VaultError::InvalidArguments("malformed asset list".into()))
}

/// Checks the lock duration and converts it to a [`Duration`].
pub fn validate_lock_duration(lock_duration_secs: u64) -> Result<Duration, VaultError> {
    if lock_duration_secs > MAX_LOCK_DURATION_SECS {
        return Err(VaultError::InvalidArguments(format!(
            "lock duration {}s exceeds the maximum of {}s",
            lock_duration_secs, MAX_LOCK_DURATION_SECS
        )));
    }
    Ok(Duration::seconds(lock_duration_secs as i64))
}

/// Converts a signed lock duration from a transport layer. Negative values
/// are caller errors.
pub fn lock_duration_from_signed(lock_duration_secs: i64) -> Result<u64, VaultError> {
    u64::try_from(lock_duration_secs).map_err(|_| {
        VaultError::InvalidArguments(format!(
            "lock duration must be non-negative, got {}",
            lock_duration_secs
        ))
    })
}

/// Checks the purpose label.
pub fn validate_purpose(purpose: &str) -> Result<(), VaultError> {
    if purpose.len() > MAX_PURPOSE_LENGTH {
        return Err(VaultError::InvalidArguments(format!(
            "purpose is {} bytes, maximum is {}",
            purpose.len(),
            MAX_PURPOSE_LENGTH
        )));
    }
    Ok(())
}

/// Runs every creation rule in order.
pub fn validate_creation(
    allowed_assets: &[AssetId],
    lock_duration_secs: u64,
    purpose: &str,
) -> Result<ValidatedParams, VaultError> {
    let allowed_assets = validate_allowed_assets(allowed_assets)?;
    let lock_duration = validate_lock_duration(lock_duration_secs)?;
    validate_purpose(purpose)?;
    Ok(ValidatedParams {
        allowed_assets,
        lock_duration,
    })
}
