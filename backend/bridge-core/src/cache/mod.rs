//! On-disk cache for the trust bundle.
//!
//! The blob is exactly the three PEM strings of a [`TrustBundle`]. It is
//! read once at process start and written once after a fresh generation.
//! A missing, unreadable or corrupt cache is a cache-miss (the caller
//! regenerates), never a fatal error.

use crate::error::cache::CacheError;

use common::ErrorLocation;
use models::TrustBundle;

use std::path::Path;

use log::{info, warn};

const CACHE_FILE_NAME: &str = "trust-bundle.json";

/// Load the cached bundle from `{cache_dir}/trust-bundle.json`.
///
/// Returns `None` on any failure - missing file, unreadable file, corrupt
/// JSON - so the caller falls back to generation.
pub fn load(cache_dir: &Path) -> Option<TrustBundle> {
    let path = cache_dir.join(CACHE_FILE_NAME);

    if !path.exists() {
        info!("Trust bundle cache not found at {}", path.display());
        return None;
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read trust bundle cache, treating as miss: {e}");
            return None;
        }
    };

    match serde_json::from_str::<TrustBundle>(&contents) {
        Ok(bundle) => {
            info!("Trust bundle cache loaded from {}", path.display());
            Some(bundle)
        }
        Err(e) => {
            warn!("Corrupt trust bundle cache, treating as miss: {e}");
            None
        }
    }
}

/// Save a freshly generated bundle using an atomic temp-file + rename
/// write (no corruption on crash).
///
/// # Errors
///
/// Returns [`CacheError`] if directory creation, serialization, the write
/// or the rename fails.
#[track_caller]
pub fn save(bundle: &TrustBundle, cache_dir: &Path) -> Result<(), CacheError> {
    std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Write {
        location: ErrorLocation::capture(),
        path: cache_dir.to_path_buf(),
        source: e,
    })?;

    let path = cache_dir.join(CACHE_FILE_NAME);
    let temp_path = cache_dir.join(format!("{CACHE_FILE_NAME}.tmp"));

    let json = serde_json::to_string_pretty(bundle).map_err(|e| CacheError::Serialize {
        location: ErrorLocation::capture(),
        reason: e.to_string(),
    })?;

    std::fs::write(&temp_path, json).map_err(|e| CacheError::Write {
        location: ErrorLocation::capture(),
        path: temp_path.clone(),
        source: e,
    })?;

    // Atomic rename (POSIX guarantees atomicity)
    std::fs::rename(&temp_path, &path).map_err(|e| CacheError::Write {
        location: ErrorLocation::capture(),
        path: path.clone(),
        source: e,
    })?;

    info!("Trust bundle cache saved to {}", path.display());
    Ok(())
}
