//! In-band decrypt failure reported by the worker.

use serde::{Deserialize, Serialize};

/// A failed decrypt attempt, carried in a `success: false` response header.
///
/// This is an expected alternate outcome (wrong key, missing passphrase),
/// not a protocol failure: the request itself succeeded with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: String,
}
