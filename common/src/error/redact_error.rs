use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when code attempts to serialize a value that must stay redacted.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Serialization Error: {message} {location}")]
    Serialization {
        message: String,
        location: ErrorLocation,
    },
}
