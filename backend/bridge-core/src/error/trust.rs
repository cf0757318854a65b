use common::ErrorLocation;

use serde::de::StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TrustError {
    /// A cached bundle failed parse-validation. Recoverable: the caller
    /// falls back to generating a fresh bundle.
    #[error("Malformed Trust Bundle: {message} {location}")]
    MalformedBundle {
        message: String,
        location: ErrorLocation,
    },

    #[error("Trust Generation Error: {message} {location}")]
    Generation {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}
