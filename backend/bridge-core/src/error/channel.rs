use common::ErrorLocation;

use serde::de::StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ChannelError {
    /// TLS context construction failed. Fatal to this worker instance;
    /// never ignored.
    #[error("Channel Setup Error: {message} {location}")]
    Setup {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}
