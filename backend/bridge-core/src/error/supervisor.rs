use common::ErrorLocation;

use serde::de::StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    /// `start()` was called while the supervisor was not in `NotStarted`.
    #[error("Already Started: {message} {location}")]
    AlreadyStarted {
        message: String,
        location: ErrorLocation,
    },

    #[error("Port Bind Error: {message} {location}")]
    PortBind {
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The worker process exited before (or after) reaching Ready.
    #[error("Worker Start Failed: {message} {location}")]
    StartFailed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Worker Start Timeout: {message} {location}")]
    StartTimeout {
        message: String,
        location: ErrorLocation,
    },
}
