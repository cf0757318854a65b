use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use serde::de::StdError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ProtocolError {
    /// The worker is not ready to receive connections. Raised before any
    /// network attempt when readiness is not `Ready`, and for the
    /// connection-refused race right after the marker. Retryable.
    #[error("Worker Not Ready: {message} {location}")]
    NotReady {
        message: String,
        location: ErrorLocation,
    },

    /// Any other network-level failure. Not retried automatically.
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The worker answered with a non-200 status. `message` and `stack`
    /// come from the worker's error body when it parses; otherwise
    /// `message` preserves the raw body text verbatim.
    #[error("Remote Error: {status} {message} {location}")]
    Remote {
        status: HttpStatusCode,
        message: String,
        stack: Option<String>,
        location: ErrorLocation,
    },

    /// Response bytes did not match a mandatory JSON shape.
    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },
}

impl ProtocolError {
    /// Whether a caller may retry the request after backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::NotReady { .. })
    }
}

impl From<url::ParseError> for ProtocolError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        ProtocolError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
