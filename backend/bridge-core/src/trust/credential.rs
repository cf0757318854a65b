//! Application-layer credential shared with the worker at launch.

use common::RedactedSecret;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use rand::rngs::OsRng;

const SECRET_BYTES: usize = 32;

/// The shared secret and the Authorization value derived from it.
///
/// Generated fresh on every process start and never cached: the TLS bundle
/// survives restarts, the bearer credential does not. Authenticates
/// application-layer requests independently of the TLS handshake.
#[derive(Debug, Clone)]
pub struct Credential {
    shared_secret: RedactedSecret,
    auth_header_value: RedactedSecret,
}

impl Credential {
    /// Generate a fresh 32-byte secret and its `Basic` Authorization value.
    ///
    /// The header value is a deterministic encoding of the secret, so the
    /// worker can compare incoming Authorization headers byte-for-byte.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let shared_secret = STANDARD.encode(bytes);
        let auth_header_value = format!("Basic {}", STANDARD.encode(shared_secret.as_bytes()));

        Self {
            shared_secret: RedactedSecret::new(shared_secret),
            auth_header_value: RedactedSecret::new(auth_header_value),
        }
    }

    /// The raw shared secret.
    pub fn shared_secret(&self) -> &RedactedSecret {
        &self.shared_secret
    }

    /// The value sent in the `Authorization` header of every request.
    pub fn auth_header(&self) -> &RedactedSecret {
        &self.auth_header_value
    }
}
