//! The PEM triple that establishes the loopback trust domain.

use serde::{Deserialize, Serialize};

/// CA certificate, server certificate and private key, all PEM-encoded.
///
/// The server certificate is signed by the CA; the private key is the
/// counterpart of the server certificate's public key. The same pair is
/// used as the worker's server identity and as the host's client identity,
/// since both ends belong to the same trust domain.
///
/// A bundle is created once per worker-process lifetime, either freshly
/// generated or restored from the on-disk cache, and is immutable after
/// construction. This struct is the exact shape of the cache blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustBundle {
    pub ca_cert_pem: String,
    pub server_cert_pem: String,
    pub private_key_pem: String,
}

impl TrustBundle {
    /// The identity PEM expected by TLS client builders: certificate
    /// followed by its private key.
    pub fn identity_pem(&self) -> String {
        format!("{}{}", self.server_cert_pem, self.private_key_pem)
    }
}
