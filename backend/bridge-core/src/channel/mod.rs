//! Secure channel construction: a TLS client that trusts only the bundle
//! CA and presents the bundle's own certificate for mutual authentication.

use crate::error::channel::ChannelError;

use common::ErrorLocation;
use models::TrustBundle;

use std::sync::Once;
use std::time::Duration;

use log::debug;
use reqwest::{Certificate, Client, Identity};

static CRYPTO_INIT: Once = Once::new();

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-read timeout rather than a whole-request timeout: streaming decrypt
/// responses are consumed incrementally and must not be cut off mid-stream.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the reusable TLS client for the worker channel.
///
/// The trust store contains only the bundle's CA, so no other local process
/// can impersonate the worker or intercept traffic. The bundle's server
/// certificate and key double as the client identity - both ends belong to
/// the same trust domain. Connection keep-alive is disabled because the
/// protocol is one request per connection.
///
/// # Errors
///
/// Returns [`ChannelError::Setup`] if the certificate or key material is
/// unusable or the TLS context cannot be constructed. This is fatal to the
/// worker instance; callers must not swallow it.
#[track_caller]
pub fn build(bundle: &TrustBundle) -> Result<Client, ChannelError> {
    init_crypto();

    let ca = Certificate::from_pem(bundle.ca_cert_pem.as_bytes())
        .map_err(setup_error("CA certificate rejected"))?;

    let identity = Identity::from_pem(bundle.identity_pem().as_bytes())
        .map_err(setup_error("client identity rejected"))?;

    let client = Client::builder()
        .tls_certs_only([ca])
        .identity(identity)
        .pool_max_idle_per_host(0)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .build()
        .map_err(setup_error("TLS client construction failed"))?;

    debug!("Secure channel constructed (CA-pinned, mutual auth)");
    Ok(client)
}

/// Pin the process-default rustls crypto provider before any TLS context
/// is constructed. Tolerates a provider some other component installed
/// first.
fn init_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[track_caller]
fn setup_error(context: &'static str) -> impl FnOnce(reqwest::Error) -> ChannelError {
    let location = ErrorLocation::capture();
    move |e| ChannelError::Setup {
        message: format!("{context}: {e}"),
        location,
        source: Box::new(e),
    }
}
