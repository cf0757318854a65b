//! Trust bootstrap: the self-signed CA and the localhost server certificate
//! that pin both ends of the loopback channel to this process.
//!
//! Generating a bundle costs several hundred milliseconds (dominated by TLS
//! context construction downstream), which is why callers cache the result
//! and [`restore`] it on later starts. Correctness depends only on the
//! bundle content, not on when it was generated: any valid self-signed
//! bundle works.

pub mod credential;

pub use credential::Credential;

use crate::error::trust::TrustError;

use common::ErrorLocation;
use models::TrustBundle;

use log::{debug, info};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose, SanType,
    SerialNumber,
};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use time::{Duration, OffsetDateTime};

const CA_COMMON_NAME: &str = "CA Cert";
const SERVER_COMMON_NAME: &str = "localhost";

/// Certificates are long-lived because the bundle is cached and reused
/// across host restarts, matching the cache contract - NOT because long
/// validity is desirable in general. Shortening this requires adding
/// rotation and invalidating cached bundles.
const CERT_VALIDITY: Duration = Duration::days(25 * 365);

/// Generate a fresh trust bundle: a self-signed CA plus a `localhost`
/// server certificate signed by it.
///
/// Key pairs are rcgen's default ECDSA P-256. Serial numbers derive from
/// the generation timestamp so each generation is unique.
///
/// # Errors
///
/// Returns [`TrustError::Generation`] if key generation or signing fails.
#[track_caller]
pub fn generate() -> Result<TrustBundle, TrustError> {
    let issued_at = OffsetDateTime::now_utc();
    let serial_base = unix_millis(issued_at);

    debug!("Generating trust bundle (serial base {serial_base})");

    let ca_key = KeyPair::generate().map_err(generation_error("CA key generation failed"))?;
    let mut ca_params = CertificateParams::default();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, CA_COMMON_NAME);
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
    ];
    ca_params.not_before = issued_at;
    ca_params.not_after = issued_at + CERT_VALIDITY;
    ca_params.serial_number = Some(SerialNumber::from_slice(&serial_base.to_be_bytes()));
    let ca_cert = ca_params
        .self_signed(&ca_key)
        .map_err(generation_error("CA self-signing failed"))?;

    let server_key =
        KeyPair::generate().map_err(generation_error("server key generation failed"))?;
    let mut server_params = CertificateParams::default();
    server_params
        .distinguished_name
        .push(DnType::CommonName, SERVER_COMMON_NAME);
    // rustls validates against SAN entries, not the CN.
    server_params.subject_alt_names = vec![SanType::DnsName(
        SERVER_COMMON_NAME
            .try_into()
            .map_err(generation_error("invalid server DNS name"))?,
    )];
    server_params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
        KeyUsagePurpose::DataEncipherment,
        KeyUsagePurpose::KeyAgreement,
    ];
    server_params.not_before = issued_at;
    server_params.not_after = issued_at + CERT_VALIDITY;
    server_params.serial_number = Some(SerialNumber::from_slice(
        &(serial_base + 1).to_be_bytes(),
    ));
    let server_cert = server_params
        .signed_by(&server_key, &ca_cert, &ca_key)
        .map_err(generation_error("server certificate signing failed"))?;

    info!("Generated trust bundle for {SERVER_COMMON_NAME}");

    Ok(TrustBundle {
        ca_cert_pem: ca_cert.pem(),
        server_cert_pem: server_cert.pem(),
        private_key_pem: server_key.serialize_pem(),
    })
}

/// Validate a cached bundle: every PEM blob must parse as a well-formed
/// certificate or private key.
///
/// The caller decides whether to fall back to [`generate`] on failure.
///
/// # Errors
///
/// Returns [`TrustError::MalformedBundle`] if any blob fails to parse.
#[track_caller]
pub fn restore(cached: TrustBundle) -> Result<TrustBundle, TrustError> {
    let ca_certs = parse_certificates(&cached.ca_cert_pem, "CA certificate")?;
    if ca_certs.is_empty() {
        return Err(TrustError::MalformedBundle {
            message: String::from("cached CA PEM contains no certificates"),
            location: ErrorLocation::capture(),
        });
    }

    let server_certs = parse_certificates(&cached.server_cert_pem, "server certificate")?;
    if server_certs.is_empty() {
        return Err(TrustError::MalformedBundle {
            message: String::from("cached server PEM contains no certificates"),
            location: ErrorLocation::capture(),
        });
    }

    parse_private_key(&cached.private_key_pem)?;

    debug!("Restored trust bundle from cache");
    Ok(cached)
}

#[track_caller]
fn parse_certificates(pem: &str, what: &str) -> Result<Vec<CertificateDer<'static>>, TrustError> {
    CertificateDer::pem_slice_iter(pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TrustError::MalformedBundle {
            message: format!("failed to parse {what}: {e:?}"),
            location: ErrorLocation::capture(),
        })
}

#[track_caller]
fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, TrustError> {
    PrivateKeyDer::from_pem_slice(pem.as_bytes()).map_err(|e| TrustError::MalformedBundle {
        message: format!("failed to parse private key: {e:?}"),
        location: ErrorLocation::capture(),
    })
}

#[track_caller]
fn generation_error<E>(context: &'static str) -> impl FnOnce(E) -> TrustError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let location = ErrorLocation::capture();
    move |e| TrustError::Generation {
        message: format!("{context}: {e}"),
        location,
        source: Box::new(e),
    }
}

fn unix_millis(at: OffsetDateTime) -> u64 {
    u64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
}
