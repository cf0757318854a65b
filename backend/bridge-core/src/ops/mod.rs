//! Typed wrappers over the worker endpoints.
//!
//! Endpoint names and request shapes match the worker's validation schema.
//! Decrypt failures reported in-band (`success: false` headers) are data -
//! an expected alternate outcome - and come back as `Failed` variants, not
//! as `Err`.

use crate::error::protocol::ProtocolError;
use crate::protocol::{BlockStream, ProtocolClient};

use common::ErrorLocation;
use models::{
    DecryptError, DecryptFileRequest, DecryptMsgRequest, EncryptFileRequest, EncryptMsgRequest,
};

use serde::Serialize;
use serde_json::Value;

pub const ENDPOINT_VERSION: &str = "version";
pub const ENDPOINT_ENCRYPT_MSG: &str = "encryptMsg";
pub const ENDPOINT_DECRYPT_MSG: &str = "decryptMsg";
pub const ENDPOINT_ENCRYPT_FILE: &str = "encryptFile";
pub const ENDPOINT_DECRYPT_FILE: &str = "decryptFile";

/// Outcome of a message decrypt: a lazy block stream, or the worker's
/// in-band failure.
pub enum DecryptMsgOutcome {
    Blocks(BlockStream),
    Failed(DecryptError),
}

/// A successfully decrypted file.
pub struct DecryptedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Outcome of a file decrypt.
pub enum DecryptFileOutcome {
    File(DecryptedFile),
    Failed(DecryptError),
}

/// Query the worker's runtime versions.
///
/// # Errors
///
/// Per-request protocol failures; [`ProtocolError::Decode`] if the body is
/// not a JSON document.
pub async fn version(client: &ProtocolClient) -> Result<Value, ProtocolError> {
    client.send(ENDPOINT_VERSION, None, None).await?.json().await
}

/// Encrypt a message for the given public keys; returns the armored
/// ciphertext bytes.
///
/// # Errors
///
/// Per-request protocol failures.
pub async fn encrypt_msg(
    client: &ProtocolClient,
    request: &EncryptMsgRequest,
    plaintext: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let metadata = to_metadata(request)?;
    let response = client
        .send(ENDPOINT_ENCRYPT_MSG, Some(&metadata), Some(plaintext))
        .await?;
    let (_, armored) = response.into_payload().await?;
    Ok(armored)
}

/// Encrypt a named file; returns the binary ciphertext bytes.
///
/// # Errors
///
/// Per-request protocol failures.
pub async fn encrypt_file(
    client: &ProtocolClient,
    request: &EncryptFileRequest,
    data: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let metadata = to_metadata(request)?;
    let response = client
        .send(ENDPOINT_ENCRYPT_FILE, Some(&metadata), Some(data))
        .await?;
    let (_, encrypted) = response.into_payload().await?;
    Ok(encrypted)
}

/// Decrypt a message into a lazy stream of content blocks.
///
/// # Errors
///
/// Per-request protocol failures. An in-band decrypt failure is returned
/// as [`DecryptMsgOutcome::Failed`], not as `Err`.
pub async fn decrypt_msg(
    client: &ProtocolClient,
    request: &DecryptMsgRequest,
    ciphertext: &[u8],
) -> Result<DecryptMsgOutcome, ProtocolError> {
    let metadata = to_metadata(request)?;
    let response = client
        .send(ENDPOINT_DECRYPT_MSG, Some(&metadata), Some(ciphertext))
        .await?;

    let mut stream = response.into_block_stream();
    if let Some(err) = in_band_failure(stream.header_json().await) {
        return Ok(DecryptMsgOutcome::Failed(err));
    }

    Ok(DecryptMsgOutcome::Blocks(stream))
}

/// Decrypt a file.
///
/// # Errors
///
/// Per-request protocol failures. An in-band decrypt failure is returned
/// as [`DecryptFileOutcome::Failed`], not as `Err`.
pub async fn decrypt_file(
    client: &ProtocolClient,
    request: &DecryptFileRequest,
    ciphertext: &[u8],
) -> Result<DecryptFileOutcome, ProtocolError> {
    let metadata = to_metadata(request)?;
    let response = client
        .send(ENDPOINT_DECRYPT_FILE, Some(&metadata), Some(ciphertext))
        .await?;

    let (header, data) = response.into_payload().await?;
    if let Some(err) = in_band_failure(Some(&header)) {
        return Ok(DecryptFileOutcome::Failed(err));
    }

    let name = header
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(DecryptFileOutcome::File(DecryptedFile { name, data }))
}

fn to_metadata<T: Serialize>(request: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(request).map_err(|e| ProtocolError::Decode {
        message: format!("request metadata failed to serialize: {e}"),
        location: ErrorLocation::capture(),
    })
}

fn in_band_failure(header: Option<&Value>) -> Option<DecryptError> {
    let header = header?;
    if header.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }

    let err = header
        .get("error")
        .and_then(|v| serde_json::from_value::<DecryptError>(v.clone()).ok())
        .unwrap_or_else(|| DecryptError {
            error_type: String::from("unknown"),
            error: String::from("worker reported failure without details"),
        });

    Some(err)
}
