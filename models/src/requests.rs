//! Typed request payloads for the worker endpoints.
//!
//! Field names follow the worker's validation schema exactly (camelCase on
//! the wire), so these serialize straight into the metadata line of a
//! framed request.

use serde::{Deserialize, Serialize};

/// An armored private key plus its long key id, as the worker expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrvKeyInfo {
    pub private: String,
    pub longid: String,
}

/// Metadata for the `encryptMsg` endpoint; the plaintext travels as the
/// binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptMsgRequest {
    #[serde(rename = "pubKeys")]
    pub pub_keys: Vec<String>,
}

/// Metadata for the `encryptFile` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptFileRequest {
    #[serde(rename = "pubKeys")]
    pub pub_keys: Vec<String>,
    pub name: String,
}

/// Metadata for the `decryptMsg` endpoint; the ciphertext travels as the
/// binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptMsgRequest {
    pub keys: Vec<PrvKeyInfo>,
    pub passphrases: Vec<String>,
    #[serde(rename = "msgPwd", skip_serializing_if = "Option::is_none")]
    pub msg_pwd: Option<String>,
}

/// Metadata for the `decryptFile` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptFileRequest {
    pub keys: Vec<PrvKeyInfo>,
    pub passphrases: Vec<String>,
    #[serde(rename = "msgPwd", skip_serializing_if = "Option::is_none")]
    pub msg_pwd: Option<String>,
}
