//! Decrypted message blocks and their declared metadata.
//!
//! A decrypt response starts with a header listing one [`MsgBlockMeta`] per
//! block, followed by one JSON line per block. The count and order of metas
//! must match the streamed blocks; a consumer must not read more blocks
//! than metas declare.

use serde::{Deserialize, Serialize};

/// Rendered HTML block content.
pub const BLOCK_TYPE_HTML: &str = "html";

/// Plain text block content.
pub const BLOCK_TYPE_TEXT: &str = "text";

/// Declared type and length of one upcoming block, emitted in the
/// streaming response header before any block is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBlockMeta {
    #[serde(rename = "type")]
    pub block_type: String,
    pub length: u64,
}

/// One decrypted content segment, decoded from a single response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: String,
}
