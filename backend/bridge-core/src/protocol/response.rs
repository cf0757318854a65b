//! Typed decoding of worker responses.
//!
//! Three consumption modes exist, matching the worker's response shapes:
//! a single eager JSON document, a header line plus raw payload bytes, and
//! the streaming decrypt shape (header line with declared block metas, then
//! one JSON block per line, decoded lazily).

use crate::error::protocol::ProtocolError;

use common::{ErrorLocation, HttpStatusCode};
use models::{MsgBlock, MsgBlockMeta};

use std::io::Error as IoError;
use std::pin::Pin;

use futures_util::TryStreamExt;
use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const BLOCK_METAS_KEY: &str = "blockMetas";

type BodyReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// A successful (HTTP 200) worker response, not yet decoded.
///
/// All decode modes consume the handle: a response body is forward-only and
/// not restartable. Dropping the handle - or the [`BlockStream`] derived
/// from it - releases the underlying connection.
pub struct WorkerResponse {
    status: HttpStatusCode,
    body: BodyReader,
}

impl WorkerResponse {
    pub(crate) fn from_http(response: reqwest::Response) -> Self {
        let status = HttpStatusCode::from(response.status().as_u16());
        let stream = response.bytes_stream().map_err(IoError::other);
        let reader = BufReader::new(StreamReader::new(stream));
        Self {
            status,
            body: Box::pin(reader),
        }
    }

    /// Decoding seam for tests: any buffered reader can stand in for a
    /// network body.
    #[cfg(test)]
    pub(crate) fn from_reader(status: HttpStatusCode, body: BodyReader) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> HttpStatusCode {
        self.status
    }

    /// Eagerly decode the entire body as one JSON document.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::Transport`] if reading the body fails
    /// * [`ProtocolError::Decode`] if the body is not the expected shape -
    ///   for a single-result endpoint the shape is mandatory
    pub async fn json<T: DeserializeOwned>(mut self) -> Result<T, ProtocolError> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .await
            .map_err(read_failure)?;

        serde_json::from_slice(&buf).map_err(|e| ProtocolError::Decode {
            message: format!("response body is not the expected JSON document: {e}"),
            location: ErrorLocation::capture(),
        })
    }

    /// Decode the header line, then collect the remaining raw payload
    /// bytes (the shape used by the encrypt and file-decrypt endpoints).
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::Transport`] if reading fails
    /// * [`ProtocolError::Decode`] if the header line is not valid JSON
    pub async fn into_payload(mut self) -> Result<(Value, Vec<u8>), ProtocolError> {
        let header_line = read_line(&mut self.body).await.map_err(read_failure)?;

        let header = serde_json::from_str(&header_line).map_err(|e| ProtocolError::Decode {
            message: format!("response header is not valid JSON: {e}"),
            location: ErrorLocation::capture(),
        })?;

        let mut data = Vec::new();
        self.body
            .read_to_end(&mut data)
            .await
            .map_err(read_failure)?;

        Ok((header, data))
    }

    /// Switch to the streaming decrypt shape.
    pub fn into_block_stream(self) -> BlockStream {
        BlockStream::new(self.body)
    }
}

/// Lazy, finite, forward-only sequence of decrypted message blocks.
///
/// The header line is decoded on first access and the rest of the stream is
/// left untouched; each [`next_block`](BlockStream::next_block) call
/// consumes exactly one line. The decoder is deliberately lenient: it only
/// distinguishes "a well-formed block was read" from "no more well-formed
/// blocks". Comparing what was read against the declared metas is the
/// caller's data-integrity concern.
pub struct BlockStream {
    body: Option<BodyReader>,
    header: Option<Value>,
    metas: Vec<MsgBlockMeta>,
    header_read: bool,
}

impl BlockStream {
    fn new(body: BodyReader) -> Self {
        Self {
            body: Some(body),
            header: None,
            metas: Vec::new(),
            header_read: false,
        }
    }

    /// The raw header document, if one was decoded.
    pub async fn header_json(&mut self) -> Option<&Value> {
        self.ensure_header().await;
        self.header.as_ref()
    }

    /// The declared block metas, in stream order.
    ///
    /// A header with a missing or mistyped `blockMetas` key degrades to an
    /// empty list: zero metas is a valid-but-empty result, not an error
    /// signal by itself.
    pub async fn block_metas(&mut self) -> &[MsgBlockMeta] {
        self.ensure_header().await;
        &self.metas
    }

    /// Read the next block, or `None` terminally once a line cannot be
    /// parsed as a block (malformed JSON, missing fields, or stream
    /// exhausted) - the normal end-of-stream condition.
    ///
    /// Reaching the terminal state releases the underlying connection; so
    /// does dropping the stream before exhaustion.
    pub async fn next_block(&mut self) -> Option<MsgBlock> {
        self.ensure_header().await;

        let read_result = match self.body.as_mut() {
            Some(body) => read_line(body).await,
            None => return None,
        };

        let line = match read_result {
            Ok(line) => line,
            Err(e) => {
                debug!("Block stream read failed: {e}");
                self.release();
                return None;
            }
        };

        if line.is_empty() {
            self.release();
            return None;
        }

        match serde_json::from_str::<MsgBlock>(&line) {
            Ok(block) => Some(block),
            Err(e) => {
                trace!("End of block stream: {e}");
                self.release();
                None
            }
        }
    }

    async fn ensure_header(&mut self) {
        if self.header_read {
            return;
        }
        self.header_read = true;

        let read_result = match self.body.as_mut() {
            Some(body) => read_line(body).await,
            None => return,
        };

        let line = match read_result {
            Ok(line) => line,
            Err(e) => {
                debug!("Failed to read stream header: {e}");
                self.release();
                return;
            }
        };

        match serde_json::from_str::<Value>(&line) {
            Ok(value) => {
                self.metas = value
                    .get(BLOCK_METAS_KEY)
                    .and_then(|v| serde_json::from_value::<Vec<MsgBlockMeta>>(v.clone()).ok())
                    .unwrap_or_default();
                self.header = Some(value);
            }
            Err(e) => {
                debug!("Stream header is not valid JSON, treating as empty result: {e}");
            }
        }
    }

    fn release(&mut self) {
        // Dropping the reader closes the underlying connection.
        self.body = None;
    }
}

/// Read one `\n`-terminated line, without the terminator. An empty string
/// means the stream is exhausted.
async fn read_line(body: &mut BodyReader) -> std::io::Result<String> {
    let mut line = String::new();
    body.read_line(&mut line).await?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn read_failure(error: IoError) -> ProtocolError {
    ProtocolError::Transport {
        message: format!("failed to read response body: {error}"),
        location: ErrorLocation::capture(),
        source: Box::new(error),
    }
}
