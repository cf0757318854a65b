//! The framed request protocol spoken over the secure channel.
//!
//! One request per connection: POST to the worker's root URL with the
//! Authorization header, body = endpoint line, metadata JSON line, then the
//! optional raw binary payload (no length prefix; connection close delimits
//! it).

pub mod response;

pub use response::{BlockStream, WorkerResponse};

use crate::error::protocol::ProtocolError;
use crate::supervisor::{ReadinessProbe, WorkerEndpoint};

use common::{ErrorLocation, HttpStatusCode, RedactedSecret};

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, trace};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONNECTION};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep as TokioSleep;
use url::Url;

const FRAME_SEPARATOR: u8 = b'\n';
const EMPTY_METADATA: &[u8] = b"{}";

/// Wire shape of the worker's error body: `{"error":{"message","stack"}}`.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: RemoteErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorDetail {
    message: String,
    #[serde(default)]
    stack: Option<String>,
}

/// Sends framed requests to the worker and hands back typed response
/// handles.
///
/// Cheap to clone conceptually but deliberately not `Clone`: independent
/// requests already get independent connections from the shared channel.
pub struct ProtocolClient {
    channel: Client,
    base_url: Url,
    auth_header: RedactedSecret,
    readiness: ReadinessProbe,
}

impl ProtocolClient {
    /// Build a client for a started worker.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UrlParse`] if the endpoint port does not
    /// form a valid URL (practically unreachable for a bound port).
    pub fn new(
        endpoint: &WorkerEndpoint,
        readiness: ReadinessProbe,
    ) -> Result<Self, ProtocolError> {
        let base_url = Url::parse(&format!(
            "{}:{}/",
            crate::WORKER_BASE_URL,
            endpoint.port
        ))?;

        Ok(Self {
            channel: endpoint.channel.clone(),
            base_url,
            auth_header: endpoint.auth_header.clone(),
            readiness,
        })
    }

    /// Send one framed request and return the response handle.
    ///
    /// Fails fast with `NotReady` - without any network attempt - unless
    /// the worker state is Ready, since connecting to a not-yet-listening
    /// worker would waste the full TCP connect timeout. A connection
    /// refused at the transport layer (the readiness race) maps to the
    /// same `NotReady` kind; everything else maps to `Transport`.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::NotReady`] - worker not ready; retryable
    /// * [`ProtocolError::Transport`] - other network failure; not retried
    /// * [`ProtocolError::Remote`] - worker answered non-200
    pub async fn send(
        &self,
        endpoint: &str,
        metadata: Option<&Value>,
        payload: Option<&[u8]>,
    ) -> Result<WorkerResponse, ProtocolError> {
        let location = ErrorLocation::capture();

        if !self.readiness.is_ready() {
            return Err(ProtocolError::NotReady {
                message: format!(
                    "worker is not ready to receive connections (state: {})",
                    self.readiness.current()
                ),
                location,
            });
        }

        let frame = build_frame(endpoint, metadata, payload)?;
        trace!("Sending {endpoint} request ({} frame bytes)", frame.len());

        let response = self
            .channel
            .post(self.base_url.clone())
            .header(AUTHORIZATION, self.auth_header.expose())
            .header(CONNECTION, "close")
            .body(frame)
            .send()
            .await
            .map_err(|e| map_transport_error(e, location))?;

        let status = HttpStatusCode::from(response.status().as_u16());
        if status.is_success() {
            return Ok(WorkerResponse::from_http(response));
        }

        debug!("Worker answered {endpoint} with status {status}");
        Err(read_remote_error(status, response, location).await)
    }

    /// Like [`send`](Self::send), retrying `NotReady` outcomes with
    /// exponential backoff until `max_elapsed` is spent. Every other
    /// outcome is returned immediately.
    ///
    /// # Errors
    ///
    /// The last `NotReady` error once the backoff budget is exhausted, or
    /// whatever non-retryable error the final attempt produced.
    pub async fn send_with_retry(
        &self,
        endpoint: &str,
        metadata: Option<&Value>,
        payload: Option<&[u8]>,
        max_elapsed: Duration,
    ) -> Result<WorkerResponse, ProtocolError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(max_elapsed),
            ..Default::default()
        };

        loop {
            match self.send(endpoint, metadata, payload).await {
                Err(e) if e.is_retryable() => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("Worker not ready, retrying {endpoint} after {duration:?}");
                        TokioSleep(duration).await;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }
}

/// Assemble the wire frame: endpoint line, compact metadata JSON line
/// (defaults to `{}`), then the raw payload bytes.
pub(crate) fn build_frame(
    endpoint: &str,
    metadata: Option<&Value>,
    payload: Option<&[u8]>,
) -> Result<Vec<u8>, ProtocolError> {
    let metadata_bytes = match metadata {
        Some(value) => serde_json::to_vec(value).map_err(|e| ProtocolError::Decode {
            message: format!("request metadata failed to serialize: {e}"),
            location: ErrorLocation::capture(),
        })?,
        None => EMPTY_METADATA.to_vec(),
    };

    let payload_len = payload.map_or(0, <[u8]>::len);
    let mut frame =
        Vec::with_capacity(endpoint.len() + 1 + metadata_bytes.len() + 1 + payload_len);
    frame.extend_from_slice(endpoint.as_bytes());
    frame.push(FRAME_SEPARATOR);
    frame.extend_from_slice(&metadata_bytes);
    frame.push(FRAME_SEPARATOR);
    if let Some(data) = payload {
        frame.extend_from_slice(data);
    }

    Ok(frame)
}

fn map_transport_error(error: reqwest::Error, location: ErrorLocation) -> ProtocolError {
    if is_connection_refused(&error) {
        // The worker's listener is not bound yet despite a Ready state -
        // the accepted bind-then-release race. Retryable.
        return ProtocolError::NotReady {
            message: format!("worker refused the connection: {error}"),
            location,
        };
    }

    ProtocolError::Transport {
        message: format!("request failed: {error}"),
        location,
        source: Box::new(error),
    }
}

fn is_connection_refused(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }
        source = cause.source();
    }
    false
}

async fn read_remote_error(
    status: HttpStatusCode,
    response: reqwest::Response,
    location: ErrorLocation,
) -> ProtocolError {
    let raw = response.text().await.unwrap_or_default();
    decode_remote_error(status, raw, location)
}

/// Decode a non-200 body into a `Remote` error. An unparseable body never
/// loses information: the raw status and raw text are preserved verbatim.
pub(crate) fn decode_remote_error(
    status: HttpStatusCode,
    raw: String,
    location: ErrorLocation,
) -> ProtocolError {
    match serde_json::from_str::<RemoteErrorBody>(&raw) {
        Ok(body) => ProtocolError::Remote {
            status,
            message: body.error.message,
            stack: body.error.stack,
            location,
        },
        Err(_) => ProtocolError::Remote {
            status,
            message: raw,
            stack: None,
            location,
        },
    }
}
