//! A stand-in worker for integration tests: a real mutual-TLS listener
//! speaking the wire protocol, with per-test endpoint behavior.
//!
//! The TLS side mirrors the production worker exactly - it serves the
//! bundle's certificate, requires a client certificate chaining to the
//! bundle CA, and rejects wrong Authorization values with the worker's
//! error shape - so every test request exercises the full trust path.

use bridge_core::protocol::ProtocolClient;
use bridge_core::supervisor::{
    LaunchParams, WorkerEndpoint, WorkerHandle, WorkerLauncher, WorkerSupervisor,
};
use bridge_core::trust::Credential;
use bridge_core::error::supervisor::SupervisorError;

use models::TrustBundle;

use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::sync::{Arc, Once};
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_rustls::TlsAcceptor;

static CRYPTO_INIT: Once = Once::new();

/// Initializes the rustls crypto provider for the stub's server side.
/// Tolerates the channel layer having installed one already.
pub fn init_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// One parsed wire frame as the stub received it.
pub struct StubRequest {
    pub endpoint: String,
    pub metadata: serde_json::Value,
    pub payload: Vec<u8>,
}

pub struct StubResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// The worker's error shape: `{"error":{"message","stack"}}`.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": {
                "message": message,
                "stack": format!("Error: {message}\n    at handleReq (worker.js:1:1)"),
            }
        });
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }
}

pub type Handler = Arc<dyn Fn(StubRequest) -> StubResponse + Send + Sync>;

pub struct StubWorker {
    pub port: u16,
}

/// Start the stub on an ephemeral loopback port.
pub async fn start(bundle: &TrustBundle, credential: &Credential, handler: Handler) -> StubWorker {
    init_crypto();

    let acceptor = TlsAcceptor::from(server_config(bundle));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub should bind a loopback port");
    let port = listener
        .local_addr()
        .expect("stub should expose its port")
        .port();
    let expected_auth = credential.auth_header().expose().to_string();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let expected_auth = expected_auth.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let _ = serve_connection(&mut tls, &expected_auth, handler.as_ref()).await;
                    let _ = tls.shutdown().await;
                }
            });
        }
    });

    StubWorker { port }
}

fn server_config(bundle: &TrustBundle) -> Arc<ServerConfig> {
    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(bundle.ca_cert_pem.as_bytes()) {
        roots
            .add(cert.expect("CA PEM should parse"))
            .expect("CA certificate should be addable");
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .expect("client verifier should build");

    let certs = CertificateDer::pem_slice_iter(bundle.server_cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("server PEM should parse");
    let key = PrivateKeyDer::from_pem_slice(bundle.private_key_pem.as_bytes())
        .expect("key PEM should parse");

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .expect("server config should build");

    Arc::new(config)
}

async fn serve_connection<S>(
    stream: &mut S,
    expected_auth: &str,
    handler: &(dyn Fn(StubRequest) -> StubResponse + Send + Sync),
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (headers, mut body) = read_head(stream).await?;

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while body.len() < content_length {
        let mut chunk = vec![0u8; content_length - body.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let response = if headers.get("authorization").map(String::as_str) != Some(expected_auth) {
        StubResponse::error(401, "Wrong Authorization")
    } else {
        handler(parse_frame(&body))
    };

    write_response(stream, &response).await
}

async fn read_head<S>(stream: &mut S) -> std::io::Result<(HashMap<String, String>, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let rest = buf[end + 4..].to_vec();

            let mut headers = HashMap::new();
            for line in head.lines().skip(1) {
                if let Some((name, value)) = line.split_once(':') {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
            }
            return Ok((headers, rest));
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(IoError::new(
                ErrorKind::UnexpectedEof,
                "connection closed before headers ended",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Split the frame at its two newline separators: endpoint line, metadata
/// line, raw payload.
fn parse_frame(body: &[u8]) -> StubRequest {
    let first_nl = body.iter().position(|&b| b == b'\n').unwrap_or(body.len());
    let endpoint = String::from_utf8_lossy(&body[..first_nl]).to_string();

    let rest: &[u8] = body.get(first_nl + 1..).unwrap_or_default();
    let second_nl = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    let metadata = serde_json::from_slice(&rest[..second_nl]).unwrap_or(serde_json::Value::Null);
    let payload = rest.get(second_nl + 1..).unwrap_or_default().to_vec();

    StubRequest {
        endpoint,
        metadata,
        payload,
    }
}

async fn write_response<S>(stream: &mut S, response: &StubResponse) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        500 => "Internal Server Error",
        _ => "Error",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        response.status,
        reason,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await
}

/// A launcher that reports its assigned port as listening immediately -
/// the supervisor reaches Ready without any real process.
pub struct EchoLauncher;

impl WorkerLauncher for EchoLauncher {
    fn launch(&self, params: LaunchParams) -> Result<WorkerHandle, SupervisorError> {
        let (signal_tx, live_signals) = mpsc::unbounded_channel();
        let (exit_tx, exit) = oneshot::channel();

        signal_tx
            .send(format!("listening on {}", params.port))
            .expect("signal channel should be open");

        // Keep both channels open for the stubbed worker's lifetime.
        tokio::spawn(async move {
            let _keep_signals = signal_tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = exit_tx.send(None);
        });

        Ok(WorkerHandle {
            pid: Some(7),
            live_signals,
            exit,
        })
    }
}

/// Like [`EchoLauncher`], but the marker arrives only after `delay` -
/// models a worker that takes a while to bind its listener.
pub struct DelayedEchoLauncher {
    pub delay: Duration,
}

impl WorkerLauncher for DelayedEchoLauncher {
    fn launch(&self, params: LaunchParams) -> Result<WorkerHandle, SupervisorError> {
        let (signal_tx, live_signals) = mpsc::unbounded_channel();
        let (exit_tx, exit) = oneshot::channel();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signal_tx.send(format!("listening on {}", params.port));
            let _keep_signals = signal_tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            let _ = exit_tx.send(None);
        });

        Ok(WorkerHandle {
            pid: Some(7),
            live_signals,
            exit,
        })
    }
}

/// A started (but not awaited) supervisor plus a protocol client pointed
/// at `port` (usually a [`StubWorker`]'s port rather than the
/// supervisor's own).
pub fn started_client(
    bundle: &TrustBundle,
    credential: &Credential,
    port: u16,
    launcher: Arc<dyn WorkerLauncher>,
) -> (WorkerSupervisor, ProtocolClient) {
    let supervisor = WorkerSupervisor::new(bundle.clone(), credential.clone(), launcher)
        .expect("supervisor should build");
    supervisor.start().expect("start should succeed");

    let endpoint = WorkerEndpoint {
        port,
        auth_header: credential.auth_header().clone(),
        channel: supervisor
            .endpoint()
            .expect("endpoint should exist after start")
            .channel,
    };
    let client =
        ProtocolClient::new(&endpoint, supervisor.probe()).expect("client should build");

    (supervisor, client)
}

/// A ready supervisor plus a protocol client pointed at `port`.
pub async fn ready_client(
    bundle: &TrustBundle,
    credential: &Credential,
    port: u16,
) -> (WorkerSupervisor, ProtocolClient) {
    let (supervisor, client) = started_client(bundle, credential, port, Arc::new(EchoLauncher));
    supervisor
        .wait_until_ready(Duration::from_secs(2))
        .await
        .expect("echo launcher should mark ready");
    (supervisor, client)
}
