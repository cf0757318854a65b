//! Worker lifecycle: ephemeral port pick, launch, and the readiness state
//! machine driven by the worker's out-of-band signals.

pub mod launcher;
pub mod readiness;

pub use launcher::{LaunchParams, NodeLauncher, WorkerHandle, WorkerLauncher, spawn_worker_handle};
pub use readiness::{ReadinessProbe, ReadinessState};

use crate::WORKER_BASE_URL;
use crate::channel;
use crate::error::channel::ChannelError;
use crate::error::supervisor::SupervisorError;
use crate::trust::Credential;

use common::{ErrorLocation, RedactedSecret};
use models::{TrustBundle, WorkerInfo, WorkerInfoBuilder};

use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, info, trace, warn};
use readiness::ReadinessCell;
use regex::Regex;
use reqwest::Client;
use tokio::spawn as TokioSpawn;
use zeroize::Zeroizing;

/// The exact liveness marker: one line beginning with this prefix flips the
/// worker to Ready. Every other signal line is informational.
pub const READY_MARKER_PREFIX: &str = "listening on ";

const MARKER_PATTERN: &str = r"^listening on (?P<port>\d+)$";
const LOOPBACK_BIND_ADDR: &str = "127.0.0.1";

static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

pub(crate) fn get_marker_regex() -> &'static Regex {
    MARKER_REGEX.get_or_init(|| Regex::new(MARKER_PATTERN).expect("valid regex pattern"))
}

/// Where and how to reach the worker: loopback port, Authorization value,
/// and the mutually-authenticated TLS client. Set once during startup,
/// read-only afterward.
#[derive(Clone)]
pub struct WorkerEndpoint {
    pub port: u16,
    pub auth_header: RedactedSecret,
    pub channel: Client,
}

/// Owns a single worker process for its whole lifetime.
///
/// Starting a second worker requires a fresh supervisor; `start()` on a
/// supervisor that has left `NotStarted` fails with `AlreadyStarted`.
pub struct WorkerSupervisor {
    launcher: Arc<dyn WorkerLauncher>,
    bundle: TrustBundle,
    credential: Credential,
    channel: Client,
    readiness: Arc<ReadinessCell>,
    endpoint: OnceLock<WorkerEndpoint>,
    info: OnceLock<WorkerInfo>,
}

impl WorkerSupervisor {
    /// Build a supervisor around a trust bundle and credential.
    ///
    /// The TLS channel is constructed eagerly: a bundle that cannot produce
    /// a channel must abort startup before any worker is launched.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Setup`] if the TLS context cannot be built.
    pub fn new(
        bundle: TrustBundle,
        credential: Credential,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Result<Self, ChannelError> {
        let channel = channel::build(&bundle)?;

        Ok(Self {
            launcher,
            bundle,
            credential,
            channel,
            readiness: Arc::new(ReadinessCell::new()),
            endpoint: OnceLock::new(),
            info: OnceLock::new(),
        })
    }

    /// Launch the worker and transition to `Starting` without blocking on
    /// the worker becoming ready.
    ///
    /// Picks an ephemeral loopback port, hands the trust material and port
    /// to the launcher, and spawns a monitor task that drives the readiness
    /// state machine from the worker's signal lines and exit. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::AlreadyStarted`] if called in any state other
    ///   than `NotStarted`
    /// * [`SupervisorError::PortBind`] / [`SupervisorError::Spawn`] if the
    ///   port pick or launch fails (the supervisor then records `Failed`)
    #[track_caller]
    pub fn start(&self) -> Result<(), SupervisorError> {
        let location = ErrorLocation::capture();

        if !self.readiness.transition(ReadinessState::Starting) {
            return Err(SupervisorError::AlreadyStarted {
                message: format!("worker already started (state: {})", self.state()),
                location,
            });
        }

        let port = match bind_ephemeral_port() {
            Ok(port) => port,
            Err(e) => {
                self.readiness.transition(ReadinessState::Failed);
                return Err(e);
            }
        };

        info!("Reserved loopback port {port} for worker");

        let params = LaunchParams {
            port,
            ca_cert_pem: self.bundle.ca_cert_pem.clone(),
            server_cert_pem: self.bundle.server_cert_pem.clone(),
            private_key_pem: Zeroizing::new(self.bundle.private_key_pem.clone()),
            auth_header: self.credential.auth_header().clone(),
        };

        let handle = match self.launcher.launch(params) {
            Ok(handle) => handle,
            Err(e) => {
                self.readiness.transition(ReadinessState::Failed);
                return Err(e);
            }
        };

        let _ = self.endpoint.set(WorkerEndpoint {
            port,
            auth_header: self.credential.auth_header().clone(),
            channel: self.channel.clone(),
        });

        if let Some(pid) = handle.pid {
            match WorkerInfoBuilder::default()
                .with_pid(pid)
                .with_port(port)
                .with_base_url(format!("{WORKER_BASE_URL}:{port}"))
                .with_owned(true)
                .build()
            {
                Ok(info) => {
                    let _ = self.info.set(info);
                }
                Err(e) => warn!("Could not record worker info: {e}"),
            }
        }

        TokioSpawn(monitor_worker(handle, Arc::clone(&self.readiness), port));

        Ok(())
    }

    /// Non-blocking, thread-safe readiness read. Never blocks on the worker
    /// starting.
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn state(&self) -> ReadinessState {
        self.readiness.current()
    }

    /// A cloneable readiness view for the protocol client.
    pub fn probe(&self) -> ReadinessProbe {
        ReadinessProbe::new(Arc::clone(&self.readiness))
    }

    /// The worker endpoint, available once `start()` has assigned a port.
    pub fn endpoint(&self) -> Option<WorkerEndpoint> {
        self.endpoint.get().cloned()
    }

    /// Snapshot of the launched process, if the launcher reported a pid.
    pub fn worker_info(&self) -> Option<WorkerInfo> {
        self.info.get().cloned()
    }

    /// Block the calling task until the worker is Ready, it has Failed, or
    /// the timeout elapses.
    ///
    /// A timed-out wait leaves the supervisor consistent: a Ready signal
    /// arriving later is still recorded for future callers, this particular
    /// waiter just gives up.
    ///
    /// # Errors
    ///
    /// * [`SupervisorError::StartFailed`] if the worker process exited
    /// * [`SupervisorError::StartTimeout`] if the timeout elapsed first
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), SupervisorError> {
        let location = ErrorLocation::capture();
        let mut rx = self.readiness.subscribe();

        let wait = async {
            loop {
                let state = *rx.borrow_and_update();
                match state {
                    ReadinessState::Ready => return Ok(()),
                    ReadinessState::Failed => {
                        return Err(SupervisorError::StartFailed {
                            message: String::from("worker process exited before becoming ready"),
                            location,
                        });
                    }
                    _ => {}
                }
                if rx.changed().await.is_err() {
                    return Err(SupervisorError::StartFailed {
                        message: String::from("readiness channel closed"),
                        location,
                    });
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(SupervisorError::StartTimeout {
                message: format!("worker did not become ready within {timeout:?}"),
                location,
            }),
        }
    }
}

/// Drive the readiness state machine from the worker's signal lines and
/// exit notification.
async fn monitor_worker(
    mut handle: WorkerHandle,
    readiness: Arc<ReadinessCell>,
    expected_port: u16,
) {
    loop {
        tokio::select! {
            maybe_line = handle.live_signals.recv() => {
                match maybe_line {
                    Some(line) => handle_signal_line(&line, &readiness, expected_port),
                    // Signal channel closed (stdout EOF); the exit
                    // notification is still pending below.
                    None => break,
                }
            }
            exit = &mut handle.exit => {
                record_worker_exit(exit.ok().flatten(), &readiness);
                return;
            }
        }
    }

    let exit = (&mut handle.exit).await;
    record_worker_exit(exit.ok().flatten(), &readiness);
}

fn handle_signal_line(line: &str, readiness: &ReadinessCell, expected_port: u16) {
    if !line.starts_with(READY_MARKER_PREFIX) {
        trace!("Worker signal: {line}");
        return;
    }

    if let Some(port) = get_marker_regex()
        .captures(line)
        .and_then(|caps| caps.name("port"))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        && port != expected_port
    {
        warn!("Worker reported unexpected port: {port}, expected {expected_port}");
    }

    if readiness.transition(ReadinessState::Ready) {
        info!("Worker is ready on port {expected_port}");
    }
}

fn record_worker_exit(code: Option<i32>, readiness: &ReadinessCell) {
    warn!("Worker process exited (code: {code:?})");
    if !readiness.transition(ReadinessState::Failed) {
        debug!("Worker exit observed in state {}", readiness.current());
    }
}

/// Bind-then-release: open a loopback socket on port 0 to let the OS pick a
/// free port, record it, close the socket, and pass the number to the
/// worker. Another process could claim the port in the gap; this is an
/// accepted risk for a loopback-only, same-user helper process.
#[track_caller]
fn bind_ephemeral_port() -> Result<u16, SupervisorError> {
    let location = ErrorLocation::capture();

    let listener =
        StdTcpListener::bind((LOOPBACK_BIND_ADDR, 0)).map_err(|e| SupervisorError::PortBind {
            message: format!("failed to bind ephemeral loopback port: {e}"),
            location,
            source: e,
        })?;

    let port = listener
        .local_addr()
        .map_err(|e| SupervisorError::PortBind {
            message: format!("failed to read bound port: {e}"),
            location,
            source: e,
        })?
        .port();

    drop(listener);
    Ok(port)
}
