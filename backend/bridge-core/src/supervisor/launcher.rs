//! The narrow process capability behind worker supervision.
//!
//! [`WorkerLauncher`] is the seam between readiness logic and the concrete
//! spawn mechanism: production uses [`NodeLauncher`] (a `node -e` subprocess
//! with the trust material injected as script constants), tests inject
//! scripted launchers that emit canned signal lines.

use crate::WORKER_BINARY;
use crate::error::supervisor::SupervisorError;

use common::{ErrorLocation, RedactedSecret};

use std::io::Error as IoError;
use std::io::ErrorKind;
use std::process::Stdio;

use log::{debug, info, trace};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

const EVAL_FLAG: &str = "-e";

/// Everything the worker must have before it can bind its listener.
pub struct LaunchParams {
    pub port: u16,
    pub ca_cert_pem: String,
    pub server_cert_pem: String,
    pub private_key_pem: Zeroizing<String>,
    pub auth_header: RedactedSecret,
}

/// A launched worker process, reduced to the three things supervision
/// needs: its pid, its out-of-band signal lines, and an exit notification.
pub struct WorkerHandle {
    pub pid: Option<u32>,
    pub live_signals: mpsc::UnboundedReceiver<String>,
    pub exit: oneshot::Receiver<Option<i32>>,
}

/// Launches the worker process.
///
/// Implementations must have the [`LaunchParams`] available to the worker
/// before it binds its listener, and must not block on the worker becoming
/// ready - readiness arrives later through the signal channel.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self, params: LaunchParams) -> Result<WorkerHandle, SupervisorError>;
}

/// Production launcher: runs `node -e <source>` where the source is the
/// bundled worker script prefixed with the launch parameters as `const`
/// declarations.
pub struct NodeLauncher {
    script: String,
}

impl NodeLauncher {
    /// `script` is the worker's bundled JavaScript source; asset loading is
    /// the host application's concern.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl WorkerLauncher for NodeLauncher {
    fn launch(&self, params: LaunchParams) -> Result<WorkerHandle, SupervisorError> {
        let source = assemble_worker_source(&params, &self.script);

        debug!("Launching {WORKER_BINARY} worker on port {}", params.port);

        let mut cmd = TokioCommand::new(WORKER_BINARY);
        cmd.arg(EVAL_FLAG)
            .arg(&source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The worker must not outlive the host process.
            .kill_on_drop(true);

        spawn_worker_handle(cmd)
    }
}

/// Spawn a prepared worker command and wire its stdio into a
/// [`WorkerHandle`].
///
/// Stdout is the out-of-band signal channel, forwarded line by line;
/// stderr is drained and trace-logged. Must be called from within a Tokio
/// runtime (the child and its readers live on spawned tasks).
///
/// # Errors
///
/// Returns [`SupervisorError::Spawn`] if the process cannot be spawned or
/// exposes no stdout pipe.
#[track_caller]
pub fn spawn_worker_handle(mut cmd: TokioCommand) -> Result<WorkerHandle, SupervisorError> {
    let location = ErrorLocation::capture();

    let mut child = cmd.spawn().map_err(|e| SupervisorError::Spawn {
        message: format!("failed to spawn worker process: {e}"),
        location,
        source: Box::new(e),
    })?;

    let pid = child.id();
    info!("Spawned worker process (PID: {pid:?})");

    let stdout = child.stdout.take().ok_or_else(|| SupervisorError::Spawn {
        message: String::from("worker process has no stdout"),
        location,
        source: Box::new(IoError::new(ErrorKind::NotFound, "no stdout pipe")),
    })?;

    if let Some(stderr) = child.stderr.take() {
        TokioSpawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!("Worker stderr: {line}");
            }
        });
    }

    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    TokioSpawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if signal_tx.send(line).is_err() {
                break;
            }
        }
    });

    let (exit_tx, exit_rx) = oneshot::channel();
    TokioSpawn(async move {
        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                debug!("Failed to await worker exit: {e}");
                None
            }
        };
        let _ = exit_tx.send(code);
    });

    Ok(WorkerHandle {
        pid,
        live_signals: signal_rx,
        exit: exit_rx,
    })
}

fn js_init_const(name: &str, value: &str) -> String {
    format!("const {name} = `{value}`;\n")
}

pub(crate) fn assemble_worker_source(params: &LaunchParams, script: &str) -> String {
    let mut src = String::new();
    src.push_str(&js_init_const("NODE_PORT", &params.port.to_string()));
    src.push_str(&js_init_const("NODE_SSL_CA", &params.ca_cert_pem));
    src.push_str(&js_init_const("NODE_SSL_CRT", &params.server_cert_pem));
    src.push_str(&js_init_const("NODE_SSL_KEY", &params.private_key_pem));
    src.push_str(&js_init_const("NODE_AUTH_HEADER", params.auth_header.expose()));
    src.push_str(script);
    src
}
