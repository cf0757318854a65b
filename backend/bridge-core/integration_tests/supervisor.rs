// Supervisor tests against real subprocesses. Uses `sh` in place of the
// worker runtime: what is under test is process supervision - spawn, stdout
// signal plumbing, exit detection - not the worker itself.

#![cfg(unix)]

use bridge_core::error::supervisor::SupervisorError;
use bridge_core::supervisor::{
    LaunchParams, ReadinessState, WorkerHandle, WorkerLauncher, WorkerSupervisor,
    spawn_worker_handle,
};
use bridge_core::trust::{self, Credential};

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command as TokioCommand;

/// Launches `sh -c <script>` with `{port}` substituted, reusing the
/// production stdio wiring.
struct ShellLauncher {
    script: String,
}

impl ShellLauncher {
    fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl WorkerLauncher for ShellLauncher {
    fn launch(&self, params: LaunchParams) -> Result<WorkerHandle, SupervisorError> {
        let script = self.script.replace("{port}", &params.port.to_string());
        let mut cmd = TokioCommand::new("sh");
        cmd.arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        spawn_worker_handle(cmd)
    }
}

fn shell_supervisor(script: &str) -> WorkerSupervisor {
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    WorkerSupervisor::new(bundle, credential, Arc::new(ShellLauncher::new(script)))
        .expect("supervisor should build")
}

async fn wait_for_state(supervisor: &WorkerSupervisor, wanted: ReadinessState) {
    for _ in 0..200 {
        if supervisor.state() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!(
        "supervisor never reached {wanted}, still {}",
        supervisor.state()
    );
}

/// **VALUE**: Verifies the full spawn path with a real process: command
/// launch, piped stdout as the signal channel, marker recognition.
///
/// **WHY THIS MATTERS**: The scripted-launcher unit tests bypass process
/// plumbing entirely. Only a real child process proves the stdout reader
/// task, line splitting and marker detection work against an OS pipe.
///
/// **BUG THIS CATCHES**: Would catch stdout not being piped, the reader
/// task dying early, or buffering holding the marker back.
#[tokio::test]
async fn given_real_process_emitting_marker_when_starting_then_becomes_ready() {
    // GIVEN: A shell worker that reports its port and stays alive briefly
    let supervisor = shell_supervisor("echo \"listening on {port}\"; sleep 5");

    // WHEN: Starting and waiting
    supervisor.start().expect("start should succeed");
    supervisor
        .wait_until_ready(Duration::from_secs(5))
        .await
        .expect("marker should arrive from the real process");

    // THEN: Ready
    assert!(supervisor.is_ready());
}

/// **VALUE**: Verifies a real process that exits without the marker drives
/// the state to Failed and waiters get StartFailed.
///
/// **WHY THIS MATTERS**: A worker that crashes on boot (bad script, missing
/// runtime) must fail fast and diagnosably, not time out.
///
/// **BUG THIS CATCHES**: Would catch the exit-wait task losing the child or
/// the monitor ignoring the exit notification.
#[tokio::test]
async fn given_real_process_exiting_early_when_waiting_then_start_failed() {
    // GIVEN: A shell worker that dies immediately
    let supervisor = shell_supervisor("exit 3");

    // WHEN: Starting and waiting
    supervisor.start().expect("start should succeed");
    let result = supervisor.wait_until_ready(Duration::from_secs(5)).await;

    // THEN: StartFailed and the state records it
    assert!(matches!(result, Err(SupervisorError::StartFailed { .. })));
    assert_eq!(supervisor.state(), ReadinessState::Failed);
}

/// **VALUE**: Verifies Ready→Failed when a real worker exits after its
/// marker.
///
/// **WHY THIS MATTERS**: The Ready→Failed edge is the only transition that
/// happens long after startup; it depends on the exit-wait task surviving
/// for the worker's whole lifetime.
///
/// **BUG THIS CATCHES**: Would catch the monitor task returning after the
/// marker instead of staying subscribed to the exit.
#[tokio::test]
async fn given_real_process_exiting_after_marker_then_state_becomes_failed() {
    // GIVEN: A shell worker that reports ready and then exits
    let supervisor = shell_supervisor("echo \"listening on {port}\"; sleep 0.2; exit 0");

    // WHEN: It becomes ready, then dies
    supervisor.start().expect("start should succeed");
    supervisor
        .wait_until_ready(Duration::from_secs(5))
        .await
        .expect("marker should arrive");

    // THEN: The exit is recorded as Failed
    wait_for_state(&supervisor, ReadinessState::Failed).await;
    assert!(!supervisor.is_ready());
}

/// **VALUE**: Verifies stderr output never affects readiness.
///
/// **WHY THIS MATTERS**: The marker contract is specific to the designated
/// signal channel (stdout). A worker complaining on stderr with
/// marker-like text must not flip the state.
///
/// **BUG THIS CATCHES**: Would catch stderr lines being merged into the
/// signal channel.
#[tokio::test]
async fn given_marker_text_on_stderr_when_starting_then_state_stays_starting() {
    // GIVEN: A shell worker that only "reports" on stderr
    let supervisor = shell_supervisor("echo \"listening on {port}\" 1>&2; sleep 5");

    // WHEN: Starting and waiting briefly
    supervisor.start().expect("start should succeed");
    let result = supervisor
        .wait_until_ready(Duration::from_millis(500))
        .await;

    // THEN: Timeout, still Starting
    assert!(matches!(result, Err(SupervisorError::StartTimeout { .. })));
    assert_eq!(supervisor.state(), ReadinessState::Starting);
}
