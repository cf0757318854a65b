// Unit tests for the supervisor lifecycle, driven by a scripted launcher
// whose signal and exit channels the test controls directly.

use crate::error::supervisor::SupervisorError;
use crate::supervisor::{
    LaunchParams, ReadinessState, WorkerHandle, WorkerLauncher, WorkerSupervisor,
};
use crate::trust::{self, Credential};

use common::ErrorLocation;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

/// Hands out a pre-built handle once; the test keeps the sending ends.
struct ScriptedLauncher {
    handle: Mutex<Option<WorkerHandle>>,
}

impl ScriptedLauncher {
    fn new(handle: WorkerHandle) -> Self {
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }
}

impl WorkerLauncher for ScriptedLauncher {
    fn launch(&self, _params: LaunchParams) -> Result<WorkerHandle, SupervisorError> {
        self.handle
            .lock()
            .expect("launcher mutex should not be poisoned")
            .take()
            .ok_or_else(|| SupervisorError::Spawn {
                message: String::from("scripted launcher already consumed"),
                location: ErrorLocation::capture(),
                source: Box::new(std::io::Error::other("handle taken twice")),
            })
    }
}

struct Rig {
    supervisor: WorkerSupervisor,
    signal_tx: mpsc::UnboundedSender<String>,
    exit_tx: oneshot::Sender<Option<i32>>,
}

fn scripted_supervisor() -> Rig {
    let (signal_tx, live_signals) = mpsc::unbounded_channel();
    let (exit_tx, exit) = oneshot::channel();
    let handle = WorkerHandle {
        pid: Some(4242),
        live_signals,
        exit,
    };

    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let supervisor = WorkerSupervisor::new(
        bundle,
        credential,
        Arc::new(ScriptedLauncher::new(handle)),
    )
    .expect("supervisor should build");

    Rig {
        supervisor,
        signal_tx,
        exit_tx,
    }
}

async fn wait_for_state(supervisor: &WorkerSupervisor, wanted: ReadinessState) {
    for _ in 0..100 {
        if supervisor.state() == wanted {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "supervisor never reached {wanted}, still {}",
        supervisor.state()
    );
}

/// **VALUE**: Verifies the exact readiness marker flips Starting→Ready.
///
/// **WHY THIS MATTERS**: The `listening on ` line is the single signal that
/// makes the worker reachable. If it stops being recognized, every start
/// ends in a timeout even though the worker is serving.
///
/// **BUG THIS CATCHES**: Would catch a prefix typo or the marker check
/// being applied to the wrong channel.
#[tokio::test]
async fn given_started_worker_when_marker_line_arrives_then_state_is_ready() {
    // GIVEN: A started supervisor
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");
    assert_eq!(rig.supervisor.state(), ReadinessState::Starting);
    assert!(!rig.supervisor.is_ready());

    // WHEN: The worker emits the marker for its assigned port
    let port = rig
        .supervisor
        .endpoint()
        .expect("endpoint should exist after start")
        .port;
    rig.signal_tx
        .send(format!("listening on {port}"))
        .expect("signal channel should be open");

    // THEN: The supervisor becomes ready
    rig.supervisor
        .wait_until_ready(Duration::from_secs(1))
        .await
        .expect("marker should make the worker ready");
    assert!(rig.supervisor.is_ready());

    drop(rig.exit_tx);
}

/// **VALUE**: Verifies informational signal lines never affect state.
///
/// **WHY THIS MATTERS**: The worker chats on its signal channel (version
/// banners, GC notices). Only the exact marker may transition; anything
/// else flipping the state would let requests race a listener that is not
/// bound yet.
///
/// **BUG THIS CATCHES**: Would catch a `contains` sneaking in where a
/// prefix match is required.
#[tokio::test]
async fn given_started_worker_when_informational_lines_arrive_then_state_stays_starting() {
    // GIVEN: A started supervisor
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");

    // WHEN: Chatter arrives, including near-miss lines
    for line in [
        "worker booting",
        "will be listening on 1234 soon",
        "LISTENING ON 1234",
    ] {
        rig.signal_tx
            .send(line.to_string())
            .expect("signal channel should be open");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // THEN: Still starting
    assert_eq!(rig.supervisor.state(), ReadinessState::Starting);
    assert!(!rig.supervisor.is_ready());

    drop(rig.exit_tx);
}

/// **VALUE**: Verifies a second start() fails with AlreadyStarted.
///
/// **WHY THIS MATTERS**: One supervisor owns one worker. A silent second
/// launch would orphan a process holding the trust material.
///
/// **BUG THIS CATCHES**: Would catch the state gate being checked after the
/// port bind or launch side effects.
#[tokio::test]
async fn given_started_supervisor_when_starting_again_then_returns_already_started() {
    // GIVEN: A started supervisor
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("first start should succeed");

    // WHEN: Starting again
    let result = rig.supervisor.start();

    // THEN: AlreadyStarted
    assert!(matches!(
        result,
        Err(SupervisorError::AlreadyStarted { .. })
    ));

    drop(rig.exit_tx);
}

/// **VALUE**: Verifies a worker that exits before the marker fails the
/// start, and waiters get StartFailed rather than a timeout.
///
/// **WHY THIS MATTERS**: Distinguishing "worker crashed" from "worker is
/// slow" decides whether callers retry or surface a fatal error.
///
/// **BUG THIS CATCHES**: Would catch the exit notification being ignored
/// until the wait deadline.
#[tokio::test]
async fn given_worker_exits_before_marker_when_waiting_then_returns_start_failed() {
    // GIVEN: A started supervisor whose worker dies immediately
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");
    rig.exit_tx
        .send(Some(3))
        .expect("exit channel should be open");

    // WHEN: Waiting for readiness
    let result = rig
        .supervisor
        .wait_until_ready(Duration::from_secs(1))
        .await;

    // THEN: StartFailed and the state records Failed
    assert!(matches!(result, Err(SupervisorError::StartFailed { .. })));
    assert_eq!(rig.supervisor.state(), ReadinessState::Failed);
}

/// **VALUE**: Verifies Ready→Failed when the worker exits after becoming
/// ready, with no revert to an earlier state.
///
/// **WHY THIS MATTERS**: A dead-but-marked-ready worker would make every
/// request eat a connect timeout. The monotonic Failed record is what
/// makes `is_ready` trustworthy after a crash.
///
/// **BUG THIS CATCHES**: Would catch the monitor task stopping after the
/// marker and never observing the exit.
#[tokio::test]
async fn given_ready_worker_when_process_exits_then_state_becomes_failed() {
    // GIVEN: A ready supervisor
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");
    let port = rig
        .supervisor
        .endpoint()
        .expect("endpoint should exist after start")
        .port;
    rig.signal_tx
        .send(format!("listening on {port}"))
        .expect("signal channel should be open");
    rig.supervisor
        .wait_until_ready(Duration::from_secs(1))
        .await
        .expect("worker should become ready");

    // WHEN: The worker process exits
    rig.exit_tx
        .send(Some(0))
        .expect("exit channel should be open");

    // THEN: Failed, permanently
    wait_for_state(&rig.supervisor, ReadinessState::Failed).await;
    assert!(!rig.supervisor.is_ready());
}

/// **VALUE**: Verifies wait_until_ready times out with StartTimeout while
/// leaving the supervisor consistent for later signals.
///
/// **WHY THIS MATTERS**: A timed-out waiter is a per-caller outcome, not a
/// verdict on the worker: a Ready signal arriving later must still be
/// recorded for future callers.
///
/// **BUG THIS CATCHES**: Would catch the timeout path poisoning the cell or
/// tearing down the monitor task.
#[tokio::test]
async fn given_slow_worker_when_wait_times_out_then_later_marker_still_lands() {
    // GIVEN: A started supervisor with a silent worker
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");

    // WHEN: A short wait elapses
    let result = rig
        .supervisor
        .wait_until_ready(Duration::from_millis(50))
        .await;
    assert!(matches!(result, Err(SupervisorError::StartTimeout { .. })));

    // AND WHEN: The marker arrives after the timeout
    let port = rig
        .supervisor
        .endpoint()
        .expect("endpoint should exist after start")
        .port;
    rig.signal_tx
        .send(format!("listening on {port}"))
        .expect("signal channel should be open");

    // THEN: Future callers observe Ready
    rig.supervisor
        .wait_until_ready(Duration::from_secs(1))
        .await
        .expect("late marker should still make the worker ready");
    assert!(rig.supervisor.is_ready());

    drop(rig.exit_tx);
}

/// **VALUE**: Verifies worker_info reflects the launched process.
///
/// **BUG THIS CATCHES**: Would catch the snapshot being built from stale or
/// default values instead of the launch results.
#[tokio::test]
async fn given_started_supervisor_when_reading_worker_info_then_reflects_launch() {
    // GIVEN: A started supervisor
    let rig = scripted_supervisor();
    rig.supervisor.start().expect("start should succeed");

    // WHEN: Reading the snapshot
    let info = rig
        .supervisor
        .worker_info()
        .expect("worker info should be recorded");
    let port = rig
        .supervisor
        .endpoint()
        .expect("endpoint should exist after start")
        .port;

    // THEN: It matches the scripted launch
    assert_eq!(info.pid, 4242);
    assert_eq!(info.port, port);
    assert!(info.owned);
    assert_eq!(info.base_url, format!("https://localhost:{port}"));

    drop(rig.exit_tx);
}
