use bridge_core::error::protocol::ProtocolError;
use bridge_core::error::supervisor::SupervisorError;

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

/// **VALUE**: Verifies `SupervisorError` carries file/line/column location
/// tracking through its Display output.
///
/// **WHY THIS MATTERS**: Startup failures have several origination points
/// (port bind, spawn, readiness wait). Location tracking is what tells a
/// developer which one fired without attaching a debugger.
///
/// **BUG THIS CATCHES**: Would catch the location field being dropped from
/// the Display implementation during a refactor.
#[test]
#[track_caller]
fn given_supervisor_error_when_formatted_then_includes_location() {
    // GIVEN: A timeout error with a captured location
    let location = ErrorLocation::from(Location::caller());
    let err = SupervisorError::StartTimeout {
        message: String::from("worker did not become ready within 5s"),
        location,
    };

    // WHEN: Formatting
    let formatted = format!("{err}");

    // THEN: Kind, message and location all present
    assert!(formatted.contains("Worker Start Timeout"));
    assert!(formatted.contains("did not become ready"));
    assert!(formatted.contains("error.rs"));
}

/// **VALUE**: Verifies `ProtocolError::Remote` formats status and message
/// for operator-facing logs.
///
/// **BUG THIS CATCHES**: Would catch the status disappearing from the
/// Display output, which would make 401-vs-500 triage impossible from
/// logs alone.
#[test]
fn given_remote_error_when_formatted_then_includes_status_and_message() {
    // GIVEN: A remote error
    let err = ProtocolError::Remote {
        status: HttpStatusCode(401),
        message: String::from("Wrong Authorization"),
        stack: None,
        location: ErrorLocation::capture(),
    };

    // WHEN: Formatting
    let formatted = format!("{err}");

    // THEN: Status and message present, and the status categorizes as a
    // rejection rather than a worker failure
    assert!(formatted.contains("401"));
    assert!(formatted.contains("Wrong Authorization"));
    assert!(HttpStatusCode(401).is_client_error());
    assert!(!HttpStatusCode(401).is_worker_error());
    assert!(HttpStatusCode(500).is_worker_error());
}

/// **VALUE**: Verifies the retryability split: only `NotReady` invites a
/// retry.
///
/// **WHY THIS MATTERS**: Callers branch on this to choose between backoff
/// and surfacing the error. A Remote error marked retryable would hammer a
/// worker that is telling the caller exactly what is wrong.
///
/// **BUG THIS CATCHES**: Would catch new variants accidentally matching the
/// retryable arm.
#[test]
fn given_each_protocol_error_when_checking_retryability_then_only_not_ready_retries() {
    // GIVEN: One error of each flavor
    let not_ready = ProtocolError::NotReady {
        message: String::from("worker is not ready"),
        location: ErrorLocation::capture(),
    };
    let remote = ProtocolError::Remote {
        status: HttpStatusCode(500),
        message: String::from("boom"),
        stack: None,
        location: ErrorLocation::capture(),
    };
    let decode = ProtocolError::Decode {
        message: String::from("bad shape"),
        location: ErrorLocation::capture(),
    };

    // WHEN/THEN: Only NotReady is retryable
    assert!(not_ready.is_retryable());
    assert!(!remote.is_retryable());
    assert!(!decode.is_retryable());
}
