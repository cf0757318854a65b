use crate::{ModelError, WorkerInfoBuilder};

/// **VALUE**: Verifies that builder validation rejects zero PIDs.
///
/// **WHY THIS MATTERS**: PID 0 is an invalid process ID on all platforms.
/// Allowing it would break worker ownership tracking in the supervisor.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Validation logic is accidentally removed or bypassed
/// - PID zero check is deleted during refactoring
/// - Builder allows invalid WorkerInfo instances to be created
#[test]
fn given_zero_pid_when_building_worker_info_then_returns_validation_error() {
    // GIVEN: Builder with PID set to zero
    let builder = WorkerInfoBuilder::default()
        .with_pid(0)
        .with_port(4096)
        .with_base_url("https://localhost:4096")
        .with_owned(true);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "PID must be non-zero");
        }
    }
}

/// **VALUE**: Verifies that builder validation rejects missing required fields.
///
/// **WHY THIS MATTERS**: Every WorkerInfo must carry the port and base URL
/// the protocol client connects to. A half-built snapshot would surface as a
/// confusing connection failure much later.
///
/// **BUG THIS CATCHES**: Would catch if required field validation is removed
/// or the builder starts defaulting fields that must be explicit.
#[test]
fn given_missing_port_when_building_then_returns_validation_error() {
    // GIVEN: Builder without a port
    let builder = WorkerInfoBuilder::default()
        .with_pid(1234)
        .with_base_url("https://localhost:4096")
        .with_owned(true);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Port is required");
        }
    }
}

/// **VALUE**: Verifies that builder validation rejects non-TLS base URLs.
///
/// **WHY THIS MATTERS**: The worker only ever speaks mutual TLS. A plain
/// `http://` base URL means some caller bypassed the secure channel, which
/// must never reach the protocol layer.
///
/// **BUG THIS CATCHES**: Would catch if the scheme check is loosened to
/// accept `http://` the way a generic URL validator would.
#[test]
fn given_plain_http_url_when_building_then_returns_validation_error() {
    // GIVEN: Builder with a non-TLS base URL
    let builder = WorkerInfoBuilder::default()
        .with_pid(1234)
        .with_port(4096)
        .with_base_url("http://localhost:4096")
        .with_owned(true);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    assert!(result.is_err());
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert!(message.contains("Invalid base URL format"));
        }
    }
}

/// **VALUE**: Verifies the happy path produces a complete WorkerInfo.
///
/// **WHY THIS MATTERS**: The supervisor builds exactly one of these per
/// worker; if construction fails for valid input, readiness reporting breaks.
///
/// **BUG THIS CATCHES**: Would catch over-eager validation rejecting valid
/// loopback worker snapshots.
#[test]
fn given_all_valid_fields_when_building_then_returns_worker_info() {
    // GIVEN: Builder with all required fields
    let builder = WorkerInfoBuilder::default()
        .with_pid(1234)
        .with_port(4096)
        .with_base_url("https://localhost:4096")
        .with_owned(true);

    // WHEN: Building
    let info = builder.build().expect("valid builder should succeed");

    // THEN: All fields are carried through
    assert_eq!(info.pid, 1234);
    assert_eq!(info.port, 4096);
    assert_eq!(info.base_url, "https://localhost:4096");
    assert!(info.owned);
}
