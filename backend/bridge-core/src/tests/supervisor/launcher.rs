// Unit tests for launch parameter injection. Real process spawning is
// exercised in integration_tests/supervisor.rs.

use crate::supervisor::LaunchParams;
use crate::supervisor::launcher::assemble_worker_source;
use crate::trust::Credential;

use zeroize::Zeroizing;

fn params() -> LaunchParams {
    LaunchParams {
        port: 4096,
        ca_cert_pem: String::from("CA-PEM"),
        server_cert_pem: String::from("CRT-PEM"),
        private_key_pem: Zeroizing::new(String::from("KEY-PEM")),
        auth_header: Credential::generate().auth_header().clone(),
    }
}

/// **VALUE**: Verifies all five startup parameters are injected as script
/// constants ahead of the worker source.
///
/// **WHY THIS MATTERS**: The contract with the worker is that port, CA,
/// certificate, key and Authorization value are all available before its
/// listener binds. A missing constant makes the worker throw on boot with
/// no protocol-level diagnostic.
///
/// **BUG THIS CATCHES**: Would catch a renamed or dropped constant, or the
/// script being prepended instead of appended.
#[test]
fn given_launch_params_when_assembling_source_then_all_constants_precede_script() {
    // GIVEN: Launch parameters and a worker script
    let params = params();
    let auth_header = params.auth_header.expose().to_string();

    // WHEN: Assembling the source
    let source = assemble_worker_source(&params, "require('worker');");

    // THEN: Every constant is declared, and the script comes last
    assert!(source.contains("const NODE_PORT = `4096`;"));
    assert!(source.contains("const NODE_SSL_CA = `CA-PEM`;"));
    assert!(source.contains("const NODE_SSL_CRT = `CRT-PEM`;"));
    assert!(source.contains("const NODE_SSL_KEY = `KEY-PEM`;"));
    assert!(source.contains(&format!("const NODE_AUTH_HEADER = `{auth_header}`;")));
    assert!(source.ends_with("require('worker');"));
}

/// **VALUE**: Verifies the constants precede any script content so the
/// worker can reference them at module top level.
///
/// **BUG THIS CATCHES**: Would catch an ordering regression where the
/// script runs before its configuration exists.
#[test]
fn given_assembled_source_when_locating_constants_then_they_come_before_script() {
    // GIVEN: An assembled source
    let source = assemble_worker_source(&params(), "startServer();");

    // WHEN: Locating pieces
    let port_at = source.find("NODE_PORT").expect("port constant present");
    let script_at = source.find("startServer").expect("script present");

    // THEN: Constants first
    assert!(port_at < script_at);
}
