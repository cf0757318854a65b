// Unit tests for secure channel construction. Actual handshakes against a
// mutual-TLS server are exercised in integration_tests/.

use crate::error::channel::ChannelError;
use crate::{channel, trust};

use models::TrustBundle;

/// **VALUE**: Verifies that a generated bundle produces a TLS client.
///
/// **WHY THIS MATTERS**: Channel construction is the step that consumes the
/// bundle; if a freshly generated bundle is rejected here, no worker can
/// ever be reached.
///
/// **BUG THIS CATCHES**: Would catch an identity-PEM assembly bug (key
/// before cert, missing concatenation) that the generator and the client
/// builder disagree on.
#[test]
fn given_generated_bundle_when_building_channel_then_succeeds() {
    // GIVEN: A fresh bundle
    let bundle = trust::generate().expect("generation should succeed");

    // WHEN: Building the channel
    let result = channel::build(&bundle);

    // THEN: A client comes back
    assert!(result.is_ok(), "channel should build: {:?}", result.err());
}

/// **VALUE**: Verifies that malformed bundle material surfaces as
/// `ChannelError::Setup` instead of being silently ignored.
///
/// **WHY THIS MATTERS**: A channel built with a broken trust store would
/// either trust nothing (every request fails later, far from the cause) or
/// fall back to defaults. Setup failure must be loud and immediate.
///
/// **BUG THIS CATCHES**: Would catch error swallowing in the builder chain.
#[test]
fn given_garbage_ca_when_building_channel_then_returns_setup_error() {
    // GIVEN: A bundle with an unusable CA blob
    let mut bundle = trust::generate().expect("generation should succeed");
    bundle.ca_cert_pem = String::from("not a certificate");

    // WHEN: Building the channel
    let result = channel::build(&bundle);

    // THEN: Setup error
    assert!(matches!(result, Err(ChannelError::Setup { .. })));
}

/// **VALUE**: Verifies that an entirely empty bundle cannot produce a
/// channel.
///
/// **BUG THIS CATCHES**: Would catch builders that accept empty PEM input
/// and defer the failure to the first request.
#[test]
fn given_empty_bundle_when_building_channel_then_returns_setup_error() {
    // GIVEN: An empty bundle
    let bundle = TrustBundle {
        ca_cert_pem: String::new(),
        server_cert_pem: String::new(),
        private_key_pem: String::new(),
    };

    // WHEN: Building the channel
    let result = channel::build(&bundle);

    // THEN: Setup error
    assert!(matches!(result, Err(ChannelError::Setup { .. })));
}
