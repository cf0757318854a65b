// Bootstrap flow tests: cache interplay, generate-vs-restore, event
// sequence, readiness gating.

use crate::stub_worker::EchoLauncher;

use bridge_core::bootstrap::{self, BootstrapEvent};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::UnboundedReceiver<BootstrapEvent>) -> Vec<BootstrapEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// **VALUE**: Verifies the first start generates and caches a trust bundle,
/// and a second start restores it instead of regenerating.
///
/// **WHY THIS MATTERS**: The whole point of the cache is to skip the
/// several-hundred-millisecond generation on restart. The event stream is
/// the observable proof of which path ran.
///
/// **BUG THIS CATCHES**: Would catch the cache never being written, restore
/// rejecting the cached bundle, or the fallback silently regenerating on
/// every start.
#[tokio::test]
async fn given_empty_cache_when_bootstrapping_twice_then_second_run_restores() {
    // GIVEN: An empty cache directory
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let (tx, mut rx) = mpsc::unbounded_channel();

    // WHEN: Bootstrapping the first time
    let bridge = bootstrap::init(
        dir.path(),
        Arc::new(EchoLauncher),
        Some(tx),
        Some(Duration::from_secs(2)),
    )
    .await
    .expect("first bootstrap should succeed");

    // THEN: Fresh generation, ready worker, cache on disk
    let events = drain(&mut rx);
    assert!(events.contains(&BootstrapEvent::GeneratingTrust));
    assert!(!events.contains(&BootstrapEvent::RestoringTrust));
    assert!(events.contains(&BootstrapEvent::WorkerReady));
    assert!(bridge.supervisor.is_ready());
    assert!(dir.path().join("trust-bundle.json").exists());

    // AND WHEN: Bootstrapping again against the same directory
    let (tx, mut rx) = mpsc::unbounded_channel();
    let second = bootstrap::init(
        dir.path(),
        Arc::new(EchoLauncher),
        Some(tx),
        Some(Duration::from_secs(2)),
    )
    .await
    .expect("second bootstrap should succeed");

    // THEN: The cached bundle is restored, no regeneration
    let events = drain(&mut rx);
    assert!(events.contains(&BootstrapEvent::RestoringTrust));
    assert!(!events.contains(&BootstrapEvent::GeneratingTrust));
    assert!(second.supervisor.is_ready());
}

/// **VALUE**: Verifies a corrupt cache falls back to generation instead of
/// failing bootstrap.
///
/// **WHY THIS MATTERS**: The cache contract is explicit: corruption is a
/// miss, never fatal. A half-written cache file must not brick startup.
///
/// **BUG THIS CATCHES**: Would catch restore errors propagating out of
/// bootstrap instead of triggering the generate path.
#[tokio::test]
async fn given_corrupt_cache_when_bootstrapping_then_regenerates() {
    // GIVEN: A cache file containing garbage
    let dir = tempfile::tempdir().expect("tempdir should be created");
    std::fs::write(dir.path().join("trust-bundle.json"), "{ not json")
        .expect("write should succeed");
    let (tx, mut rx) = mpsc::unbounded_channel();

    // WHEN: Bootstrapping
    let bridge = bootstrap::init(
        dir.path(),
        Arc::new(EchoLauncher),
        Some(tx),
        Some(Duration::from_secs(2)),
    )
    .await
    .expect("bootstrap should fall back to generation");

    // THEN: Generation ran and the worker came up
    let events = drain(&mut rx);
    assert!(events.contains(&BootstrapEvent::GeneratingTrust));
    assert!(bridge.supervisor.is_ready());
}

/// **VALUE**: Verifies a cached-but-malformed bundle (valid JSON, broken
/// PEM) also falls back to generation via restore validation.
///
/// **WHY THIS MATTERS**: This is the path where the cache *parses* but the
/// material inside is unusable - the exact case restore validation exists
/// for.
///
/// **BUG THIS CATCHES**: Would catch bootstrap trusting the cache blob
/// without running it through restore.
#[tokio::test]
async fn given_malformed_cached_bundle_when_bootstrapping_then_regenerates() {
    // GIVEN: A syntactically valid cache with garbage PEM inside
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let blob = serde_json::json!({
        "ca_cert_pem": "not a cert",
        "server_cert_pem": "not a cert",
        "private_key_pem": "not a key",
    });
    std::fs::write(dir.path().join("trust-bundle.json"), blob.to_string())
        .expect("write should succeed");
    let (tx, mut rx) = mpsc::unbounded_channel();

    // WHEN: Bootstrapping
    let bridge = bootstrap::init(
        dir.path(),
        Arc::new(EchoLauncher),
        Some(tx),
        Some(Duration::from_secs(2)),
    )
    .await
    .expect("bootstrap should fall back to generation");

    // THEN: Restore was bypassed in favor of generation
    let events = drain(&mut rx);
    assert!(events.contains(&BootstrapEvent::GeneratingTrust));
    assert!(!events.contains(&BootstrapEvent::RestoringTrust));
    assert!(bridge.supervisor.is_ready());
}
