// Unit tests for the trust bundle cache.

use crate::{cache, trust};

/// **VALUE**: Verifies the save/load round trip through the cache file.
///
/// **WHY THIS MATTERS**: The cache is the only thing standing between every
/// host restart and a full regeneration. A round-trip mismatch silently
/// costs every startup the generation time.
///
/// **BUG THIS CATCHES**: Would catch a serialization format change that
/// load cannot read back.
#[test]
fn given_saved_bundle_when_loading_then_round_trips() {
    // GIVEN: A bundle saved to a scratch directory
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let bundle = trust::generate().expect("generation should succeed");
    cache::save(&bundle, dir.path()).expect("save should succeed");

    // WHEN: Loading it back
    let loaded = cache::load(dir.path()).expect("cache should hit");

    // THEN: Identical content
    assert_eq!(loaded.ca_cert_pem, bundle.ca_cert_pem);
    assert_eq!(loaded.server_cert_pem, bundle.server_cert_pem);
    assert_eq!(loaded.private_key_pem, bundle.private_key_pem);
}

/// **VALUE**: Verifies a missing cache reads as a miss, not an error.
///
/// **WHY THIS MATTERS**: First start on a fresh install takes this path;
/// anything but a quiet `None` breaks the generate-fallback flow.
///
/// **BUG THIS CATCHES**: Would catch load panicking or erroring on a
/// nonexistent file.
#[test]
fn given_empty_directory_when_loading_then_returns_none() {
    // GIVEN: A directory with no cache file
    let dir = tempfile::tempdir().expect("tempdir should be created");

    // WHEN: Loading
    let loaded = cache::load(dir.path());

    // THEN: Cache miss
    assert!(loaded.is_none());
}

/// **VALUE**: Verifies a corrupt cache file reads as a miss, never as a
/// fatal error.
///
/// **WHY THIS MATTERS**: The cache contract is explicit: corrupted or
/// unreadable content must fall back to generation. A hard failure here
/// would brick startup over a half-written file.
///
/// **BUG THIS CATCHES**: Would catch load propagating parse errors instead
/// of degrading to `None`.
#[test]
fn given_corrupt_cache_file_when_loading_then_returns_none() {
    // GIVEN: A cache file containing garbage
    let dir = tempfile::tempdir().expect("tempdir should be created");
    std::fs::write(dir.path().join("trust-bundle.json"), "{ not json")
        .expect("write should succeed");

    // WHEN: Loading
    let loaded = cache::load(dir.path());

    // THEN: Cache miss
    assert!(loaded.is_none());
}

/// **VALUE**: Verifies save overwrites an existing cache atomically.
///
/// **BUG THIS CATCHES**: Would catch save appending or failing when the
/// file already exists.
#[test]
fn given_existing_cache_when_saving_again_then_latest_bundle_wins() {
    // GIVEN: Two bundles saved in sequence
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let first = trust::generate().expect("generation should succeed");
    let second = trust::generate().expect("generation should succeed");
    cache::save(&first, dir.path()).expect("first save should succeed");
    cache::save(&second, dir.path()).expect("second save should succeed");

    // WHEN: Loading
    let loaded = cache::load(dir.path()).expect("cache should hit");

    // THEN: The second bundle is what persists
    assert_eq!(loaded.server_cert_pem, second.server_cert_pem);
}
