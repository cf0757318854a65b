use crate::{DecryptError, MsgBlock, MsgBlockMeta};

/// **VALUE**: Verifies that block metas decode from the worker's exact wire
/// names (`type`, `length`).
///
/// **WHY THIS MATTERS**: The worker emits camelCase/reserved-word field
/// names that need serde renames on the Rust side. If a rename is dropped,
/// every streaming decrypt silently degrades to an empty meta list.
///
/// **BUG THIS CATCHES**: Would catch a refactor that renames `block_type`
/// without keeping the `#[serde(rename = "type")]` attribute.
#[test]
fn given_wire_json_when_decoding_meta_then_maps_renamed_fields() {
    // GIVEN: A header entry exactly as the worker writes it
    let json = r#"{"type":"html","length":11}"#;

    // WHEN: Decoding
    let meta: MsgBlockMeta = serde_json::from_str(json).expect("meta should decode");

    // THEN: Renamed fields are populated
    assert_eq!(meta.block_type, "html");
    assert_eq!(meta.length, 11);
}

/// **VALUE**: Verifies that a block line missing required fields fails to
/// decode rather than producing a half-empty block.
///
/// **WHY THIS MATTERS**: The streaming decoder treats an undecodable line as
/// the terminal no-more-blocks signal. If serde filled missing fields with
/// defaults instead, garbage lines would surface as empty blocks.
///
/// **BUG THIS CATCHES**: Would catch someone adding `#[serde(default)]` to
/// the block fields.
#[test]
fn given_incomplete_block_json_when_decoding_then_fails() {
    // GIVEN: A line without the content field
    let json = r#"{"type":"html"}"#;

    // WHEN: Decoding
    let result = serde_json::from_str::<MsgBlock>(json);

    // THEN: Should fail, not default
    assert!(result.is_err());
}

/// **VALUE**: Verifies the in-band decrypt error shape round-trips.
///
/// **WHY THIS MATTERS**: Decrypt failures arrive as data (`success: false`
/// header), not as protocol errors. Callers match on `error_type` to decide
/// whether to prompt for a passphrase, so the wire mapping must hold.
///
/// **BUG THIS CATCHES**: Would catch the `type` rename being lost on
/// `DecryptError`.
#[test]
fn given_decrypt_error_json_when_decoding_then_maps_fields() {
    // GIVEN: A failure payload as the worker writes it
    let json = r#"{"type":"key_mismatch","error":"Missing appropriate key"}"#;

    // WHEN: Decoding
    let err: DecryptError = serde_json::from_str(json).expect("error should decode");

    // THEN: Fields mapped
    assert_eq!(err.error_type, "key_mismatch");
    assert_eq!(err.error, "Missing appropriate key");
}
