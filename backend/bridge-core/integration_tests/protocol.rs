// Full-stack protocol tests: real mutual TLS, real HTTP, real framing,
// against the stub worker.

use crate::stub_worker::{self, DelayedEchoLauncher, StubResponse};

use bridge_core::error::protocol::ProtocolError;
use bridge_core::trust::{self, Credential};

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

/// **VALUE**: Verifies a single-result request end to end: TLS handshake
/// with the pinned CA, client certificate, Authorization header, frame
/// parse on the server, eager JSON decode on the way back.
///
/// **WHY THIS MATTERS**: This is the whole happy path in one test. If any
/// layer regresses - trust material, channel pinning, framing, decoding -
/// this fails first and points at the seam.
///
/// **BUG THIS CATCHES**: Would catch a bundle whose server certificate no
/// longer validates against its own CA, which only a real handshake can
/// prove.
#[tokio::test]
async fn given_running_stub_when_requesting_version_then_round_trips_over_mutual_tls() {
    // GIVEN: A stub worker serving the version endpoint
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let handler = Arc::new(|req: stub_worker::StubRequest| {
        assert_eq!(req.endpoint, "version");
        StubResponse::ok(json!({"node": "8.6.0"}).to_string())
    });
    let stub = stub_worker::start(&bundle, &credential, handler).await;
    let (_supervisor, client) = stub_worker::ready_client(&bundle, &credential, stub.port).await;

    // WHEN: Sending the request and decoding eagerly
    let response = client
        .send("version", None, None)
        .await
        .expect("request should succeed");
    let value: Value = response.json().await.expect("body should decode");

    // THEN: The worker's document came through
    assert_eq!(value.get("node").and_then(Value::as_str), Some("8.6.0"));

    // AND: The typed wrapper takes the same path
    let versions = bridge_core::ops::version(&client)
        .await
        .expect("typed version call should succeed");
    assert_eq!(versions.get("node").and_then(Value::as_str), Some("8.6.0"));
}

/// **VALUE**: Verifies metadata and binary payload arrive on the worker
/// exactly as framed, including payload bytes containing newlines.
///
/// **WHY THIS MATTERS**: The frame has no length prefixes; only the two
/// newline separators and connection close delimit it. Server-side
/// verification is the only proof the framing survives a real transport.
///
/// **BUG THIS CATCHES**: Would catch body buffering or header handling
/// mangling the payload (chunked encoding, trimming, re-framing).
#[tokio::test]
async fn given_binary_payload_when_sending_then_worker_sees_exact_frame() {
    // GIVEN: A stub that echoes what it parsed
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let handler = Arc::new(|req: stub_worker::StubRequest| {
        let echo = json!({
            "endpoint": req.endpoint,
            "metadata": req.metadata,
            "payloadLen": req.payload.len(),
            "payloadHasNewline": req.payload.contains(&b'\n'),
        });
        StubResponse::ok(echo.to_string())
    });
    let stub = stub_worker::start(&bundle, &credential, handler).await;
    let (_supervisor, client) = stub_worker::ready_client(&bundle, &credential, stub.port).await;

    // WHEN: Sending metadata plus a payload with embedded newlines
    let metadata = json!({"pubKeys": ["armored-key"]});
    let payload = b"line one\nline two\n\x00\x01binary".to_vec();
    let response = client
        .send("encryptMsg", Some(&metadata), Some(payload.as_slice()))
        .await
        .expect("request should succeed");
    let echo: Value = response.json().await.expect("echo should decode");

    // THEN: The worker parsed exactly what was framed
    assert_eq!(
        echo.get("endpoint").and_then(Value::as_str),
        Some("encryptMsg")
    );
    assert_eq!(echo.get("metadata"), Some(&metadata));
    assert_eq!(
        echo.get("payloadLen").and_then(Value::as_u64),
        Some(payload.len() as u64)
    );
    assert_eq!(
        echo.get("payloadHasNewline").and_then(Value::as_bool),
        Some(true)
    );
}

/// **VALUE**: Verifies a wrong Authorization value is rejected with the
/// worker's 401 error shape, decoded into a Remote error.
///
/// **WHY THIS MATTERS**: The bearer credential is the application-layer
/// auth on top of mutual TLS; both the rejection and its decodability are
/// contract.
///
/// **BUG THIS CATCHES**: Would catch the Authorization header being
/// dropped or the error-body decode losing the message.
#[tokio::test]
async fn given_wrong_credential_when_sending_then_remote_error_carries_auth_rejection() {
    // GIVEN: A stub keyed to one credential, a client using another
    let bundle = trust::generate().expect("generation should succeed");
    let worker_credential = Credential::generate();
    let client_credential = Credential::generate();
    let handler = Arc::new(|_req: stub_worker::StubRequest| StubResponse::ok("{}"));
    let stub = stub_worker::start(&bundle, &worker_credential, handler).await;
    let (_supervisor, client) =
        stub_worker::ready_client(&bundle, &client_credential, stub.port).await;

    // WHEN: Sending
    let result = client.send("version", None, None).await;

    // THEN: Remote 401 with the worker's message and stack
    match result {
        Err(ProtocolError::Remote {
            status,
            message,
            stack,
            ..
        }) => {
            assert_eq!(status.0, 401);
            assert_eq!(message, "Wrong Authorization");
            assert!(stack.is_some());
        }
        Err(other) => panic!("expected Remote 401, got {other:?}"),
        Ok(_) => panic!("expected Remote 401, got a response"),
    }
}

/// **VALUE**: Verifies an unparseable non-200 body survives verbatim in
/// the Remote error.
///
/// **WHY THIS MATTERS**: A crashing worker may emit anything; the raw
/// status and body are the only diagnostics and must never be discarded.
///
/// **BUG THIS CATCHES**: Would catch strict error-body parsing turning a
/// worker crash report into a decode failure.
#[tokio::test]
async fn given_plain_text_error_body_when_sending_then_raw_body_is_preserved() {
    // GIVEN: A stub that fails with a non-JSON body
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let handler = Arc::new(|_req: stub_worker::StubRequest| StubResponse {
        status: 500,
        body: b"worker exploded".to_vec(),
    });
    let stub = stub_worker::start(&bundle, &credential, handler).await;
    let (_supervisor, client) = stub_worker::ready_client(&bundle, &credential, stub.port).await;

    // WHEN: Sending
    let result = client.send("version", None, None).await;

    // THEN: Raw status and text preserved
    match result {
        Err(ProtocolError::Remote {
            status,
            message,
            stack,
            ..
        }) => {
            assert_eq!(status.0, 500);
            assert_eq!(message, "worker exploded");
            assert!(stack.is_none());
        }
        Err(other) => panic!("expected Remote 500, got {other:?}"),
        Ok(_) => panic!("expected Remote 500, got a response"),
    }
}

/// **VALUE**: Verifies the connection-refused race maps to the retryable
/// NotReady kind rather than a terminal Transport error.
///
/// **WHY THIS MATTERS**: Right after the readiness marker the listener may
/// not be accepting yet (the accepted bind-then-release race). Callers
/// must be able to distinguish "retry after backoff" from "give up".
///
/// **BUG THIS CATCHES**: Would catch the refused-connection detection
/// failing to walk the reqwest error source chain.
#[tokio::test]
async fn given_no_listener_when_sending_then_connection_refused_maps_to_not_ready() {
    // GIVEN: A ready client pointed at a port nobody listens on
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let free_port = {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        listener
            .local_addr()
            .expect("local addr should be readable")
            .port()
        // listener drops here, freeing the port
    };
    let (_supervisor, client) = stub_worker::ready_client(&bundle, &credential, free_port).await;

    // WHEN: Sending
    let result = client.send("version", None, None).await;

    // THEN: NotReady (retryable), not Transport
    match result {
        Err(err) => {
            assert!(
                err.is_retryable(),
                "connection refused should be retryable, got {err:?}"
            );
        }
        Ok(_) => panic!("expected NotReady, got a response"),
    }
}

/// **VALUE**: Verifies send_with_retry rides out the not-ready window and
/// succeeds once the worker's marker lands, while a plain send fails fast.
///
/// **WHY THIS MATTERS**: `NotReady` is documented as retryable-by-caller;
/// the backoff convenience is the blessed way to do that. It must retry
/// only the not-ready window, not remote or decode failures.
///
/// **BUG THIS CATCHES**: Would catch the retry loop consulting a stale
/// readiness snapshot, or giving up before its elapsed budget.
#[tokio::test]
async fn given_slow_worker_when_sending_with_retry_then_succeeds_after_marker() {
    // GIVEN: A stub plus a supervisor whose marker arrives late
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let handler = Arc::new(|_req: stub_worker::StubRequest| StubResponse::ok("{}"));
    let stub = stub_worker::start(&bundle, &credential, handler).await;
    let (_supervisor, client) = stub_worker::started_client(
        &bundle,
        &credential,
        stub.port,
        Arc::new(DelayedEchoLauncher {
            delay: Duration::from_millis(300),
        }),
    );

    // WHEN: A plain send races the marker
    let early = client.send("version", None, None).await;
    assert!(
        matches!(early, Err(ProtocolError::NotReady { .. })),
        "plain send should fail fast before the marker"
    );

    // AND WHEN: Retrying with a budget that outlives the delay
    let result = client
        .send_with_retry("version", None, None, Duration::from_secs(5))
        .await;

    // THEN: The request eventually goes through
    assert!(
        result.is_ok(),
        "retry should succeed once ready: {:?}",
        result.err()
    );
}

/// **VALUE**: Verifies the streaming decrypt shape over the real stack:
/// header line with metas, then lazily consumed block lines.
///
/// **WHY THIS MATTERS**: The lazy read path (StreamReader over the HTTP
/// body) behaves differently from the in-memory unit tests - chunk
/// boundaries, TLS records and connection close all happen here.
///
/// **BUG THIS CATCHES**: Would catch the header decode eagerly consuming
/// the whole body, or connection close truncating the final unterminated
/// block line.
#[tokio::test]
async fn given_streaming_response_when_consuming_then_blocks_arrive_in_order() {
    // GIVEN: A stub answering decryptMsg with two blocks
    let bundle = trust::generate().expect("generation should succeed");
    let credential = Credential::generate();
    let handler = Arc::new(|req: stub_worker::StubRequest| {
        assert_eq!(req.endpoint, "decryptMsg");
        let body = concat!(
            r#"{"success":true,"blockMetas":[{"type":"html","length":11},{"type":"html","length":11}]}"#,
            "\n",
            r#"{"type":"html","content":"hello world"}"#,
            "\n",
            r#"{"type":"html","content":"hello world"}"#,
        );
        StubResponse::ok(body)
    });
    let stub = stub_worker::start(&bundle, &credential, handler).await;
    let (_supervisor, client) = stub_worker::ready_client(&bundle, &credential, stub.port).await;

    // WHEN: Sending and streaming
    let response = client
        .send("decryptMsg", Some(&json!({"keys": []})), Some(b"ciphertext".as_slice()))
        .await
        .expect("request should succeed");
    let mut stream = response.into_block_stream();

    // THEN: Metas, both blocks in order, then the terminal signal
    assert_eq!(stream.block_metas().await.len(), 2);
    let first = stream.next_block().await.expect("first block");
    assert_eq!(first.content, "hello world");
    let second = stream.next_block().await.expect("second block");
    assert_eq!(second.content, "hello world");
    assert!(stream.next_block().await.is_none());
}
