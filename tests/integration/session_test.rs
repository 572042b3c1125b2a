//! Session tests: handshake lifecycle and id correlation.

use crate::common::mock_server_config;
use conductor::error::HarnessError;
use conductor::matcher::DiagnosticKind;
use conductor::mcp::protocol::{normalize_request, RequestId};
use conductor::mcp::McpSession;
use serde_json::json;

#[tokio::test]
async fn connect_handshakes_and_roundtrips() {
    let config = mock_server_config(&[]);
    let mut session = McpSession::connect(&config).await.expect("handshake");
    assert!(session.is_ready());

    let fallback = session.assign_id("tools/list");
    assert_eq!(fallback, "tools/list-1");

    let (frame, id) =
        normalize_request(&json!({"method": "tools/list", "params": {}}), &fallback).unwrap();
    assert_eq!(id, RequestId::from("tools/list-1"));

    let mut diags = Vec::new();
    let response = session
        .roundtrip(&frame, &id, &mut diags)
        .await
        .expect("response");
    assert!(response.is_success());
    assert!(diags.is_empty(), "diags: {diags:?}");

    let result = response.result.expect("result");
    assert_eq!(result["tools"][0]["name"], "echo");

    // Ids keep counting per session.
    assert_eq!(session.assign_id("ping"), "ping-2");

    session.shutdown().await;
}

#[tokio::test]
async fn silent_server_fails_the_handshake() {
    let mut config = mock_server_config(&["--no-response"]);
    config.request_timeout_ms = 300;
    let err = McpSession::connect(&config).await.expect_err("no init reply");
    assert!(matches!(err, HarnessError::HandshakeFailed { .. }), "got {err}");
}

#[tokio::test]
async fn early_exit_fails_the_handshake() {
    let config = mock_server_config(&["--exit-immediately"]);
    let err = McpSession::connect(&config).await.expect_err("server gone");
    assert!(matches!(err, HarnessError::HandshakeFailed { .. }), "got {err}");
}

#[tokio::test]
async fn mismatched_response_ids_become_diagnostics() {
    let mut config = mock_server_config(&["--wrong-id"]);
    config.request_timeout_ms = 300;
    let mut session = McpSession::connect(&config).await.expect("handshake");

    let fallback = session.assign_id("ping");
    let (frame, id) = normalize_request(&json!({"method": "ping"}), &fallback).unwrap();

    let mut diags = Vec::new();
    let err = session
        .roundtrip(&frame, &id, &mut diags)
        .await
        .expect_err("the matching id never arrives");
    assert!(matches!(err, HarnessError::ReadTimeout { .. }));
    assert!(
        diags.iter().any(|d| d.kind == DiagnosticKind::IdMismatch),
        "diags: {diags:?}"
    );

    session.shutdown().await;
}
