//! Subprocess communicator tests: spawn, framing, timeouts, stderr
//! capture, and shutdown.

use crate::common::mock_server_config;
use conductor::error::HarnessError;
use conductor::mcp::protocol::{self, Frame, RequestId};
use conductor::mcp::StdioTransport;
use regex::Regex;
use serde_json::json;
use std::time::Duration;

fn ping_frame(id: &str) -> (serde_json::Value, RequestId) {
    let id = RequestId::from(id);
    let frame = protocol::request_value(&id, "ping", json!({}));
    (frame, id)
}

#[tokio::test]
async fn start_send_receive() {
    let mut transport = StdioTransport::new(mock_server_config(&[]));
    transport.start().await.expect("transport should start");

    let init_id = RequestId::from("init-1");
    let frame = protocol::request_value(&init_id, "initialize", json!({}));
    transport.send_message(&frame).await.expect("send should succeed");

    let received = transport
        .read_message(Duration::from_secs(2))
        .await
        .expect("should receive a frame");
    match received {
        Frame::Response(response) => {
            assert_eq!(response.id, Some(init_id));
            assert!(response.is_success());
            let result = response.result.expect("result");
            assert_eq!(result["protocolVersion"], "2025-06-18");
        }
        other => panic!("expected a response, got {other:?}"),
    }

    transport.stop().await;
}

#[tokio::test]
async fn read_times_out_when_server_stays_silent() {
    let mut transport = StdioTransport::new(mock_server_config(&["--no-response"]));
    transport.start().await.expect("transport should start");

    let (frame, _) = ping_frame("ping-1");
    transport.send_message(&frame).await.expect("send");

    let err = transport
        .read_message(Duration::from_millis(200))
        .await
        .expect_err("should time out");
    assert!(matches!(err, HarnessError::ReadTimeout { timeout_ms: 200 }));

    transport.stop().await;
}

#[tokio::test]
async fn server_exit_is_detected_with_code() {
    let mut transport = StdioTransport::new(mock_server_config(&["--crash-after", "1"]));
    transport.start().await.expect("transport should start");

    let (frame, _) = ping_frame("ping-1");
    transport.send_message(&frame).await.expect("send");
    let first = transport.read_message(Duration::from_secs(2)).await;
    assert!(first.is_ok(), "first request should be answered: {first:?}");

    let (frame, _) = ping_frame("ping-2");
    // The write may still succeed into the pipe buffer; the read is
    // where the exit surfaces.
    let _ = transport.send_message(&frame).await;
    let err = transport
        .read_message(Duration::from_secs(2))
        .await
        .expect_err("server is gone");
    match err {
        HarnessError::ServerExited { code, .. } => assert_eq!(code, Some(1)),
        other => panic!("expected ServerExited, got {other}"),
    }

    transport.stop().await;
}

#[tokio::test]
async fn ready_pattern_gates_startup() {
    let mut config = mock_server_config(&["--stderr-ready"]);
    config.ready_pattern = Some(String::from("ready on stdio"));
    let mut transport = StdioTransport::new(config);
    transport.start().await.expect("banner should satisfy readiness");
    transport.stop().await;
}

#[tokio::test]
async fn missing_ready_pattern_times_out() {
    let mut config = mock_server_config(&[]);
    config.ready_pattern = Some(String::from("will never appear"));
    config.startup_timeout_ms = 300;
    let mut transport = StdioTransport::new(config);

    let err = transport.start().await.expect_err("readiness never arrives");
    assert!(matches!(err, HarnessError::StartupTimeout { timeout_ms: 300 }));
}

#[tokio::test]
async fn non_frame_stdout_is_recorded_not_fatal() {
    let mut transport = StdioTransport::new(mock_server_config(&["--invalid-json-at", "1"]));
    transport.start().await.expect("transport should start");

    let (frame, _) = ping_frame("ping-1");
    transport.send_message(&frame).await.expect("send");
    let err = transport
        .read_message(Duration::from_millis(300))
        .await
        .expect_err("junk line is not a frame");
    assert!(matches!(err, HarnessError::ReadTimeout { .. }));

    // The transport is still usable afterwards.
    let (frame, id) = ping_frame("ping-2");
    transport.send_message(&frame).await.expect("send");
    match transport.read_message(Duration::from_secs(2)).await {
        Ok(Frame::Response(response)) => assert_eq!(response.id, Some(id)),
        other => panic!("expected a response, got {other:?}"),
    }

    // The junk line precedes the second response in stream order, so by
    // now it has been drained into the noise log.
    let noise = transport.take_noise();
    assert!(
        noise.iter().any(|line| line.contains("not valid json")),
        "noise: {noise:?}"
    );

    transport.stop().await;
}

#[tokio::test]
async fn stderr_is_buffered_and_clearable() {
    let mut transport = StdioTransport::new(mock_server_config(&["--log-requests"]));
    transport.start().await.expect("transport should start");

    let (frame, _) = ping_frame("ping-1");
    transport.send_message(&frame).await.expect("send");
    transport
        .read_message(Duration::from_secs(2))
        .await
        .expect("response");

    let stderr = transport.stderr();
    let pattern = Regex::new("handling ping").unwrap();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    assert!(
        stderr.wait_for_match(&pattern, deadline).await,
        "stderr: {}",
        stderr.snapshot()
    );

    stderr.clear();
    assert!(stderr.snapshot().is_empty());

    transport.stop().await;
}

#[tokio::test]
async fn spawn_failure_is_launch_failed() {
    let mut config = mock_server_config(&[]);
    config.command = String::from("/nonexistent/not-an-mcp-server");
    let mut transport = StdioTransport::new(config);

    let err = transport.start().await.expect_err("spawn must fail");
    assert!(matches!(err, HarnessError::LaunchFailed { .. }));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let mut transport = StdioTransport::new(mock_server_config(&[]));
    transport.start().await.expect("transport should start");
    transport.stop().await;
    transport.stop().await;
}
