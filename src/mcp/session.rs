//! MCP session: handshake and request/response correlation.
//!
//! A session owns one subprocess communicator for its whole life. After
//! [`McpSession::connect`] returns, the MCP handshake is complete and
//! the server is ready for test traffic. The harness never multiplexes
//! requests, so correlation is send-then-await-matching-id; anything
//! else that arrives in between (late replies, server requests, server
//! notifications, stdout noise) is recorded as a diagnostic or logged,
//! never silently consumed.

use crate::config::ServerConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::matcher::{Diagnostic, DiagnosticKind};
use crate::mcp::protocol::{self, Frame, JsonRpcResponse, RequestId};
use crate::mcp::transport::{StderrBuffer, StdioTransport};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// The MCP protocol revision the harness speaks.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// The fixed id of the handshake's `initialize` request.
const INIT_REQUEST_ID: &str = "init-1";

/// One server subprocess from spawn to stop, handshake included.
#[derive(Debug)]
pub struct McpSession {
    transport: StdioTransport,
    /// Ids of requests sent earlier in this session, for telling a late
    /// reply apart from a genuinely unknown id.
    issued: HashSet<String>,
    /// Monotonic counter behind [`Self::assign_id`].
    seq: u64,
    /// Set once the handshake completes.
    ready: bool,
}

impl McpSession {
    /// Spawns the server and runs the MCP handshake.
    ///
    /// The subprocess is stopped again if any handshake step fails, so
    /// an error here never leaks a child process.
    ///
    /// # Errors
    ///
    /// [`HarnessError::LaunchFailed`], [`HarnessError::StartupTimeout`],
    /// or [`HarnessError::HandshakeFailed`].
    pub async fn connect(config: &ServerConfig) -> HarnessResult<Self> {
        let mut transport = StdioTransport::new(config.clone());
        transport.start().await?;
        let mut session = Self {
            transport,
            issued: HashSet::new(),
            seq: 0,
            ready: false,
        };
        match session.handshake().await {
            Ok(()) => {
                session.ready = true;
                Ok(session)
            }
            Err(e) => {
                session.transport.stop().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> HarnessResult<()> {
        let config = self.transport.config();
        let timeout = config.request_timeout();
        let settle = config.post_initialize_delay();
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": config.client_name.clone(),
                "version": config.client_version.clone(),
            },
        });

        let id = RequestId::from(INIT_REQUEST_ID);
        let frame = protocol::request_value(&id, "initialize", params);
        self.transport
            .send_message(&frame)
            .await
            .map_err(handshake_error)?;

        let mut scratch = Vec::new();
        let response = self
            .await_response(&id, timeout, &mut scratch)
            .await
            .map_err(handshake_error)?;
        self.issued.insert(id.to_string());

        if let Some(error) = &response.error {
            return Err(HarnessError::HandshakeFailed {
                reason: format!("server rejected initialize: {error}"),
                payload: response.raw.get("error").cloned(),
            });
        }
        if response.result.is_none() {
            return Err(HarnessError::HandshakeFailed {
                reason: String::from("initialize response carries no result"),
                payload: None,
            });
        }

        let initialized = protocol::notification_value("notifications/initialized", json!({}));
        self.transport
            .send_message(&initialized)
            .await
            .map_err(handshake_error)?;

        // Some servers acknowledge initialize before they actually
        // listen; give them a moment before the first test request.
        tokio::time::sleep(settle).await;
        tracing::debug!(server = %self.transport.config().name, "session ready");
        Ok(())
    }

    /// Sends a normalized request frame and awaits the response carrying
    /// `id`, recording anything unexpected along the way into `diags`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::TransportClosed`], [`HarnessError::ReadTimeout`],
    /// or [`HarnessError::ServerExited`].
    pub async fn roundtrip(
        &mut self,
        frame: &Value,
        id: &RequestId,
        diags: &mut Vec<Diagnostic>,
    ) -> HarnessResult<JsonRpcResponse> {
        let timeout = self.transport.config().request_timeout();
        self.transport.send_message(frame).await?;
        let result = self.await_response(id, timeout, diags).await;
        self.issued.insert(id.to_string());
        for line in self.transport.take_noise() {
            diags.push(Diagnostic::new(
                DiagnosticKind::StdoutNoise,
                "",
                format!("server wrote a non-frame line to stdout: {line}"),
            ));
        }
        result
    }

    /// Reads frames until the response for `id` arrives or the deadline
    /// passes.
    async fn await_response(
        &mut self,
        id: &RequestId,
        timeout: Duration,
        diags: &mut Vec<Diagnostic>,
    ) -> HarnessResult<JsonRpcResponse> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            let remaining = if deadline > now {
                deadline - now
            } else {
                Duration::ZERO
            };
            match self.transport.read_message(remaining).await? {
                Frame::Response(response) => {
                    if response.id.as_ref() == Some(id) {
                        return Ok(response);
                    }
                    let stale_id = response
                        .id
                        .as_ref()
                        .map_or_else(|| String::from("<none>"), ToString::to_string);
                    let kind = if self.issued.contains(&stale_id) {
                        DiagnosticKind::UnexpectedLateResponse
                    } else {
                        DiagnosticKind::IdMismatch
                    };
                    diags.push(
                        Diagnostic::new(
                            kind,
                            "",
                            format!("expected response id '{id}', got '{stale_id}'"),
                        )
                        .actual(response.raw.clone()),
                    );
                }
                Frame::Request { method, .. } => {
                    if method == "initialize" {
                        diags.push(Diagnostic::new(
                            DiagnosticKind::ProtocolViolation,
                            "",
                            "server sent an initialize request after the session was ready",
                        ));
                    } else {
                        tracing::debug!(%method, "ignoring server-initiated request");
                    }
                }
                Frame::Notification { method, .. } => {
                    tracing::debug!(%method, "server notification");
                }
            }
        }
    }

    /// Auto-assigns a request id: `{method}-{seq}`.
    pub fn assign_id(&mut self, method: &str) -> String {
        self.seq += 1;
        format!("{method}-{}", self.seq)
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Handle to the accumulated stderr of the subprocess.
    #[must_use]
    pub fn stderr(&self) -> StderrBuffer {
        self.transport.stderr()
    }

    /// Stops the subprocess. Idempotent.
    pub async fn shutdown(&mut self) {
        self.ready = false;
        self.transport.stop().await;
    }
}

/// Transport failures during the handshake are handshake failures: the
/// suite cannot run at all, which is a different policy scope than a
/// mid-suite transport error.
fn handshake_error(error: HarnessError) -> HarnessError {
    match error {
        e @ HarnessError::HandshakeFailed { .. } => e,
        other => HarnessError::HandshakeFailed {
            reason: other.to_string(),
            payload: None,
        },
    }
}
