//! Centralized error types for the harness.
//!
//! Every failure the runner has to react to is a variant of
//! [`HarnessError`]. The variant determines the recovery scope: a config
//! error aborts the run, a launch or handshake error fails the suite, and
//! a transport error fails the current test and forces a session restart.

use serde_json::Value;
use thiserror::Error;

/// Result type alias using [`HarnessError`].
pub type HarnessResult<T> = Result<T, HarnessError>;

/// How much of the run an error poisons.
///
/// The runner recovers at the smallest scope that preserves test
/// independence: test > suite > run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Fatal; the whole run aborts.
    Run,
    /// The current suite is marked as an error; remaining suites continue.
    Suite,
    /// The current test is marked as an error; the session is restarted
    /// before the next test.
    Test,
}

/// Errors raised by the harness core.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The config file is missing, unreadable, or malformed.
    #[error("invalid config '{path}': {reason}")]
    ConfigInvalid {
        /// Path of the offending config file.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A `--filter` expression failed to parse.
    #[error("invalid filter '{expr}': {reason}")]
    FilterInvalid {
        /// The expression as given.
        expr: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A suite file failed to load or parse.
    #[error("invalid suite '{path}': {reason}")]
    SuiteInvalid {
        /// Path of the offending suite file.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The server process could not be spawned.
    #[error("failed to launch '{command}': {reason}")]
    LaunchFailed {
        /// The command that failed to spawn.
        command: String,
        /// The underlying spawn error.
        reason: String,
    },

    /// The server did not become ready within `startupTimeoutMs`.
    #[error("server not ready within {timeout_ms} ms")]
    StartupTimeout {
        /// The configured startup timeout.
        timeout_ms: u64,
    },

    /// The MCP initialize exchange failed.
    #[error("initialize handshake failed: {reason}")]
    HandshakeFailed {
        /// Human-readable description of the failure.
        reason: String,
        /// The server's error payload, when it sent one.
        payload: Option<Value>,
    },

    /// No frame arrived within `requestTimeoutMs`.
    #[error("no response within {timeout_ms} ms")]
    ReadTimeout {
        /// The configured request timeout.
        timeout_ms: u64,
    },

    /// A write to the server's stdin failed.
    #[error("transport closed: {reason}")]
    TransportClosed {
        /// The underlying I/O error.
        reason: String,
    },

    /// The child exited before a frame was received.
    #[error("server exited{}", exit_code_suffix(.code))]
    ServerExited {
        /// The exit code, if the child exited normally.
        code: Option<i32>,
        /// The tail of captured stderr, for the diagnostic.
        stderr_tail: String,
    },

}

fn exit_code_suffix(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" with code {c}"),
        None => String::from(" without an exit code"),
    }
}

impl HarnessError {
    /// Returns the recovery scope for this error.
    #[must_use]
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::ConfigInvalid { .. } | Self::FilterInvalid { .. } => ErrorScope::Run,
            Self::SuiteInvalid { .. }
            | Self::LaunchFailed { .. }
            | Self::StartupTimeout { .. }
            | Self::HandshakeFailed { .. } => ErrorScope::Suite,
            Self::ReadTimeout { .. }
            | Self::TransportClosed { .. }
            | Self::ServerExited { .. } => ErrorScope::Test,
        }
    }

    /// Returns `true` if the session must be restarted after this error.
    ///
    /// Transport errors leave the subprocess in an unknown state; the
    /// runner tears the communicator down and starts fresh so a crashed
    /// server does not poison subsequent tests.
    #[must_use]
    pub fn poisons_session(&self) -> bool {
        matches!(
            self,
            Self::ReadTimeout { .. } | Self::TransportClosed { .. } | Self::ServerExited { .. }
        )
    }
}
