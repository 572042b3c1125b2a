//! Server launch configuration.
//!
//! The config file is a JSON document describing how to start the MCP
//! server under test. Unknown fields are ignored so configs can carry
//! tooling-specific keys; missing required fields fail the load.
//!
//! ```json
//! {
//!   "name": "filesystem-server",
//!   "command": "node",
//!   "args": ["./server.js"],
//!   "env": { "LOG_LEVEL": "debug" },
//!   "startupTimeoutMs": 5000,
//!   "requestTimeoutMs": 5000,
//!   "readyPattern": "listening on stdio"
//! }
//! ```

use crate::error::{HarnessError, HarnessResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default path of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "./conductor.config.json";

fn default_startup_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_post_initialize_delay_ms() -> u64 {
    100
}

fn default_client_name() -> String {
    String::from("conductor")
}

fn default_client_version() -> String {
    String::from(env!("CARGO_PKG_VERSION"))
}

/// Immutable launch descriptor for the server under test.
///
/// Created once at load time and read-only thereafter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Display name for the server (used in reports and logs).
    pub name: String,

    /// Executable to spawn.
    pub command: String,

    /// Arguments passed to the executable, in order.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child; inherits ours when absent.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment overlaid onto the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Bound on spawn-to-ready, in milliseconds.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Bound on any single read for a response, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Regex over stderr that signals the server is ready to serve.
    ///
    /// When absent, `start()` returns as soon as the child is spawned.
    #[serde(default)]
    pub ready_pattern: Option<String>,

    /// Settle time after the `initialized` notification before the first
    /// test request. Some servers acknowledge initialize before they are
    /// actually listening.
    #[serde(default = "default_post_initialize_delay_ms")]
    pub post_initialize_delay_ms: u64,

    /// `clientInfo.name` sent during the handshake.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// `clientInfo.version` sent during the handshake.
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

impl ServerConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ConfigInvalid`] when the file is missing,
    /// unreadable, malformed, or carries an invalid `readyPattern`.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HarnessError::ConfigInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| HarnessError::ConfigInvalid {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> HarnessResult<()> {
        if self.command.is_empty() {
            return Err(HarnessError::ConfigInvalid {
                path: path.display().to_string(),
                reason: String::from("`command` must not be empty"),
            });
        }
        if let Some(pattern) = &self.ready_pattern {
            Regex::new(pattern).map_err(|e| HarnessError::ConfigInvalid {
                path: path.display().to_string(),
                reason: format!("invalid readyPattern: {e}"),
            })?;
        }
        Ok(())
    }

    /// Compiled `readyPattern`, if configured.
    ///
    /// Validation at load time guarantees the pattern compiles.
    #[must_use]
    pub fn ready_regex(&self) -> Option<Regex> {
        self.ready_pattern.as_deref().and_then(|p| Regex::new(p).ok())
    }

    /// Startup timeout as a [`Duration`].
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Post-handshake settle delay as a [`Duration`].
    #[must_use]
    pub fn post_initialize_delay(&self) -> Duration {
        Duration::from_millis(self.post_initialize_delay_ms)
    }
}
