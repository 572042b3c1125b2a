//! Common test utilities and fixtures.
//!
//! Provides a temp-directory context for suite-file tests and a
//! launch-config factory pointing at the `mock_mcp_server` fixture
//! binary.

#![allow(dead_code)]

use conductor::config::ServerConfig;
use std::collections::HashMap;
use std::path::PathBuf;

/// Test context providing a temporary directory for file operations.
pub struct TestContext {
    /// Temporary directory, removed on drop.
    pub temp_dir: tempfile::TempDir,
}

impl TestContext {
    /// Creates a new test context with a temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Returns the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Creates a file in the temporary directory with the given content.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A launch config for the `mock_mcp_server` fixture with the given
/// scenario flags. Timeouts are short to keep failure tests fast.
#[must_use]
pub fn mock_server_config(args: &[&str]) -> ServerConfig {
    ServerConfig {
        name: String::from("mock"),
        command: String::from(env!("CARGO_BIN_EXE_mock_mcp_server")),
        args: args.iter().map(ToString::to_string).collect(),
        cwd: None,
        env: HashMap::new(),
        startup_timeout_ms: 2_000,
        request_timeout_ms: 2_000,
        ready_pattern: None,
        post_initialize_delay_ms: 10,
        client_name: String::from("conductor-tests"),
        client_version: String::from("0.0.0"),
    }
}
