//! Conductor - declarative conformance testing for MCP servers.
//!
//! Conductor launches an MCP server as a subprocess, performs the
//! protocol handshake, and drives YAML-authored test suites against it,
//! comparing each response with a `match:*` pattern DSL.
//!
//! The library surface mirrors the CLI: load a [`config::ServerConfig`]
//! and some [`suite::Suite`]s, hand them to [`runner::run_suites`], and
//! inspect the returned [`report::RunReport`].

pub mod config;
pub mod error;
pub mod matcher;
pub mod mcp;
pub mod report;
pub mod runner;
pub mod suite;

// Re-export the core types for convenient access
pub use config::ServerConfig;
pub use error::{ErrorScope, HarnessError, HarnessResult};
pub use matcher::{match_template, Diagnostic, DiagnosticKind, MatchOutcome, Pattern};
pub use report::{OutputOptions, RunReport, TestResult, TestStatus};
pub use runner::{check_suites, run_suites};
pub use suite::{apply_filter, load_suites, Filter, Suite, TestCase};
