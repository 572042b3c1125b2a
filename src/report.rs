//! Result aggregation and output.
//!
//! The machine output (`--json`) is a single JSON document:
//! `{"summary": {...}, "suites": [...]}`. The human renderer is
//! deliberately plain — no colors, no pager — because the rich output
//! manager lives outside the core.

use crate::matcher::{Diagnostic, DiagnosticKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Outcome of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// All expectations held.
    Pass,
    /// An expectation did not hold.
    Fail,
    /// The test could not be driven to a verdict (timeout, crash, bad
    /// request).
    Error,
    /// The test never ran (suite setup failed earlier).
    Skipped,
}

/// One finalized test result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Description of the suite this test belongs to.
    pub suite: String,
    /// The test's `it` name.
    pub name: String,
    /// Verdict.
    pub status: TestStatus,
    /// Wall-clock duration of the exchange and match.
    pub duration_ms: u64,
    /// Mismatch and transport diagnostics; empty on pass.
    pub diagnostics: Vec<Diagnostic>,
    /// Stderr captured during the test, kept for non-pass outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_captured: Option<String>,
}

/// One suite's results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteOutcome {
    /// The suite description.
    pub description: String,
    /// Time spent spawning the server and completing the handshake.
    pub setup_ms: u64,
    /// Suite-level failure (launch, startup, handshake), when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-test results, in execution order.
    pub tests: Vec<TestResult>,
}

/// Run-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Tests that passed.
    pub pass: usize,
    /// Tests that failed an expectation.
    pub fail: usize,
    /// Tests that errored (including suites that never started).
    pub error: usize,
    /// Tests that never ran.
    pub skipped: usize,
    /// Total wall-clock duration of the run.
    pub duration_ms: u64,
}

/// The machine-readable result document.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run-wide totals.
    pub summary: Summary,
    /// Per-suite results.
    pub suites: Vec<SuiteOutcome>,
}

/// A cluster of identical-looking diagnostics, for `--group-errors`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticGroup {
    /// The matcher kind shared by the cluster.
    pub kind: DiagnosticKind,
    /// The JSON pointer shared by the cluster.
    pub path: String,
    /// How many diagnostics fell into the cluster.
    pub count: usize,
    /// Names of the affected tests.
    pub tests: Vec<String>,
}

/// Presentation knobs consumed by the human renderer.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Show passing tests with their diagnostics context.
    pub verbose: bool,
    /// Only print the summary line.
    pub quiet: bool,
    /// Append per-test durations.
    pub timing: bool,
    /// Only print failing and erroring tests.
    pub errors_only: bool,
    /// Append the grouped-diagnostics section.
    pub group_errors: bool,
    /// One line per failure, no diagnostic detail.
    pub concise: bool,
    /// Cap on diagnostics printed across the whole run.
    pub max_errors: Option<usize>,
    /// Suppress suggestion/grouping analysis in the output.
    pub no_analysis: bool,
}

impl RunReport {
    /// Builds the report, computing the summary from the suites.
    #[must_use]
    pub fn new(suites: Vec<SuiteOutcome>, duration_ms: u64) -> Self {
        let mut summary = Summary {
            duration_ms,
            ..Summary::default()
        };
        for suite in &suites {
            if suite.error.is_some() {
                summary.error += 1;
            }
            for test in &suite.tests {
                match test.status {
                    TestStatus::Pass => summary.pass += 1,
                    TestStatus::Fail => summary.fail += 1,
                    TestStatus::Error => summary.error += 1,
                    TestStatus::Skipped => summary.skipped += 1,
                }
            }
        }
        Self { summary, suites }
    }

    /// `true` when nothing failed or errored (an empty run passes).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.summary.fail == 0 && self.summary.error == 0
    }

    /// Process exit code: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    /// The machine output document.
    ///
    /// # Errors
    ///
    /// Propagates serialization failures (practically unreachable).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Clusters diagnostics by matcher kind and JSON pointer.
    #[must_use]
    pub fn grouped_diagnostics(&self) -> Vec<DiagnosticGroup> {
        let mut groups: BTreeMap<(String, String), DiagnosticGroup> = BTreeMap::new();
        for suite in &self.suites {
            for test in &suite.tests {
                for diag in &test.diagnostics {
                    let key = (diag.kind.to_string(), diag.path.clone());
                    let group = groups.entry(key).or_insert_with(|| DiagnosticGroup {
                        kind: diag.kind,
                        path: diag.path.clone(),
                        count: 0,
                        tests: Vec::new(),
                    });
                    group.count += 1;
                    if !group.tests.contains(&test.name) {
                        group.tests.push(test.name.clone());
                    }
                }
            }
        }
        groups.into_values().collect()
    }

    /// Renders the plain-text report.
    #[must_use]
    pub fn render_human(&self, opts: &OutputOptions) -> String {
        let mut out = String::new();
        let mut shown_diags = 0usize;
        let budget = opts.max_errors.unwrap_or(usize::MAX);

        if !opts.quiet {
            for suite in &self.suites {
                let mut lines = Vec::new();
                for test in &suite.tests {
                    let show = match test.status {
                        TestStatus::Pass => !opts.errors_only,
                        TestStatus::Fail | TestStatus::Error => true,
                        TestStatus::Skipped => !opts.errors_only,
                    };
                    if !show {
                        continue;
                    }
                    let marker = match test.status {
                        TestStatus::Pass => "ok  ",
                        TestStatus::Fail => "FAIL",
                        TestStatus::Error => "ERR ",
                        TestStatus::Skipped => "skip",
                    };
                    let timing = if opts.timing {
                        format!(" ({} ms)", test.duration_ms)
                    } else {
                        String::new()
                    };
                    lines.push(format!("  {marker} {}{timing}", test.name));
                    // Passing tests can still carry informational
                    // diagnostics (stdout noise, late responses);
                    // `--verbose` surfaces them.
                    let show_diags = test.status != TestStatus::Pass || opts.verbose;
                    if !opts.concise && show_diags {
                        for diag in &test.diagnostics {
                            if shown_diags >= budget {
                                break;
                            }
                            lines.push(format!("       - {diag}"));
                            if !opts.no_analysis {
                                if let Some(expected) = &diag.expected {
                                    lines.push(format!("         expected: {expected}"));
                                }
                                if let Some(actual) = &diag.actual {
                                    lines.push(format!("         actual:   {actual}"));
                                }
                            }
                            shown_diags += 1;
                        }
                    }
                }
                let has_failure = suite.error.is_some()
                    || suite
                        .tests
                        .iter()
                        .any(|t| matches!(t.status, TestStatus::Fail | TestStatus::Error));
                if opts.errors_only && !has_failure {
                    continue;
                }
                let setup = if opts.timing {
                    format!(" (setup {} ms)", suite.setup_ms)
                } else {
                    String::new()
                };
                let _ = writeln!(out, "{}{setup}", suite.description);
                if let Some(error) = &suite.error {
                    let _ = writeln!(out, "  suite error: {error}");
                }
                for line in lines {
                    let _ = writeln!(out, "{line}");
                }
            }

            if opts.group_errors && !opts.no_analysis {
                let groups = self.grouped_diagnostics();
                if !groups.is_empty() {
                    let _ = writeln!(out, "grouped errors:");
                    for group in groups {
                        let _ = writeln!(
                            out,
                            "  {} at '{}' x{} ({})",
                            group.kind,
                            if group.path.is_empty() { "<root>" } else { group.path.as_str() },
                            group.count,
                            group.tests.join(", ")
                        );
                    }
                }
            }
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "{} passed, {} failed, {} errors, {} skipped ({} ms)",
            s.pass, s.fail, s.error, s.skipped, s.duration_ms
        );
        out
    }
}
