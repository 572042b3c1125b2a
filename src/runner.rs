//! Test orchestrator.
//!
//! Drives each suite against a fresh session: spawn, handshake, then
//! the tests strictly in order. A transport error marks the current
//! test as an error and restarts the session so a crashed server does
//! not poison the tests after it. The subprocess is stopped on every
//! exit path.

use crate::config::ServerConfig;
use crate::matcher::{match_template, Diagnostic, DiagnosticKind, MatchOutcome, Pattern};
use crate::mcp::protocol;
use crate::mcp::session::McpSession;
use crate::report::{RunReport, SuiteOutcome, TestResult, TestStatus};
use crate::suite::{Suite, TestCase};
use serde_json::Value;
use std::time::Instant;

/// Runs every suite sequentially and aggregates the results.
///
/// Suites are independent: each gets its own session, and a suite that
/// cannot start (launch, startup, or handshake failure) is marked as an
/// error while the remaining suites still run.
pub async fn run_suites(config: &ServerConfig, suites: &[Suite]) -> RunReport {
    let run_start = Instant::now();
    let mut outcomes = Vec::with_capacity(suites.len());
    for suite in suites {
        tracing::info!(suite = %suite.description, tests = suite.tests.len(), "running suite");
        outcomes.push(run_suite(config, suite).await);
    }
    RunReport::new(outcomes, run_start.elapsed().as_millis() as u64)
}

/// Compiles every pattern in the given suites without touching a
/// server, reporting author errors as failed tests. Backs `--syntax-only`.
#[must_use]
pub fn check_suites(suites: &[Suite]) -> RunReport {
    let start = Instant::now();
    let mut outcomes = Vec::with_capacity(suites.len());
    for suite in suites {
        let mut tests = Vec::with_capacity(suite.tests.len());
        for test in &suite.tests {
            let mut diags = Vec::new();
            if let Err(reason) = protocol::normalize_request(&test.request, "syntax-check") {
                diags.push(Diagnostic::new(DiagnosticKind::InvalidRequest, "", reason));
            }
            for template in [&test.expect.response, &test.expect.stderr]
                .into_iter()
                .flatten()
            {
                if let Err(error) = Pattern::compile(template) {
                    diags.push(error.into_diagnostic(""));
                }
            }
            let status = if diags.is_empty() {
                TestStatus::Pass
            } else {
                TestStatus::Fail
            };
            tests.push(TestResult {
                suite: suite.description.clone(),
                name: test.it.clone(),
                status,
                duration_ms: 0,
                diagnostics: diags,
                stderr_captured: None,
            });
        }
        outcomes.push(SuiteOutcome {
            description: suite.description.clone(),
            setup_ms: 0,
            error: None,
            tests,
        });
    }
    RunReport::new(outcomes, start.elapsed().as_millis() as u64)
}

async fn run_suite(config: &ServerConfig, suite: &Suite) -> SuiteOutcome {
    let setup_start = Instant::now();
    let mut session = match McpSession::connect(config).await {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(suite = %suite.description, %error, "suite setup failed");
            return SuiteOutcome {
                description: suite.description.clone(),
                setup_ms: setup_start.elapsed().as_millis() as u64,
                error: Some(error.to_string()),
                tests: suite
                    .tests
                    .iter()
                    .map(|test| TestResult {
                        suite: suite.description.clone(),
                        name: test.it.clone(),
                        status: TestStatus::Skipped,
                        duration_ms: 0,
                        diagnostics: Vec::new(),
                        stderr_captured: None,
                    })
                    .collect(),
            };
        }
    };
    let setup_ms = setup_start.elapsed().as_millis() as u64;

    let mut tests = Vec::with_capacity(suite.tests.len());
    // Set when a session restart fails; the remaining tests cannot run.
    let mut broken: Option<String> = None;

    for test in &suite.tests {
        if let Some(reason) = &broken {
            tests.push(TestResult {
                suite: suite.description.clone(),
                name: test.it.clone(),
                status: TestStatus::Error,
                duration_ms: 0,
                diagnostics: vec![Diagnostic::new(
                    DiagnosticKind::Transport,
                    "",
                    format!("session restart failed: {reason}"),
                )],
                stderr_captured: None,
            });
            continue;
        }

        let (result, poisoned) = run_test(&mut session, suite, test).await;
        tests.push(result);

        if poisoned {
            session.shutdown().await;
            match McpSession::connect(config).await {
                Ok(fresh) => session = fresh,
                Err(error) => {
                    tracing::error!(suite = %suite.description, %error, "session restart failed");
                    broken = Some(error.to_string());
                }
            }
        }
    }

    session.shutdown().await;
    SuiteOutcome {
        description: suite.description.clone(),
        setup_ms,
        error: None,
        tests,
    }
}

/// Drives a single test. The boolean is `true` when the session must be
/// restarted before the next test.
async fn run_test(
    session: &mut McpSession,
    suite: &Suite,
    test: &TestCase,
) -> (TestResult, bool) {
    let start = Instant::now();
    let mut diags: Vec<Diagnostic> = Vec::new();

    if test.clear_stderr {
        session.stderr().clear();
    }

    let method = test
        .request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("request")
        .to_string();
    let fallback_id = session.assign_id(&method);
    let (frame, id) = match protocol::normalize_request(&test.request, &fallback_id) {
        Ok(pair) => pair,
        Err(reason) => {
            diags.push(Diagnostic::new(DiagnosticKind::InvalidRequest, "", reason));
            return (finish(session, suite, test, TestStatus::Error, start, diags), false);
        }
    };

    tracing::debug!(test = %test.it, %id, "sending request");
    match session.roundtrip(&frame, &id, &mut diags).await {
        Ok(response) => {
            let mut passed = true;
            if let Some(template) = &test.expect.response {
                let outcome = match_response(template, &response.raw);
                passed &= outcome.passed;
                diags.extend(outcome.diagnostics);
            }
            if let Some(expected) = &test.expect.stderr {
                let stderr_text = session.stderr().snapshot();
                let outcome = match_stderr(expected, &stderr_text);
                passed &= outcome.passed;
                diags.extend(outcome.diagnostics);
            }
            let status = if passed { TestStatus::Pass } else { TestStatus::Fail };
            (finish(session, suite, test, status, start, diags), false)
        }
        Err(error) => {
            let poisons = error.poisons_session();
            diags.push(Diagnostic::new(
                DiagnosticKind::Transport,
                "",
                error.to_string(),
            ));
            (finish(session, suite, test, TestStatus::Error, start, diags), poisons)
        }
    }
}

fn finish(
    session: &McpSession,
    suite: &Suite,
    test: &TestCase,
    status: TestStatus,
    start: Instant,
    diagnostics: Vec<Diagnostic>,
) -> TestResult {
    let stderr_captured = if status == TestStatus::Pass {
        None
    } else {
        Some(session.stderr().snapshot())
    };
    TestResult {
        suite: suite.description.clone(),
        name: test.it.clone(),
        status,
        duration_ms: start.elapsed().as_millis() as u64,
        diagnostics,
        stderr_captured,
    }
}

/// Evaluates a response template against the whole response frame.
///
/// The root object match is implicitly partial: templates usually
/// author only `result` (or `error`), while the frame also carries
/// `jsonrpc` and `id`. Nested objects keep strict key matching unless
/// the author opts into `match:partial`.
fn match_response(template: &Value, raw: &Value) -> MatchOutcome {
    match Pattern::compile(template) {
        Ok(Pattern::Object { fields, .. }) => {
            let pattern = Pattern::Object {
                fields,
                partial: true,
            };
            let mut path = crate::matcher::PointerPath::default();
            let mut diagnostics = Vec::new();
            let passed = pattern.eval(Some(raw), &mut path, &mut diagnostics);
            MatchOutcome {
                passed,
                diagnostics,
            }
        }
        Ok(pattern) => {
            let mut path = crate::matcher::PointerPath::default();
            let mut diagnostics = Vec::new();
            let passed = pattern.eval(Some(raw), &mut path, &mut diagnostics);
            MatchOutcome {
                passed,
                diagnostics,
            }
        }
        Err(error) => MatchOutcome {
            passed: false,
            diagnostics: vec![error.into_diagnostic("")],
        },
    }
}

/// Evaluates a stderr expectation. A plain string is a substring check;
/// anything else goes through the pattern DSL against the buffer as a
/// string value.
fn match_stderr(expected: &Value, stderr_text: &str) -> MatchOutcome {
    match expected {
        Value::String(s) if !s.starts_with("match:") => {
            if stderr_text.contains(s.as_str()) {
                MatchOutcome {
                    passed: true,
                    diagnostics: Vec::new(),
                }
            } else {
                MatchOutcome {
                    passed: false,
                    diagnostics: vec![Diagnostic::new(
                        DiagnosticKind::StringShape,
                        "",
                        format!("stderr does not contain '{s}'"),
                    )
                    .actual(Value::String(stderr_text.to_string()))],
                }
            }
        }
        template => match_template(template, &Value::String(stderr_text.to_string())),
    }
}
