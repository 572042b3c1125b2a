//! Test suite model, YAML loading, and filtering.
//!
//! A suite file is one or more YAML documents, each with a
//! `description` and an ordered list of `tests`. The `request` field of
//! a test is the JSON-RPC request exactly as the author wrote it; the
//! runner only fills in `jsonrpc` and a generated `id` when missing.
//!
//! ```yaml
//! description: tool discovery
//! tags: [tools]
//! tests:
//!   - it: lists the echo tool
//!     request:
//!       method: tools/list
//!       params: {}
//!     expect:
//!       response:
//!         result:
//!           tools: "match:arrayContains:{name:echo}"
//! ```

use crate::error::{HarnessError, HarnessResult};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

fn default_clear_stderr() -> bool {
    true
}

/// One YAML document: a description plus its ordered tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suite {
    /// Human-readable suite description.
    pub description: String,
    /// Optional tags, matched by `tag:` filters.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The tests, run strictly in order.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// One declarative test.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Test name.
    pub it: String,
    /// Optional tags, matched by `tag:` filters.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The JSON-RPC request as authored.
    pub request: Value,
    /// What to assert about the exchange.
    #[serde(default)]
    pub expect: Expect,
    /// Whether the stderr buffer is cleared before this test runs.
    /// Opting out (`clearStderr: false`) lets stderr accumulate across
    /// tests.
    #[serde(default = "default_clear_stderr")]
    pub clear_stderr: bool,
}

/// Expectations of a test; either or both fields may be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expect {
    /// Template matched against the whole response frame.
    #[serde(default)]
    pub response: Option<Value>,
    /// Pattern checked against the accumulated stderr. A plain string
    /// is a substring check; `match:*` strings use the full DSL.
    #[serde(default)]
    pub stderr: Option<Value>,
}

/// Parses a (possibly multi-document) YAML stream of suites.
///
/// # Errors
///
/// [`HarnessError::SuiteInvalid`] on any malformed document.
pub fn parse_suites(text: &str, origin: &str) -> HarnessResult<Vec<Suite>> {
    let mut suites = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let suite = Suite::deserialize(document).map_err(|e| HarnessError::SuiteInvalid {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        suites.push(suite);
    }
    Ok(suites)
}

/// Loads every suite matched by the given glob patterns, in pattern
/// order then path order.
///
/// # Errors
///
/// [`HarnessError::SuiteInvalid`] for malformed globs, unreadable
/// files, or YAML that does not describe a suite.
pub fn load_suites(patterns: &[String]) -> HarnessResult<Vec<Suite>> {
    let mut suites = Vec::new();
    for pattern in patterns {
        let paths = glob::glob(pattern).map_err(|e| HarnessError::SuiteInvalid {
            path: pattern.clone(),
            reason: format!("bad glob pattern: {e}"),
        })?;
        let mut matched = false;
        for entry in paths {
            let path = entry.map_err(|e| HarnessError::SuiteInvalid {
                path: pattern.clone(),
                reason: e.to_string(),
            })?;
            if path.is_dir() {
                continue;
            }
            matched = true;
            suites.extend(load_suite_file(&path)?);
        }
        if !matched {
            tracing::warn!(%pattern, "no suite files matched");
        }
    }
    Ok(suites)
}

fn load_suite_file(path: &Path) -> HarnessResult<Vec<Suite>> {
    let text = std::fs::read_to_string(path).map_err(|e| HarnessError::SuiteInvalid {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_suites(&text, &path.display().to_string())
}

/// A suite/test filter expression.
///
/// `tag:x` selects by tag, `/re/` applies a regex to test names and
/// suite descriptions, anything else is a case-insensitive substring
/// over the same fields.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Exact tag match on the test's or suite's tags.
    Tag(String),
    /// Regex over test name and suite description.
    Regex(Regex),
    /// Case-insensitive substring over test name and suite description.
    Substring(String),
}

impl Filter {
    /// Parses a filter expression.
    ///
    /// # Errors
    ///
    /// [`HarnessError::FilterInvalid`] when a `/re/` body does not
    /// compile.
    pub fn parse(expr: &str) -> HarnessResult<Self> {
        if let Some(tag) = expr.strip_prefix("tag:") {
            return Ok(Self::Tag(tag.to_string()));
        }
        if expr.len() >= 2 && expr.starts_with('/') && expr.ends_with('/') {
            let body = &expr[1..expr.len() - 1];
            return Regex::new(body)
                .map(Self::Regex)
                .map_err(|e| HarnessError::FilterInvalid {
                    expr: expr.to_string(),
                    reason: e.to_string(),
                });
        }
        Ok(Self::Substring(expr.to_lowercase()))
    }

    fn keeps(&self, description: &str, suite_tags: &[String], test: &TestCase) -> bool {
        match self {
            Self::Tag(tag) => {
                test.tags.iter().any(|t| t == tag) || suite_tags.iter().any(|t| t == tag)
            }
            Self::Regex(re) => re.is_match(&test.it) || re.is_match(description),
            Self::Substring(needle) => {
                test.it.to_lowercase().contains(needle)
                    || description.to_lowercase().contains(needle)
            }
        }
    }
}

/// Applies a filter, dropping tests that do not match and suites left
/// with no tests. Idempotent.
#[must_use]
pub fn apply_filter(suites: Vec<Suite>, filter: &Filter) -> Vec<Suite> {
    suites
        .into_iter()
        .filter_map(|mut suite| {
            let description = suite.description.clone();
            let tags = suite.tags.clone();
            suite.tests.retain(|test| filter.keeps(&description, &tags, test));
            if suite.tests.is_empty() {
                None
            } else {
                Some(suite)
            }
        })
        .collect()
}
