//! Match diagnostics.
//!
//! Every failed comparison produces a [`Diagnostic`] carrying the JSON
//! pointer of the mismatch, the expected and actual values where they
//! help, and the matcher kind for grouping. Diagnostics are the only
//! failure channel of the matcher: evaluation is total and never panics.

use serde::Serialize;
use serde_json::Value;

/// All operator names the DSL understands, used for nearest-name
/// suggestions when an author misspells one.
pub const KNOWN_MATCHERS: &[&str] = &[
    "type",
    "regex",
    "contains",
    "startsWith",
    "endsWith",
    "length",
    "arrayLength",
    "arrayContains",
    "arrayElements",
    "between",
    "range",
    "greaterThan",
    "lessThan",
    "equals",
    "notEquals",
    "approximately",
    "multipleOf",
    "dateFormat",
    "dateAfter",
    "dateBefore",
    "dateEquals",
    "dateAge",
    "extractField",
    "partial",
    "not",
    "exists",
];

/// Returns the closest known matcher name within Levenshtein distance 2.
#[must_use]
pub fn suggest_matcher(name: &str) -> Option<&'static str> {
    KNOWN_MATCHERS
        .iter()
        .map(|known| (strsim::levenshtein(name, known), *known))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, known)| known)
}

/// The comparison that produced a diagnostic. Doubles as the grouping
/// key for `--group-errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Deep-equality mismatch against a literal template value.
    Equality,
    /// Actual value had a different JSON type than required.
    TypeMismatch,
    /// The template addressed a value the actual object does not have.
    MissingValue,
    /// Non-partial object match found keys the template does not name.
    UnexpectedKey,
    /// `match:regex` did not match.
    Regex,
    /// `match:contains` / `startsWith` / `endsWith` failed.
    StringShape,
    /// `match:length` / `match:arrayLength` failed.
    Length,
    /// `match:arrayContains` found no matching element.
    ArrayContains,
    /// `match:arrayElements` had a non-conforming element.
    ArrayElements,
    /// Numeric comparison (`between`, `greaterThan`, ...) failed.
    Numeric,
    /// `match:approximately` was outside tolerance.
    Approximately,
    /// `match:multipleOf` failed.
    MultipleOf,
    /// `match:dateFormat` could not parse the actual value.
    DateFormat,
    /// `dateAfter` / `dateBefore` / `dateEquals` failed.
    DateCompare,
    /// `match:dateAge` exceeded the allowed age.
    DateAge,
    /// `match:extractField` path did not resolve.
    Extract,
    /// `match:not` sub-pattern unexpectedly passed.
    Not,
    /// `match:exists` found nothing.
    Exists,
    /// The template used an operator the DSL does not know.
    UnknownMatcher,
    /// An operator argument could not be parsed.
    BadPatternArgument,
    /// A response carried an id the harness never issued.
    IdMismatch,
    /// A response for an earlier, timed-out request surfaced late.
    UnexpectedLateResponse,
    /// The server violated the MCP lifecycle (e.g. `initialize` after
    /// the session was ready).
    ProtocolViolation,
    /// A stdout line that was not a JSON-RPC frame.
    StdoutNoise,
    /// The authored `request` is not a usable JSON-RPC request.
    InvalidRequest,
    /// The exchange could not be completed (timeout, crash, closed
    /// pipe).
    Transport,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Equality => "equality",
            Self::TypeMismatch => "typeMismatch",
            Self::MissingValue => "missingValue",
            Self::UnexpectedKey => "unexpectedKey",
            Self::Regex => "regex",
            Self::StringShape => "stringShape",
            Self::Length => "length",
            Self::ArrayContains => "arrayContains",
            Self::ArrayElements => "arrayElements",
            Self::Numeric => "numeric",
            Self::Approximately => "approximately",
            Self::MultipleOf => "multipleOf",
            Self::DateFormat => "dateFormat",
            Self::DateCompare => "dateCompare",
            Self::DateAge => "dateAge",
            Self::Extract => "extract",
            Self::Not => "not",
            Self::Exists => "exists",
            Self::UnknownMatcher => "unknownMatcher",
            Self::BadPatternArgument => "badPatternArgument",
            Self::IdMismatch => "idMismatch",
            Self::UnexpectedLateResponse => "unexpectedLateResponse",
            Self::ProtocolViolation => "protocolViolation",
            Self::StdoutNoise => "stdoutNoise",
            Self::InvalidRequest => "invalidRequest",
            Self::Transport => "transport",
        };
        f.write_str(name)
    }
}

/// One mismatch, anchored at a JSON pointer into the actual value.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// What kind of comparison failed.
    pub kind: DiagnosticKind,
    /// JSON pointer to the mismatch (`""` is the document root).
    pub path: String,
    /// What the template wanted, when representable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// What the server actually produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Author-facing description of the failure.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic with no expected/actual payload.
    #[must_use]
    pub fn new(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            expected: None,
            actual: None,
            message: message.into(),
        }
    }

    /// Attaches the expected value.
    #[must_use]
    pub fn expected(mut self, value: Value) -> Self {
        self.expected = Some(value);
        self
    }

    /// Attaches the actual value.
    #[must_use]
    pub fn actual(mut self, value: Value) -> Self {
        self.actual = Some(value);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.kind, self.message)
        } else {
            write!(f, "{} at {}: {}", self.kind, self.path, self.message)
        }
    }
}
