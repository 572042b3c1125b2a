//! The `match:*` operator catalogue.
//!
//! Operators are parsed once at template-compile time (`match:<name>` or
//! `match:<name>:<arg>`, where the argument may itself contain colons)
//! and evaluated against the actual value during the structural walk.
//! Parse failures are author errors and carry a nearest-name suggestion
//! where one exists.

use crate::matcher::diag::{suggest_matcher, Diagnostic, DiagnosticKind};
use crate::matcher::{values_equal, Pattern, PointerPath};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

/// An unusable template: unknown operator name or malformed argument.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// The operator name is not in the catalogue.
    #[error("unknown matcher '{name}'{}", suggestion_suffix(.suggestion))]
    UnknownMatcher {
        /// The name as authored.
        name: String,
        /// Closest known name, when within edit distance 2.
        suggestion: Option<&'static str>,
    },

    /// The operator exists but its argument does not parse.
    #[error("bad argument for 'match:{operator}': {reason}")]
    BadArgument {
        /// The operator name.
        operator: String,
        /// Why the argument was rejected.
        reason: String,
    },
}

fn suggestion_suffix(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean 'match:{name}'?)"),
        None => String::new(),
    }
}

impl PatternError {
    /// Converts the author error into a test diagnostic.
    #[must_use]
    pub fn into_diagnostic(self, path: &str) -> Diagnostic {
        let kind = match &self {
            Self::UnknownMatcher { .. } => DiagnosticKind::UnknownMatcher,
            Self::BadArgument { .. } => DiagnosticKind::BadPatternArgument,
        };
        Diagnostic::new(kind, path, self.to_string())
    }
}

/// The six JSON types `match:type` distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// JSON null.
    Null,
}

impl JsonType {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// Date formats understood by `match:dateFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormatKind {
    /// Either an ISO date or an ISO datetime.
    Iso,
    /// `YYYY-MM-DD`.
    IsoDate,
    /// RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]`.
    IsoDatetime,
    /// Unix epoch in seconds or milliseconds, number or numeric string.
    Unix,
    /// Any of the above.
    Any,
}

impl DateFormatKind {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "iso" => Some(Self::Iso),
            "iso-date" => Some(Self::IsoDate),
            "iso-datetime" => Some(Self::IsoDatetime),
            "unix" => Some(Self::Unix),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Iso => "iso",
            Self::IsoDate => "iso-date",
            Self::IsoDatetime => "iso-datetime",
            Self::Unix => "unix",
            Self::Any => "any",
        }
    }

    fn parses(self, value: &Value) -> bool {
        match self {
            Self::Iso => value
                .as_str()
                .is_some_and(|s| parse_iso_date(s).is_some() || parse_iso_datetime(s).is_some()),
            Self::IsoDate => value.as_str().is_some_and(|s| parse_iso_date(s).is_some()),
            Self::IsoDatetime => value.as_str().is_some_and(|s| parse_iso_datetime(s).is_some()),
            Self::Unix => parse_unix_value(value).is_some(),
            Self::Any => parse_date_value(value).is_some(),
        }
    }
}

/// How an `arrayContains` argument matches an element.
#[derive(Debug)]
pub enum ArrayContainsSpec {
    /// A nested pattern; the element must satisfy it.
    Pattern(Box<Pattern>),
    /// Field constraints; the element must be an object carrying them.
    Fields(Vec<(String, Value)>),
    /// A plain value; the element must equal it (or, as a convenience,
    /// be the argument's raw string form).
    Value {
        /// The argument parsed as JSON where possible.
        parsed: Value,
        /// The argument exactly as authored.
        raw: String,
    },
}

/// A compiled `match:*` operator.
#[derive(Debug)]
pub enum MatchOp {
    /// `match:type:T`
    Type(JsonType),
    /// `match:regex:R` (unanchored).
    Regex(Regex),
    /// `match:contains:S`
    Contains(String),
    /// `match:startsWith:S`
    StartsWith(String),
    /// `match:endsWith:S`
    EndsWith(String),
    /// `match:length:N` — string or array length.
    Length(usize),
    /// `match:arrayLength:N`
    ArrayLength(usize),
    /// `match:arrayContains:V`
    ArrayContains {
        /// Element matching rule.
        spec: ArrayContainsSpec,
        /// Raw argument, for diagnostics.
        raw: String,
    },
    /// `match:arrayElements` — every element must satisfy the template.
    ArrayElements(Box<Pattern>),
    /// `match:between:A:B` (inclusive); `match:range` is an alias.
    Between {
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },
    /// `match:greaterThan:N`
    GreaterThan(f64),
    /// `match:lessThan:N`
    LessThan(f64),
    /// `match:equals:N`
    EqualsNumber(f64),
    /// `match:notEquals:N`
    NotEqualsNumber(f64),
    /// `match:approximately:N:E`
    Approximately {
        /// Target value.
        target: f64,
        /// Inclusive tolerance.
        tolerance: f64,
    },
    /// `match:multipleOf:N`
    MultipleOf(f64),
    /// `match:dateFormat:F`
    DateFormat(DateFormatKind),
    /// `match:dateAfter:D` (strict).
    DateAfter(DateTime<Utc>),
    /// `match:dateBefore:D` (strict).
    DateBefore(DateTime<Utc>),
    /// `match:dateEquals:D`
    DateEquals(DateTime<Utc>),
    /// `match:dateAge:D` — now minus actual must not exceed D.
    DateAge(chrono::Duration),
    /// `match:exists`
    Exists,
    /// `match:not:<subpattern>`
    Not {
        /// The wrapped pattern.
        inner: Box<Pattern>,
        /// Raw sub-spec, for diagnostics.
        raw: String,
    },
}

/// Parses a full operator string (`match:` prefix included).
///
/// # Errors
///
/// [`PatternError`] for unknown names or malformed arguments.
pub fn parse_operator(spec: &str) -> Result<MatchOp, PatternError> {
    let rest = spec.strip_prefix("match:").unwrap_or(spec);
    let (name, arg) = match rest.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (rest, None),
    };

    let bad = |reason: &str| PatternError::BadArgument {
        operator: name.to_string(),
        reason: reason.to_string(),
    };

    let required = |arg: Option<&str>| -> Result<String, PatternError> {
        arg.map(str::to_string).ok_or_else(|| bad("argument required"))
    };

    match name {
        "type" => {
            let arg = required(arg)?;
            JsonType::from_arg(&arg)
                .map(MatchOp::Type)
                .ok_or_else(|| bad("expected one of string, number, boolean, object, array, null"))
        }
        "regex" => {
            let arg = required(arg)?;
            Regex::new(&arg)
                .map(MatchOp::Regex)
                .map_err(|e| bad(&format!("invalid regex: {e}")))
        }
        "contains" => Ok(MatchOp::Contains(required(arg)?)),
        "startsWith" => Ok(MatchOp::StartsWith(required(arg)?)),
        "endsWith" => Ok(MatchOp::EndsWith(required(arg)?)),
        "length" => parse_usize(&required(arg)?)
            .map(MatchOp::Length)
            .ok_or_else(|| bad("expected a non-negative integer")),
        "arrayLength" => parse_usize(&required(arg)?)
            .map(MatchOp::ArrayLength)
            .ok_or_else(|| bad("expected a non-negative integer")),
        "arrayContains" => {
            let raw = required(arg)?;
            let spec = parse_contains_arg(&raw)?;
            Ok(MatchOp::ArrayContains { spec, raw })
        }
        "arrayElements" => {
            let raw = required(arg)?;
            let inner = compile_sub_pattern(&raw)?;
            Ok(MatchOp::ArrayElements(Box::new(inner)))
        }
        "between" | "range" => {
            let arg = required(arg)?;
            let (lo, hi) = arg
                .split_once(':')
                .ok_or_else(|| bad("expected two numbers, e.g. between:1:10"))?;
            let lo = parse_f64(lo).ok_or_else(|| bad("lower bound is not a number"))?;
            let hi = parse_f64(hi).ok_or_else(|| bad("upper bound is not a number"))?;
            Ok(MatchOp::Between { lo, hi })
        }
        "greaterThan" => parse_f64(&required(arg)?)
            .map(MatchOp::GreaterThan)
            .ok_or_else(|| bad("expected a number")),
        "lessThan" => parse_f64(&required(arg)?)
            .map(MatchOp::LessThan)
            .ok_or_else(|| bad("expected a number")),
        "equals" => parse_f64(&required(arg)?)
            .map(MatchOp::EqualsNumber)
            .ok_or_else(|| bad("expected a number")),
        "notEquals" => parse_f64(&required(arg)?)
            .map(MatchOp::NotEqualsNumber)
            .ok_or_else(|| bad("expected a number")),
        "approximately" => {
            let arg = required(arg)?;
            let (target, tolerance) = arg
                .split_once(':')
                .ok_or_else(|| bad("expected target and tolerance, e.g. approximately:100:5"))?;
            let target = parse_f64(target).ok_or_else(|| bad("target is not a number"))?;
            let tolerance = parse_f64(tolerance).ok_or_else(|| bad("tolerance is not a number"))?;
            Ok(MatchOp::Approximately { target, tolerance })
        }
        "multipleOf" => {
            let n = parse_f64(&required(arg)?).ok_or_else(|| bad("expected a number"))?;
            if n == 0.0 {
                return Err(bad("divisor must not be zero"));
            }
            Ok(MatchOp::MultipleOf(n))
        }
        "dateFormat" => {
            let arg = required(arg)?;
            DateFormatKind::from_arg(&arg)
                .map(MatchOp::DateFormat)
                .ok_or_else(|| bad("expected one of iso, iso-date, iso-datetime, unix, any"))
        }
        "dateAfter" => parse_date_arg(&required(arg)?)
            .map(MatchOp::DateAfter)
            .ok_or_else(|| bad("expected an ISO date or unix epoch")),
        "dateBefore" => parse_date_arg(&required(arg)?)
            .map(MatchOp::DateBefore)
            .ok_or_else(|| bad("expected an ISO date or unix epoch")),
        "dateEquals" => parse_date_arg(&required(arg)?)
            .map(MatchOp::DateEquals)
            .ok_or_else(|| bad("expected an ISO date or unix epoch")),
        "dateAge" => {
            let arg = required(arg)?;
            let duration = humantime::parse_duration(&arg)
                .map_err(|e| bad(&format!("invalid duration: {e}")))?;
            let duration = chrono::Duration::from_std(duration)
                .map_err(|_| bad("duration out of range"))?;
            Ok(MatchOp::DateAge(duration))
        }
        "exists" => match arg {
            None => Ok(MatchOp::Exists),
            Some(_) => Err(bad("takes no argument")),
        },
        "not" => {
            let raw = required(arg)?;
            let inner = compile_not_target(&raw)?;
            Ok(MatchOp::Not {
                inner: Box::new(inner),
                raw,
            })
        }
        "partial" => Err(bad(
            "applies to object templates: use {\"match:partial\": true, ...fields}",
        )),
        "extractField" => Err(bad(
            "needs a sibling template: use {\"match:extractField\": \"path\", \"value\": ...}",
        )),
        other => Err(PatternError::UnknownMatcher {
            name: other.to_string(),
            suggestion: suggest_matcher(other),
        }),
    }
}

/// Compiles a string-form sub-pattern (`arrayElements`, nested specs).
fn compile_sub_pattern(raw: &str) -> Result<Pattern, PatternError> {
    if raw.starts_with("match:") {
        Ok(Pattern::Op(parse_operator(raw)?))
    } else {
        Ok(Pattern::Literal(parse_scalar(raw)))
    }
}

/// Compiles the target of `match:not`. A bare operator spelling
/// (`not:contains:x`) is accepted alongside the explicit
/// `not:match:contains:x`; anything that is not an operator falls back
/// to literal string equality.
fn compile_not_target(raw: &str) -> Result<Pattern, PatternError> {
    if raw.starts_with("match:") {
        return Ok(Pattern::Op(parse_operator(raw)?));
    }
    match parse_operator(&format!("match:{raw}")) {
        Ok(op) => Ok(Pattern::Op(op)),
        Err(PatternError::UnknownMatcher { .. }) => {
            Ok(Pattern::Literal(Value::String(raw.to_string())))
        }
        Err(e) => Err(e),
    }
}

fn parse_contains_arg(raw: &str) -> Result<ArrayContainsSpec, PatternError> {
    if raw.starts_with("match:") {
        let inner = Pattern::compile(&Value::String(raw.to_string()))?;
        return Ok(ArrayContainsSpec::Pattern(Box::new(inner)));
    }
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.is_object() || value.is_array() {
            let inner = Pattern::compile(&value)?;
            return Ok(ArrayContainsSpec::Pattern(Box::new(inner)));
        }
        return Ok(ArrayContainsSpec::Value {
            parsed: value,
            raw: raw.to_string(),
        });
    }
    if let Some(fields) = parse_lenient_object(raw) {
        return Ok(ArrayContainsSpec::Fields(fields));
    }
    if let Some((field, value)) = raw.split_once(':') {
        return Ok(ArrayContainsSpec::Fields(vec![(
            field.trim().to_string(),
            parse_scalar(value.trim()),
        )]));
    }
    Ok(ArrayContainsSpec::Value {
        parsed: Value::String(raw.to_string()),
        raw: raw.to_string(),
    })
}

/// Parses the relaxed `{name:echo, version:1}` object shorthand.
fn parse_lenient_object(raw: &str) -> Option<Vec<(String, Value)>> {
    let inner = raw.strip_prefix('{')?.strip_suffix('}')?;
    let mut fields = Vec::new();
    for part in inner.split(',') {
        let (key, value) = part.split_once(':')?;
        let key = key.trim().trim_matches('"');
        if key.is_empty() {
            return None;
        }
        fields.push((key.to_string(), parse_scalar(value.trim())));
    }
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn parse_scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_usize(raw: &str) -> Option<usize> {
    raw.parse().ok()
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_iso_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn parse_iso_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn parse_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    // Values this large cannot be second-resolution timestamps of any
    // plausible date, so treat them as milliseconds.
    if n.abs() >= 1e12 {
        Utc.timestamp_millis_opt(n as i64).single()
    } else {
        Utc.timestamp_opt(n as i64, 0).single()
    }
}

fn parse_unix_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => parse_epoch(n.as_f64()?),
        Value::String(s) => parse_epoch(s.parse::<f64>().ok()?),
        _ => None,
    }
}

/// Parses a date argument as authored in a template.
fn parse_date_arg(s: &str) -> Option<DateTime<Utc>> {
    parse_iso_datetime(s)
        .or_else(|| parse_iso_date(s))
        .or_else(|| parse_epoch(s.parse::<f64>().ok()?))
}

/// Parses an actual value as a date, accepting every supported format.
fn parse_date_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_iso_datetime(s)
            .or_else(|| parse_iso_date(s))
            .or_else(|| parse_epoch(s.parse::<f64>().ok()?)),
        Value::Number(n) => parse_epoch(n.as_f64()?),
        _ => None,
    }
}

impl MatchOp {
    /// Evaluates the operator. Pushes diagnostics on failure and returns
    /// whether the actual value passed.
    pub(crate) fn eval(
        &self,
        actual: Option<&Value>,
        path: &mut PointerPath,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        // `exists` and `not` are the only operators defined on a missing
        // value; everything else fails it.
        match self {
            Self::Exists => {
                if actual.is_some() {
                    return true;
                }
                diags.push(Diagnostic::new(
                    DiagnosticKind::Exists,
                    path.pointer(),
                    "expected a value to be present",
                ));
                return false;
            }
            Self::Not { inner, raw } => {
                let mut scratch = Vec::new();
                if inner.eval(actual, path, &mut scratch) {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Not,
                            path.pointer(),
                            format!("expected pattern '{raw}' not to match"),
                        )
                        .actual(actual.cloned().unwrap_or(Value::Null)),
                    );
                    return false;
                }
                return true;
            }
            _ => {}
        }

        let Some(actual) = actual else {
            diags.push(Diagnostic::new(
                DiagnosticKind::MissingValue,
                path.pointer(),
                "no value at this location",
            ));
            return false;
        };

        match self {
            Self::Exists | Self::Not { .. } => unreachable!("handled above"),

            Self::Type(expected) => {
                if expected.matches(actual) {
                    true
                } else {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            path.pointer(),
                            format!("expected type {}", expected.name()),
                        )
                        .expected(json!(expected.name()))
                        .actual(actual.clone()),
                    );
                    false
                }
            }

            Self::Regex(regex) => match actual.as_str() {
                Some(s) if regex.is_match(s) => true,
                _ => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Regex,
                            path.pointer(),
                            format!("expected a string matching /{}/", regex.as_str()),
                        )
                        .expected(json!(regex.as_str()))
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::Contains(needle) => self.string_shape(
                actual,
                path,
                diags,
                |s| s.contains(needle.as_str()),
                &format!("expected a string containing '{needle}'"),
            ),
            Self::StartsWith(prefix) => self.string_shape(
                actual,
                path,
                diags,
                |s| s.starts_with(prefix.as_str()),
                &format!("expected a string starting with '{prefix}'"),
            ),
            Self::EndsWith(suffix) => self.string_shape(
                actual,
                path,
                diags,
                |s| s.ends_with(suffix.as_str()),
                &format!("expected a string ending with '{suffix}'"),
            ),

            Self::Length(expected) => {
                let length = match actual {
                    Value::String(s) => Some(s.chars().count()),
                    Value::Array(items) => Some(items.len()),
                    _ => None,
                };
                match length {
                    Some(len) if len == *expected => true,
                    Some(len) => {
                        diags.push(
                            Diagnostic::new(
                                DiagnosticKind::Length,
                                path.pointer(),
                                format!("expected length {expected}, got {len}"),
                            )
                            .expected(json!(expected))
                            .actual(json!(len)),
                        );
                        false
                    }
                    None => {
                        diags.push(
                            Diagnostic::new(
                                DiagnosticKind::Length,
                                path.pointer(),
                                "length applies to strings and arrays",
                            )
                            .actual(actual.clone()),
                        );
                        false
                    }
                }
            }

            Self::ArrayLength(expected) => match actual.as_array() {
                Some(items) if items.len() == *expected => true,
                Some(items) => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Length,
                            path.pointer(),
                            format!("expected array of length {expected}, got {}", items.len()),
                        )
                        .expected(json!(expected))
                        .actual(json!(items.len())),
                    );
                    false
                }
                None => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            path.pointer(),
                            "expected an array",
                        )
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::ArrayContains { spec, raw } => match actual.as_array() {
                Some(items) => {
                    let found = items.iter().any(|element| spec.element_matches(element));
                    if found {
                        true
                    } else {
                        diags.push(
                            Diagnostic::new(
                                DiagnosticKind::ArrayContains,
                                path.pointer(),
                                format!("no element matching '{raw}'"),
                            )
                            .expected(json!(raw))
                            .actual(actual.clone()),
                        );
                        false
                    }
                }
                None => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            path.pointer(),
                            "expected an array",
                        )
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::ArrayElements(inner) => match actual.as_array() {
                Some(items) => {
                    let mut all_ok = true;
                    for (index, element) in items.iter().enumerate() {
                        path.push(index);
                        if !inner.eval(Some(element), path, diags) {
                            all_ok = false;
                        }
                        path.pop();
                    }
                    all_ok
                }
                None => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::ArrayElements,
                            path.pointer(),
                            "expected an array",
                        )
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::Between { lo, hi } => self.numeric(
                actual,
                path,
                diags,
                |n| n >= *lo && n <= *hi,
                &format!("expected a number in [{lo}, {hi}]"),
            ),
            Self::GreaterThan(limit) => self.numeric(
                actual,
                path,
                diags,
                |n| n > *limit,
                &format!("expected a number > {limit}"),
            ),
            Self::LessThan(limit) => self.numeric(
                actual,
                path,
                diags,
                |n| n < *limit,
                &format!("expected a number < {limit}"),
            ),
            Self::EqualsNumber(target) => self.numeric(
                actual,
                path,
                diags,
                |n| n == *target,
                &format!("expected the number {target}"),
            ),
            Self::NotEqualsNumber(target) => self.numeric(
                actual,
                path,
                diags,
                |n| n != *target,
                &format!("expected a number other than {target}"),
            ),

            Self::Approximately { target, tolerance } => match actual.as_f64() {
                Some(n) if (n - target).abs() <= *tolerance => true,
                _ => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Approximately,
                            path.pointer(),
                            format!("expected {target} ± {tolerance}"),
                        )
                        .expected(json!(target))
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::MultipleOf(divisor) => match actual.as_f64() {
                Some(n) => {
                    let tolerance = 1e-9 * n.abs().max(divisor.abs());
                    let remainder = n - (n / divisor).round() * divisor;
                    if remainder.abs() <= tolerance {
                        true
                    } else {
                        diags.push(
                            Diagnostic::new(
                                DiagnosticKind::MultipleOf,
                                path.pointer(),
                                format!("expected a multiple of {divisor}"),
                            )
                            .expected(json!(divisor))
                            .actual(actual.clone()),
                        );
                        false
                    }
                }
                None => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::MultipleOf,
                            path.pointer(),
                            "expected a number",
                        )
                        .actual(actual.clone()),
                    );
                    false
                }
            },

            Self::DateFormat(kind) => {
                if kind.parses(actual) {
                    true
                } else {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::DateFormat,
                            path.pointer(),
                            format!("expected a date in format '{}'", kind.name()),
                        )
                        .expected(json!(kind.name()))
                        .actual(actual.clone()),
                    );
                    false
                }
            }

            Self::DateAfter(threshold) => {
                self.date_compare(actual, path, diags, |d| d > *threshold, "after", threshold)
            }
            Self::DateBefore(threshold) => {
                self.date_compare(actual, path, diags, |d| d < *threshold, "before", threshold)
            }
            Self::DateEquals(threshold) => {
                self.date_compare(actual, path, diags, |d| d == *threshold, "equal to", threshold)
            }

            Self::DateAge(max_age) => match parse_date_value(actual) {
                Some(date) => {
                    let age = Utc::now().signed_duration_since(date);
                    if age <= *max_age {
                        true
                    } else {
                        diags.push(
                            Diagnostic::new(
                                DiagnosticKind::DateAge,
                                path.pointer(),
                                format!("value is older than {max_age}"),
                            )
                            .actual(actual.clone()),
                        );
                        false
                    }
                }
                None => {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::DateAge,
                            path.pointer(),
                            "value is not a recognizable date",
                        )
                        .actual(actual.clone()),
                    );
                    false
                }
            },
        }
    }

    fn string_shape(
        &self,
        actual: &Value,
        path: &PointerPath,
        diags: &mut Vec<Diagnostic>,
        check: impl Fn(&str) -> bool,
        message: &str,
    ) -> bool {
        match actual.as_str() {
            Some(s) if check(s) => true,
            _ => {
                diags.push(
                    Diagnostic::new(DiagnosticKind::StringShape, path.pointer(), message)
                        .actual(actual.clone()),
                );
                false
            }
        }
    }

    fn numeric(
        &self,
        actual: &Value,
        path: &PointerPath,
        diags: &mut Vec<Diagnostic>,
        check: impl Fn(f64) -> bool,
        message: &str,
    ) -> bool {
        match actual.as_f64() {
            Some(n) if check(n) => true,
            _ => {
                diags.push(
                    Diagnostic::new(DiagnosticKind::Numeric, path.pointer(), message)
                        .actual(actual.clone()),
                );
                false
            }
        }
    }

    fn date_compare(
        &self,
        actual: &Value,
        path: &PointerPath,
        diags: &mut Vec<Diagnostic>,
        check: impl Fn(DateTime<Utc>) -> bool,
        relation: &str,
        threshold: &DateTime<Utc>,
    ) -> bool {
        match parse_date_value(actual) {
            Some(date) if check(date) => true,
            Some(_) => {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::DateCompare,
                        path.pointer(),
                        format!("expected a date strictly {relation} {}", threshold.to_rfc3339()),
                    )
                    .expected(json!(threshold.to_rfc3339()))
                    .actual(actual.clone()),
                );
                false
            }
            None => {
                diags.push(
                    Diagnostic::new(
                        DiagnosticKind::DateCompare,
                        path.pointer(),
                        "value is not a recognizable date",
                    )
                    .actual(actual.clone()),
                );
                false
            }
        }
    }
}

impl ArrayContainsSpec {
    fn element_matches(&self, element: &Value) -> bool {
        match self {
            Self::Pattern(pattern) => {
                let mut path = PointerPath::default();
                let mut scratch = Vec::new();
                pattern.eval(Some(element), &mut path, &mut scratch)
            }
            Self::Fields(fields) => match element.as_object() {
                Some(map) => fields.iter().all(|(key, expected)| {
                    map.get(key).is_some_and(|v| values_equal(expected, v))
                }),
                None => false,
            },
            Self::Value { parsed, raw } => {
                values_equal(parsed, element) || element.as_str() == Some(raw.as_str())
            }
        }
    }
}
