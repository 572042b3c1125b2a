//! Pattern matching for `expect` templates.
//!
//! A template is an ordinary JSON value in which strings beginning with
//! `match:` are operator invocations and a handful of object keys
//! (`match:extractField`, `match:arrayElements`, `match:partial`,
//! `match:not`) change how the containing object matches. Templates are
//! compiled once into a [`Pattern`] tree, then evaluated structurally
//! against the actual value.
//!
//! Evaluation is total: every template/actual pair yields either a pass
//! or a set of [`Diagnostic`]s — authoring mistakes (unknown operators,
//! malformed arguments) become diagnostics too, with a nearest-name
//! suggestion where one helps.

pub mod diag;
pub mod ops;
pub mod path;

pub use diag::{suggest_matcher, Diagnostic, DiagnosticKind, KNOWN_MATCHERS};
pub use ops::{ArrayContainsSpec, JsonType, MatchOp, PatternError};
pub use path::FieldPath;

use serde_json::{Map, Value};

/// Deep equality with numeric comparison for numbers, so a template's
/// `1` matches a server's `1.0`.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, va)| y.get(k).is_some_and(|vb| values_equal(va, vb)))
        }
        _ => a == b,
    }
}

/// Cursor into the actual value, rendered as an RFC 6901 JSON pointer
/// for diagnostics (`""` is the root).
#[derive(Debug, Clone, Default)]
pub struct PointerPath(Vec<String>);

impl PointerPath {
    /// Descends into a key or index.
    pub fn push(&mut self, segment: impl ToString) {
        self.0.push(segment.to_string());
    }

    /// Ascends one level.
    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// The current location as a JSON pointer.
    #[must_use]
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            out.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

/// A compiled template.
#[derive(Debug)]
pub enum Pattern {
    /// Deep equality against a literal value.
    Literal(Value),
    /// A `match:*` operator.
    Op(MatchOp),
    /// Field-by-field object match; `partial` relaxes it to subset
    /// equality (the actual may carry extra keys).
    Object {
        /// Template fields in authored order.
        fields: Vec<(String, Pattern)>,
        /// Whether extra keys in the actual are tolerated.
        partial: bool,
    },
    /// Positional array match; lengths must agree.
    Array(Vec<Pattern>),
    /// Extract a subvalue by dot-path, then match `value` against it.
    Extract {
        /// The extraction path.
        path: FieldPath,
        /// Template for the extracted value.
        value: Box<Pattern>,
    },
}

impl Pattern {
    /// Compiles a template value into a pattern tree.
    ///
    /// # Errors
    ///
    /// [`PatternError`] on unknown operators or malformed arguments.
    pub fn compile(template: &Value) -> Result<Self, PatternError> {
        match template {
            Value::String(s) if s.starts_with("match:") => {
                Ok(Self::Op(ops::parse_operator(s)?))
            }
            Value::Object(map) => Self::compile_object(map),
            Value::Array(items) => {
                let patterns = items.iter().map(Self::compile).collect::<Result<_, _>>()?;
                Ok(Self::Array(patterns))
            }
            other => Ok(Self::Literal(other.clone())),
        }
    }

    fn compile_object(map: &Map<String, Value>) -> Result<Self, PatternError> {
        let bad = |operator: &str, reason: &str| PatternError::BadArgument {
            operator: operator.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path_value) = map.get("match:extractField") {
            let raw = path_value
                .as_str()
                .ok_or_else(|| bad("extractField", "path must be a string"))?;
            let field_path =
                FieldPath::parse(raw).map_err(|reason| bad("extractField", &reason))?;
            let value_template = map
                .get("value")
                .ok_or_else(|| bad("extractField", "missing sibling 'value' template"))?;
            if map.len() > 2 {
                return Err(bad(
                    "extractField",
                    "only the path and a 'value' template are allowed here",
                ));
            }
            return Ok(Self::Extract {
                path: field_path,
                value: Box::new(Self::compile(value_template)?),
            });
        }

        if let Some(template) = map.get("match:arrayElements") {
            if map.len() > 1 {
                return Err(bad("arrayElements", "must be the only key of its object"));
            }
            return Ok(Self::Op(MatchOp::ArrayElements(Box::new(Self::compile(
                template,
            )?))));
        }

        if let Some(template) = map.get("match:not") {
            if map.len() > 1 {
                return Err(bad("not", "must be the only key of its object"));
            }
            return Ok(Self::Op(MatchOp::Not {
                inner: Box::new(Self::compile(template)?),
                raw: template.to_string(),
            }));
        }

        let mut partial = false;
        let mut fields = Vec::new();
        for (key, value) in map {
            if key == "match:partial" {
                match value.as_bool() {
                    Some(flag) => partial = flag,
                    None => return Err(bad("partial", "flag must be a boolean")),
                }
            } else if let Some(name) = key.strip_prefix("match:") {
                return Err(PatternError::UnknownMatcher {
                    name: name.to_string(),
                    suggestion: suggest_matcher(name),
                });
            } else {
                fields.push((key.clone(), Self::compile(value)?));
            }
        }
        Ok(Self::Object { fields, partial })
    }

    /// Evaluates the pattern against `actual` (`None` means the
    /// addressed location does not exist). Pushes diagnostics for every
    /// mismatch and returns whether the value passed.
    pub fn eval(
        &self,
        actual: Option<&Value>,
        path: &mut PointerPath,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        match self {
            Self::Op(op) => op.eval(actual, path, diags),

            Self::Literal(expected) => {
                let Some(actual) = actual else {
                    diags.push(missing(path));
                    return false;
                };
                if values_equal(expected, actual) {
                    true
                } else {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Equality,
                            path.pointer(),
                            "value does not equal the expected literal",
                        )
                        .expected(expected.clone())
                        .actual(actual.clone()),
                    );
                    false
                }
            }

            Self::Object { fields, partial } => {
                let Some(actual) = actual else {
                    diags.push(missing(path));
                    return false;
                };
                let Some(map) = actual.as_object() else {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            path.pointer(),
                            "expected an object",
                        )
                        .actual(actual.clone()),
                    );
                    return false;
                };
                let mut ok = true;
                for (key, pattern) in fields {
                    path.push(key);
                    if !pattern.eval(map.get(key), path, diags) {
                        ok = false;
                    }
                    path.pop();
                }
                if !partial {
                    for (key, value) in map {
                        if !fields.iter().any(|(k, _)| k == key) {
                            path.push(key);
                            diags.push(
                                Diagnostic::new(
                                    DiagnosticKind::UnexpectedKey,
                                    path.pointer(),
                                    format!(
                                        "key '{key}' is not in the template \
                                         (use match:partial to allow extras)"
                                    ),
                                )
                                .actual(value.clone()),
                            );
                            path.pop();
                            ok = false;
                        }
                    }
                }
                ok
            }

            Self::Array(patterns) => {
                let Some(actual) = actual else {
                    diags.push(missing(path));
                    return false;
                };
                let Some(items) = actual.as_array() else {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::TypeMismatch,
                            path.pointer(),
                            "expected an array",
                        )
                        .actual(actual.clone()),
                    );
                    return false;
                };
                if items.len() != patterns.len() {
                    diags.push(
                        Diagnostic::new(
                            DiagnosticKind::Length,
                            path.pointer(),
                            format!(
                                "expected {} elements, got {}",
                                patterns.len(),
                                items.len()
                            ),
                        )
                        .expected(serde_json::json!(patterns.len()))
                        .actual(serde_json::json!(items.len())),
                    );
                    return false;
                }
                let mut ok = true;
                for (index, (pattern, item)) in patterns.iter().zip(items).enumerate() {
                    path.push(index);
                    if !pattern.eval(Some(item), path, diags) {
                        ok = false;
                    }
                    path.pop();
                }
                ok
            }

            Self::Extract { path: field_path, value } => {
                let Some(actual) = actual else {
                    diags.push(missing(path));
                    return false;
                };
                match field_path.extract(actual) {
                    Some(extracted) => value.eval(Some(&extracted), path, diags),
                    None => {
                        diags.push(Diagnostic::new(
                            DiagnosticKind::Extract,
                            path.pointer(),
                            format!("path '{}' did not resolve", field_path.raw()),
                        ));
                        false
                    }
                }
            }
        }
    }
}

fn missing(path: &PointerPath) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::MissingValue,
        path.pointer(),
        "no value at this location",
    )
}

/// The result of matching a template against an actual value.
#[derive(Debug)]
pub struct MatchOutcome {
    /// Whether the actual value satisfied the template.
    pub passed: bool,
    /// Mismatch details; empty on pass.
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles and evaluates in one step. Total: compile failures surface
/// as diagnostics, never as errors.
#[must_use]
pub fn match_template(template: &Value, actual: &Value) -> MatchOutcome {
    match Pattern::compile(template) {
        Ok(pattern) => {
            let mut path = PointerPath::default();
            let mut diagnostics = Vec::new();
            let passed = pattern.eval(Some(actual), &mut path, &mut diagnostics);
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
