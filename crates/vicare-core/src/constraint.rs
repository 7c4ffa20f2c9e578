// ── Parameter constraints ──
//
// Command parameters arrive as loosely shaped JSON (`type` plus ad-hoc
// constraint keys, sometimes nested under `constraints`). They are parsed
// once into a `ParamConstraint` and never re-inspected as JSON afterwards.

use std::fmt;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{ValidationError, Violation};

/// Allowed distance from the step grid, in units of the step.
pub const STEP_TOLERANCE: f64 = 1e-6;

/// The declared shape of one command parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamConstraint {
    Number {
        /// Declared as `integer` rather than `number`.
        integer: bool,
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
        /// Declared `enum`; checked after range and step.
        options: Option<Vec<f64>>,
    },
    Boolean,
    Text {
        /// Declared `enum`; checked before length and pattern.
        options: Option<Vec<String>>,
        min_length: Option<usize>,
        max_length: Option<usize>,
        pattern: Option<Pattern>,
    },
    /// Schedules, objects and other structured types. Accepts any value.
    Opaque {
        type_name: String,
    },
}

/// A full-match regular expression taken from a parameter declaration.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` so that it must match the whole string.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

impl ParamConstraint {
    /// Parse a raw parameter declaration such as
    /// `{"type":"number","required":true,"constraints":{"min":0.2,"max":3.5,"stepping":0.1}}`.
    pub fn from_json(param: &str, decl: &Value) -> Self {
        let lookup = Lookup { decl };
        let type_name = decl
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        match type_name {
            "number" | "integer" => {
                let step = lookup.number(&["stepping", "step"]);
                let step = match step {
                    Some(s) if s > 0.0 => Some(s),
                    Some(s) => {
                        warn!(param, step = s, "ignoring non-positive step");
                        None
                    }
                    None => None,
                };
                Self::Number {
                    integer: type_name == "integer",
                    min: lookup.number(&["min"]),
                    max: lookup.number(&["max"]),
                    step,
                    options: lookup.options(Value::as_f64),
                }
            }
            "boolean" => Self::Boolean,
            "string" => {
                let pattern = lookup
                    .get(&["regEx", "pattern"])
                    .and_then(Value::as_str)
                    .and_then(|source| match Pattern::new(source) {
                        Ok(p) => Some(p),
                        Err(e) => {
                            warn!(param, pattern = source, error = %e, "dropping invalid pattern");
                            None
                        }
                    });
                Self::Text {
                    options: lookup.options(|o| o.as_str().map(str::to_owned)),
                    min_length: lookup.length("minLength"),
                    max_length: lookup.length("maxLength"),
                    pattern,
                }
            }
            other => Self::Opaque {
                type_name: other.to_owned(),
            },
        }
    }

    /// Short name of the expected JSON type, used in error messages.
    fn expected(&self) -> &'static str {
        match self {
            Self::Number { integer: true, .. } => "integer",
            Self::Number { integer: false, .. } => "number",
            Self::Boolean => "boolean",
            Self::Text { .. } => "string",
            Self::Opaque { .. } => "any",
        }
    }
}

/// Reads a key from the declaration itself or its `constraints` object.
struct Lookup<'a> {
    decl: &'a Value,
}

impl<'a> Lookup<'a> {
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        let nested = self.decl.get("constraints");
        keys.iter().find_map(|k| {
            nested
                .and_then(|c| c.get(*k))
                .or_else(|| self.decl.get(*k))
        })
    }

    fn number(&self, keys: &[&str]) -> Option<f64> {
        self.get(keys).and_then(Value::as_f64)
    }

    fn length(&self, key: &str) -> Option<usize> {
        self.get(&[key])
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// The `enum` list, keeping the entries `convert` understands.
    fn options<T>(&self, convert: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
        self.get(&["enum"])
            .and_then(Value::as_array)
            .map(|options| options.iter().filter_map(convert).collect())
    }
}

// ── Validation ──────────────────────────────────────────────────────

/// Check `value` against `constraint`, returning it unchanged when valid.
///
/// Rules run in a fixed order (type, numeric range and step, options,
/// string length and pattern) and the first violation wins. Nothing is
/// coerced or clamped.
pub fn validate(
    param: &str,
    value: &Value,
    constraint: &ParamConstraint,
) -> Result<Value, ValidationError> {
    let fail = |violation: Violation| ValidationError {
        param: param.to_owned(),
        value: value.to_string(),
        violation,
    };
    let mismatch = || {
        fail(Violation::TypeMismatch {
            expected: constraint.expected(),
            found: json_type(value),
        })
    };

    match constraint {
        ParamConstraint::Opaque { .. } => {}
        ParamConstraint::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch());
            }
        }
        ParamConstraint::Number {
            integer,
            min,
            max,
            step,
            options,
        } => {
            let n = value.as_f64().ok_or_else(mismatch)?;
            if *integer && n.fract() != 0.0 {
                return Err(mismatch());
            }
            if let Some(min) = min.filter(|m| n < *m) {
                return Err(fail(Violation::BelowMinimum { min }));
            }
            if let Some(max) = max.filter(|m| n > *m) {
                return Err(fail(Violation::AboveMaximum { max }));
            }
            if let Some(step) = *step {
                let base = min.unwrap_or(0.0);
                if !on_step(n, base, step) {
                    return Err(fail(Violation::OffStep { step, base }));
                }
            }
            if let Some(options) = options.as_ref().filter(|o| !o.contains(&n)) {
                return Err(fail(Violation::NotAnOption {
                    options: options.iter().map(f64::to_string).collect(),
                }));
            }
        }
        ParamConstraint::Text {
            options,
            min_length,
            max_length,
            pattern,
        } => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if let Some(options) = options
                .as_ref()
                .filter(|options| !options.iter().any(|o| o == s))
            {
                return Err(fail(Violation::NotAnOption {
                    options: options.clone(),
                }));
            }
            let len = s.chars().count();
            if let Some(min_length) = min_length.filter(|m| len < *m) {
                return Err(fail(Violation::TooShort { min_length }));
            }
            if let Some(max_length) = max_length.filter(|m| len > *m) {
                return Err(fail(Violation::TooLong { max_length }));
            }
            if let Some(pattern) = pattern.as_ref().filter(|p| !p.is_match(s)) {
                return Err(fail(Violation::PatternMismatch {
                    pattern: pattern.as_str().to_owned(),
                }));
            }
        }
    }

    Ok(value.clone())
}

fn on_step(value: f64, base: f64, step: f64) -> bool {
    let steps = (value - base) / step;
    (steps - steps.round()).abs() <= STEP_TOLERANCE
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
