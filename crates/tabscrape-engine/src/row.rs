//! Result rows and scalar values

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// One result row: column name to value, in header order
pub type ResultRow = IndexMap<String, Value>;

/// A scalar recovered from the transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Coerce a trimmed transcript field.
    ///
    /// `null`/`NULL` become [`Value::Null`], all-digit fields integers,
    /// `digits.digits` floats, and everything else text. Digit runs too
    /// large for `i64` stay text so no digits are lost.
    pub fn coerce(raw: &str) -> Value {
        if raw == "null" || raw == "NULL" {
            return Value::Null;
        }
        if is_digits(raw) {
            return raw
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(raw.to_string()));
        }
        if let Some((whole, frac)) = raw.split_once('.') {
            if is_digits(whole) && is_digits(frac) {
                if let Ok(f) = raw.parse::<f64>() {
                    return Value::Float(f);
                }
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Canonical text used to match rows across result sets; `None` for null
    pub fn join_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
