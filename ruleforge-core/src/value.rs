//! The runtime value domain (§3 "Value domain").
//!
//! Every runtime value is one of: null, boolean, number (arbitrary-precision
//! decimal), string, date/time instant, ordered list, or string-keyed map.
//! Integer/float distinctions are never surfaced to rules — all numeric
//! literals and arithmetic results live in `Value::Number`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Decimal),
    // `DateTime` must be tried before `String`: both serialize to a JSON
    // string (RFC3339), and an untagged enum deserializes into the first
    // variant whose own deserializer accepts the input, so ordering this
    // after `String` would make every date silently come back as a string.
    DateTime(DateTime<Utc>),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn number(d: impl Into<Decimal>) -> Self {
        Value::Number(d.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::DateTime(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "object",
        }
    }

    /// Boolean coercion used by logical operators and conditions
    /// (§4.6 "Logical"): null/0/""/empty-list → false, else true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::DateTime(_) => true,
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Textual representation used for string concatenation coercion
    /// (§4.6 "Binary string concatenation"): numbers with no trailing
    /// zeros, booleans as `true`/`false`, null as `""`, collections as
    /// canonical JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.normalize().to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::List(_) | Value::Map(_) => self.to_canonical_json(),
        }
    }

    /// Canonical JSON with sorted keys, per §6 "Result JSON emission is
    /// canonical (sorted keys for determinism in tests)".
    pub fn to_canonical_json(&self) -> String {
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                // Preserve precision: emit via string-parseable f64 when
                // exact, otherwise fall back to a JSON string to avoid
                // silently truncating precision at the boundary.
                if let Ok(f) = n.to_string().parse::<f64>() {
                    serde_json::Number::from_f64(f)
                        .map(serde_json::Value::Number)
                        .unwrap_or_else(|| serde_json::Value::String(n.to_string()))
                } else {
                    serde_json::Value::String(n.to_string())
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Map(m) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in m {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => {
                let d = Decimal::from_str_exact(&n.to_string())
                    .or_else(|_| n.as_f64().map(Decimal::from_f64_retain).ok_or(()))
                    .unwrap_or(Decimal::ZERO);
                Value::Number(d)
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) => Value::List(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => {
                let mut m = BTreeMap::new();
                for (k, v) in o {
                    m.insert(k.clone(), Value::from_json(v));
                }
                Value::Map(m)
            }
        }
    }
}

// `Decimal::from_str_exact` is from rust_decimal >= 1.x; if unavailable in a
// given feature set we fall back to parsing through `Decimal::from_str`.
trait DecimalExt {
    fn from_str_exact(s: &str) -> Result<Decimal, ()>;
    fn from_f64_retain(f: f64) -> Decimal;
}

impl DecimalExt for Decimal {
    fn from_str_exact(s: &str) -> Result<Decimal, ()> {
        use std::str::FromStr;
        Decimal::from_str(s).map_err(|_| ())
    }

    fn from_f64_retain(f: f64) -> Decimal {
        Decimal::from_str(&f.to_string()).unwrap_or(Decimal::ZERO)
    }
}

/// Structural equality: equality across unlike types is `false`, never an
/// error (§8 "Equality across unlike types is false (not an error)").
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Ordering across unlike types is not defined here — callers must check
/// type compatibility first and raise an `EvalError`; `partial_cmp` returns
/// `None` for cross-type comparisons so the evaluator can distinguish
/// "equal/less/greater" from "incomparable".
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}
