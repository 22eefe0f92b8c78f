// used for the truthy/falsy lookup table
use std::collections::HashMap;
// used to print out readable forms of a type specifier
use std::fmt;

use lazy_static::lazy_static;
use serde_json::{Number, Value};

lazy_static! {
    // Strings accepted by a bool field. Anything not in here is rejected,
    // there is no fallback to generic truthiness.
    static ref TRUTH_TABLE: HashMap<&'static str, bool> = {
        let mut table = HashMap::new();
        for truthy in ["true", "yes", "y", "on", "1"] {
            table.insert(truthy, true);
        }
        for falsy in ["false", "no", "n", "off", "0"] {
            table.insert(falsy, false);
        }
        table
    };
}

/// Looks up a string in the boolean table, ignoring case and surrounding whitespace.
pub fn parse_bool(s: &str) -> Option<bool> {
    TRUTH_TABLE.get(s.trim().to_lowercase().as_str()).copied()
}

/// The target type of a type-enforced field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSpec {
    Int,
    Float,
    Str,
    Bool,
    List,
    Map,
}

impl TypeSpec {
    pub fn name(&self) -> &'static str {
        match self {
            TypeSpec::Int => "int",
            TypeSpec::Float => "float",
            TypeSpec::Str => "str",
            TypeSpec::Bool => "bool",
            TypeSpec::List => "list",
            TypeSpec::Map => "map",
        }
    }

    /// Converts `value` into this type, or returns `None` when no sensible
    /// conversion exists. `Null` is never converted.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => None,
            (TypeSpec::Int, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    // truncates toward zero, like a numeric int conversion would;
                    // anything outside i64 is rejected instead of saturating
                    n.as_f64()
                        .map(f64::trunc)
                        .filter(|t| t.is_finite() && *t >= i64::MIN as f64 && *t < i64::MAX as f64)
                        .map(|t| Value::from(t as i64))
                }
            }
            (TypeSpec::Int, Value::Bool(b)) => Some(Value::from(i64::from(*b))),
            (TypeSpec::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (TypeSpec::Float, Value::Number(n)) => {
                n.as_f64().and_then(Number::from_f64).map(Value::Number)
            }
            (TypeSpec::Float, Value::Bool(b)) => {
                Number::from_f64(if *b { 1.0 } else { 0.0 }).map(Value::Number)
            }
            (TypeSpec::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (TypeSpec::Str, Value::String(_)) => Some(value.clone()),
            (TypeSpec::Str, other) => Some(Value::String(other.to_string())),
            (TypeSpec::Bool, Value::Bool(_)) => Some(value.clone()),
            (TypeSpec::Bool, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            (TypeSpec::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool),
            (TypeSpec::List, Value::Array(_)) => Some(value.clone()),
            (TypeSpec::Map, Value::Object(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Renders a value as plain text: strings without quotes, everything else as JSON.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
