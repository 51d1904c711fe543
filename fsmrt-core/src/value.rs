//! Typed values and automaton variables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed value held by a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Truthiness as seen by guard expressions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    /// Numeric view, if this value is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Integer millisecond view used for variable-based delays.
    pub fn as_ms(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(x) => Some(*x as i64),
            _ => None,
        }
    }

    /// Converts a JSON literal into a value.
    ///
    /// Non-scalar JSON falls back to its textual form, as do nulls.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Null => Value::Str(String::new()),
            other => Value::Str(other.to_string()),
        }
    }

    /// Converts the value into a JSON literal.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::Bool(b) => serde_json::Value::from(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Int,
    Float,
    String,
    Bool,
}

impl VarType {
    /// Maps the document's textual type tag; unknown tags fall back to
    /// `String`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "int" => VarType::Int,
            "float" | "double" => VarType::Float,
            "bool" => VarType::Bool,
            _ => VarType::String,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            VarType::Int => "int",
            VarType::Float => "float",
            VarType::String => "string",
            VarType::Bool => "bool",
        }
    }

    /// Coerces a script result back into this declared type.
    ///
    /// Int truncates numerics; Float accepts any numeric; String takes the
    /// display form; Bool takes truthiness. Non-numeric strings coerce to 0.
    pub fn coerce(&self, value: &Value) -> Value {
        match self {
            VarType::Int => match value {
                Value::Int(i) => Value::Int(*i),
                Value::Float(x) => Value::Int(*x as i64),
                Value::Bool(b) => Value::Int(*b as i64),
                Value::Str(s) => Value::Int(s.trim().parse::<f64>().unwrap_or(0.0) as i64),
            },
            VarType::Float => match value {
                Value::Int(i) => Value::Float(*i as f64),
                Value::Float(x) => Value::Float(*x),
                Value::Bool(b) => Value::Float(*b as i64 as f64),
                Value::Str(s) => Value::Float(s.trim().parse::<f64>().unwrap_or(0.0)),
            },
            VarType::String => Value::Str(value.to_string()),
            VarType::Bool => Value::Bool(value.is_truthy()),
        }
    }
}

/// An internal variable of the automaton.
///
/// Each variable has a name, a declared type and a current value. The
/// current value may drift from the declared type; coercion happens on
/// string assignment and on script pull-back, never on `set`.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    ty: VarType,
    value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: VarType, init: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            value: init,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> VarType {
        self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Assigns a new value. No type checking against the declared type.
    pub fn set(&mut self, value: Value) {
        self.value = value;
    }

    /// Parses a string per the declared type; stores the raw string when
    /// parsing fails.
    pub fn set_from_string(&mut self, raw: &str) {
        self.value = match self.ty {
            VarType::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Str(raw.to_string())),
            VarType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Str(raw.to_string())),
            VarType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Value::Bool(true),
                "0" | "false" => Value::Bool(false),
                _ => Value::Str(raw.to_string()),
            },
            VarType::String => Value::Str(raw.to_string()),
        };
    }
}
