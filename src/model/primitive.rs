//! Primitive scalar values carried by `PrimitiveNode`.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Text prefix that marks a primitive literal (e.g. `'true`, `'42`).
pub const PRIMITIVE_MARKER: char = '\'';

/// A parsed scalar.
///
/// Equality and hashing are by value. Floats compare by bit pattern so that
/// `Primitive` can live in hash sets; `Int(1)` and `Float(1.0)` are distinct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Primitive {
    /// Parse the text following the primitive marker.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "true" | "TRUE" | "True" => return Some(Primitive::Bool(true)),
            "false" | "FALSE" | "False" => return Some(Primitive::Bool(false)),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(Primitive::Int(i));
        }
        match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Primitive::Float(f)),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Bool(_) => "BOOLEAN",
            Primitive::Int(_) => "INTEGER",
            Primitive::Float(_) => "FLOAT",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Primitive::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Primitive::Float(f) => Some(*f),
            Primitive::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Primitive::Bool(a), Primitive::Bool(b)) => a == b,
            (Primitive::Int(a), Primitive::Int(b)) => a == b,
            (Primitive::Float(a), Primitive::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Primitive {}

impl Hash for Primitive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Primitive::Bool(b) => b.hash(state),
            Primitive::Int(i) => i.hash(state),
            Primitive::Float(f) => f.to_bits().hash(state),
        }
    }
}

impl From<bool> for Primitive { fn from(v: bool) -> Self { Primitive::Bool(v) } }
impl From<i32> for Primitive { fn from(v: i32) -> Self { Primitive::Int(v as i64) } }
impl From<i64> for Primitive { fn from(v: i64) -> Self { Primitive::Int(v) } }
impl From<f64> for Primitive { fn from(v: f64) -> Self { Primitive::Float(v) } }

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(b) => write!(f, "{b}"),
            Primitive::Int(i) => write!(f, "{i}"),
            Primitive::Float(v) => write!(f, "{v:?}"),
        }
    }
}
