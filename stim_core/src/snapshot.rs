//! Telemetry snapshots built from statically declared field tables.
//!
//! Every stimulus type declares a `&'static [Field<Self>]` listing the
//! attributes it logs, in order. `collect` walks that table; nothing is
//! discovered at runtime.

use std::fmt;

/// One logged attribute value.
///
/// Floats compare by bit pattern, so a NaN reading equals itself and two
/// reads of an unchanged stimulus always compare equal.
#[derive(Debug, Clone)]
pub enum Value {
    Float(f64),
    Bool(bool),
    Int(i64),
    Text(String),
    /// A nullable attribute that currently has no value.
    Missing,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Missing, Value::Missing) => true,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Value::Missing, Value::Float)
    }
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Missing => f.write_str("null"),
        }
    }
}

/// `(name, accessor)` pair of a field table.
pub struct Field<T: ?Sized> {
    pub name: &'static str,
    pub get: fn(&T) -> Value,
}

impl<T: ?Sized> Field<T> {
    pub const fn new(name: &'static str, get: fn(&T) -> Value) -> Self {
        Self { name, get }
    }
}

/// Ordered key/value telemetry record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSnapshot(Vec<(&'static str, Value)>);

impl StateSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Sub-record restricted to `keys`, in the order given.
    pub fn select(&self, keys: &[&'static str]) -> StateSnapshot {
        StateSnapshot(
            keys.iter()
                .filter_map(|k| self.get(k).map(|v| (*k, v.clone())))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append the fields of a nested snapshot after the current ones.
    pub fn extend(&mut self, other: StateSnapshot) {
        self.0.extend(other.0);
    }
}

/// Build a snapshot of `subject` from its field table.
pub fn collect<T: ?Sized>(subject: &T, fields: &[Field<T>]) -> StateSnapshot {
    StateSnapshot(
        fields
            .iter()
            .map(|f| (f.name, (f.get)(subject)))
            .collect(),
    )
}
