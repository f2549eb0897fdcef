//! Field values

use std::fmt;

use appstruct_core::{QName, RecordId};

use crate::appdef::DataKind;

/// Value of one field, tagged by data kind
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// Byte string
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Qualified name
    QName(QName),
    /// Boolean
    Bool(bool),
    /// Record reference
    RecordId(RecordId),
}

impl Value {
    /// Data kind of the value.
    pub fn kind(&self) -> DataKind {
        match self {
            Value::Int32(_) => DataKind::Int32,
            Value::Int64(_) => DataKind::Int64,
            Value::Float32(_) => DataKind::Float32,
            Value::Float64(_) => DataKind::Float64,
            Value::Bytes(_) => DataKind::Bytes,
            Value::String(_) => DataKind::String,
            Value::QName(_) => DataKind::QName,
            Value::Bool(_) => DataKind::Bool,
            Value::RecordId(_) => DataKind::RecordId,
        }
    }

    /// Converts a JSON value (as carried by verified value tokens) to a
    /// value of the given kind.
    ///
    /// Returns `None` if the JSON value does not fit the kind.
    pub fn from_json(kind: DataKind, json: &serde_json::Value) -> Option<Value> {
        use serde_json::Value as J;
        match (kind, json) {
            (DataKind::Int32, J::Number(n)) => {
                n.as_i64().and_then(|v| i32::try_from(v).ok()).map(Value::Int32)
            }
            (DataKind::Int64, J::Number(n)) => n.as_i64().map(Value::Int64),
            (DataKind::Float32, J::Number(n)) => n.as_f64().map(|v| Value::Float32(v as f32)),
            (DataKind::Float64, J::Number(n)) => n.as_f64().map(Value::Float64),
            (DataKind::String, J::String(s)) => Some(Value::String(s.clone())),
            (DataKind::Bytes, J::String(s)) => Some(Value::Bytes(s.as_bytes().to_vec())),
            (DataKind::QName, J::String(s)) => QName::parse(s).ok().map(Value::QName),
            (DataKind::Bool, J::Bool(b)) => Some(Value::Bool(*b)),
            (DataKind::RecordId, J::Number(n)) => n.as_u64().map(|v| Value::RecordId(RecordId(v))),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "{} bytes", v.len()),
            Value::String(v) => write!(f, "{:?}", v),
            Value::QName(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::RecordId(v) => write!(f, "#{}", v),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<QName> for Value {
    fn from(v: QName) -> Self {
        Value::QName(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<RecordId> for Value {
    fn from(v: RecordId) -> Self {
        Value::RecordId(v)
    }
}
