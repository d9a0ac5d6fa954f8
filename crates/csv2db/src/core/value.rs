//! Typed scalar values produced by the converters and bound as statement parameters.

use super::types::SemanticType;
use std::fmt;

/// One converted cell.
///
/// NULL keeps the semantic type of its column so drivers that need a typed
/// null on the wire can produce one.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with the column's semantic type.
    Null(SemanticType),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// The semantic type this value carries.
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            SqlValue::Null(ty) => *ty,
            SqlValue::Bool(_) => SemanticType::Boolean,
            SqlValue::I8(_) => SemanticType::Int8,
            SqlValue::I16(_) => SemanticType::Int16,
            SqlValue::I32(_) => SemanticType::Int32,
            SqlValue::I64(_) => SemanticType::Int64,
            SqlValue::F32(_) => SemanticType::Float32,
            SqlValue::F64(_) => SemanticType::Float64,
            SqlValue::Text(_) => SemanticType::Text,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null(_) => f.write_str("NULL"),
            SqlValue::Bool(v) => write!(f, "{}", v),
            SqlValue::I8(v) => write!(f, "{}", v),
            SqlValue::I16(v) => write!(f, "{}", v),
            SqlValue::I32(v) => write!(f, "{}", v),
            SqlValue::I64(v) => write!(f, "{}", v),
            SqlValue::F32(v) => write!(f, "{}", v),
            SqlValue::F64(v) => write!(f, "{}", v),
            SqlValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}
