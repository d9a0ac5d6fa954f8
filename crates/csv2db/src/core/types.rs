//! Semantic column types shared by every dialect.

use std::fmt;

/// The abstract value kind of a column, independent of any SQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticType {
    Int64,
    Int32,
    Int16,
    Int8,
    Float64,
    Float32,
    Boolean,
    Text,
}

impl SemanticType {
    /// All semantic types, in declaration order.
    pub const ALL: [SemanticType; 8] = [
        SemanticType::Int64,
        SemanticType::Int32,
        SemanticType::Int16,
        SemanticType::Int8,
        SemanticType::Float64,
        SemanticType::Float32,
        SemanticType::Boolean,
        SemanticType::Text,
    ];

    /// Stable lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SemanticType::Int64 => "int64",
            SemanticType::Int32 => "int32",
            SemanticType::Int16 => "int16",
            SemanticType::Int8 => "int8",
            SemanticType::Float64 => "float64",
            SemanticType::Float32 => "float32",
            SemanticType::Boolean => "bool",
            SemanticType::Text => "text",
        }
    }

    /// Bit width for the numeric types.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            SemanticType::Int64 | SemanticType::Float64 => Some(64),
            SemanticType::Int32 | SemanticType::Float32 => Some(32),
            SemanticType::Int16 => Some(16),
            SemanticType::Int8 => Some(8),
            SemanticType::Boolean | SemanticType::Text => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SemanticType::Text)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
