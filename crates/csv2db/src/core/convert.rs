//! Text to typed value converters.
//!
//! There is exactly one parser per [`SemanticType`]. A converter pairs that
//! parser with the column's nullability: a nullable converter maps the empty
//! string to a typed NULL without consulting the parser, so a nullable numeric
//! column cannot tell an empty cell from a missing value.

use super::types::SemanticType;
use super::value::SqlValue;
use crate::error::ConversionError;
use std::fmt;
use std::num::IntErrorKind;

/// A pure parser from cell text to a typed value.
pub type ParseFn = fn(&str) -> Result<SqlValue, ConversionError>;

/// Converter bound to one column.
#[derive(Clone, Copy)]
pub struct ValueConverter {
    target: SemanticType,
    parse: ParseFn,
    nullable: bool,
}

impl ValueConverter {
    /// The non-nullable converter for a semantic type.
    pub fn for_type(target: SemanticType) -> Self {
        let parse: ParseFn = match target {
            SemanticType::Int64 => parse_i64,
            SemanticType::Int32 => parse_i32,
            SemanticType::Int16 => parse_i16,
            SemanticType::Int8 => parse_i8,
            SemanticType::Float64 => parse_f64,
            SemanticType::Float32 => parse_f32,
            SemanticType::Boolean => parse_bool,
            SemanticType::Text => parse_text,
        };
        Self {
            target,
            parse,
            nullable: false,
        }
    }

    /// Converter for a column definition's type and nullability.
    pub fn for_column(target: SemanticType, nullable: bool) -> Self {
        let converter = Self::for_type(target);
        if nullable {
            converter.nullable()
        } else {
            converter
        }
    }

    /// Wrap this converter so that the empty string becomes NULL.
    pub fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub fn target(&self) -> SemanticType {
        self.target
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn convert(&self, raw: &str) -> Result<SqlValue, ConversionError> {
        if self.nullable && raw.is_empty() {
            return Ok(SqlValue::Null(self.target));
        }
        (self.parse)(raw)
    }
}

impl fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverter")
            .field("target", &self.target)
            .field("nullable", &self.nullable)
            .finish()
    }
}

impl PartialEq for ValueConverter {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.nullable == other.nullable
    }
}

fn int_error(raw: &str, target: SemanticType, kind: &IntErrorKind) -> ConversionError {
    let width = target.bit_width().unwrap_or(64);
    let reason = match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            format!("value out of range for {}-bit integer", width)
        }
        IntErrorKind::Empty => "empty string is not an integer".to_string(),
        _ => "invalid digit in base-10 integer".to_string(),
    };
    ConversionError::new(raw, target, reason)
}

fn parse_i64(raw: &str) -> Result<SqlValue, ConversionError> {
    raw.parse::<i64>()
        .map(SqlValue::I64)
        .map_err(|e| int_error(raw, SemanticType::Int64, e.kind()))
}

fn parse_i32(raw: &str) -> Result<SqlValue, ConversionError> {
    raw.parse::<i32>()
        .map(SqlValue::I32)
        .map_err(|e| int_error(raw, SemanticType::Int32, e.kind()))
}

fn parse_i16(raw: &str) -> Result<SqlValue, ConversionError> {
    raw.parse::<i16>()
        .map(SqlValue::I16)
        .map_err(|e| int_error(raw, SemanticType::Int16, e.kind()))
}

fn parse_i8(raw: &str) -> Result<SqlValue, ConversionError> {
    raw.parse::<i8>()
        .map(SqlValue::I8)
        .map_err(|e| int_error(raw, SemanticType::Int8, e.kind()))
}

fn parse_f64(raw: &str) -> Result<SqlValue, ConversionError> {
    raw.parse::<f64>()
        .map(SqlValue::F64)
        .map_err(|e| ConversionError::new(raw, SemanticType::Float64, e.to_string()))
}

fn parse_f32(raw: &str) -> Result<SqlValue, ConversionError> {
    let wide = raw
        .parse::<f64>()
        .map_err(|e| ConversionError::new(raw, SemanticType::Float32, e.to_string()))?;
    let narrow = wide as f32;
    if wide.is_finite() && narrow.is_infinite() {
        return Err(ConversionError::new(
            raw,
            SemanticType::Float32,
            "value out of range for 32-bit float",
        ));
    }
    Ok(SqlValue::F32(narrow))
}

fn parse_bool(raw: &str) -> Result<SqlValue, ConversionError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(SqlValue::Bool(true)),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(SqlValue::Bool(false)),
        _ => Err(ConversionError::new(
            raw,
            SemanticType::Boolean,
            "not a boolean literal",
        )),
    }
}

fn parse_text(raw: &str) -> Result<SqlValue, ConversionError> {
    Ok(SqlValue::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_null_iff_nullable() {
        for ty in SemanticType::ALL {
            let nullable = ValueConverter::for_column(ty, true).convert("");
            assert_eq!(nullable, Ok(SqlValue::Null(ty)), "{}", ty);

            let strict = ValueConverter::for_column(ty, false).convert("");
            if ty == SemanticType::Text {
                assert_eq!(strict, Ok(SqlValue::Text(String::new())));
            } else {
                assert!(strict.is_err(), "{} accepted an empty string", ty);
            }
        }
    }

    #[test]
    fn test_nullable_delegates_non_empty() {
        let conv = ValueConverter::for_type(SemanticType::Int32).nullable();
        assert_eq!(conv.convert("-17"), Ok(SqlValue::I32(-17)));
        assert!(conv.convert("x").is_err());
    }

    #[test]
    fn test_integer_widths() {
        let i8c = ValueConverter::for_type(SemanticType::Int8);
        assert_eq!(i8c.convert("127"), Ok(SqlValue::I8(127)));
        let err = i8c.convert("128").unwrap_err();
        assert_eq!(err.value, "128");
        assert_eq!(err.target, SemanticType::Int8);
        assert!(err.reason.contains("8-bit"));

        let i16c = ValueConverter::for_type(SemanticType::Int16);
        assert!(i16c.convert("-32769").unwrap_err().reason.contains("16-bit"));

        let i64c = ValueConverter::for_type(SemanticType::Int64);
        assert_eq!(i64c.convert("+42"), Ok(SqlValue::I64(42)));
        assert!(i64c.convert("1.5").is_err());
        assert!(i64c.convert(" 1").is_err());
    }

    #[test]
    fn test_floats() {
        let f64c = ValueConverter::for_type(SemanticType::Float64);
        assert_eq!(f64c.convert("3.5"), Ok(SqlValue::F64(3.5)));
        assert_eq!(f64c.convert("1e3"), Ok(SqlValue::F64(1000.0)));
        assert!(f64c.convert("3,5").is_err());

        let f32c = ValueConverter::for_type(SemanticType::Float32);
        assert_eq!(f32c.convert("0.5"), Ok(SqlValue::F32(0.5)));
        assert!(f32c.convert("1e40").unwrap_err().reason.contains("32-bit"));
        assert_eq!(f32c.convert("inf"), Ok(SqlValue::F32(f32::INFINITY)));
    }

    #[test]
    fn test_bool_literals() {
        let conv = ValueConverter::for_type(SemanticType::Boolean);
        for lit in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(conv.convert(lit), Ok(SqlValue::Bool(true)), "{}", lit);
        }
        for lit in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(conv.convert(lit), Ok(SqlValue::Bool(false)), "{}", lit);
        }
        for lit in ["yes", "tRUE", "2", " true"] {
            assert!(conv.convert(lit).is_err(), "{}", lit);
        }
    }

    #[test]
    fn test_text_is_identity() {
        let conv = ValueConverter::for_type(SemanticType::Text);
        assert_eq!(conv.convert(" a,b "), Ok(SqlValue::Text(" a,b ".into())));
    }
}
