//! Error types for the loader library.

use crate::core::types::SemanticType;
use thiserror::Error;

/// A text cell that does not parse as its column's semantic type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert {value:?} to {target}: {reason}")]
pub struct ConversionError {
    /// The literal text that failed to parse.
    pub value: String,
    /// The type the converter was producing.
    pub target: SemanticType,
    /// Parser message.
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: &str, target: SemanticType, reason: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            target,
            reason: reason.into(),
        }
    }
}

/// Main error type for load operations.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration error (invalid flags, bad preset file, unsupported type, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cell failed conversion; the whole load is aborted
    #[error("Conversion failed in record {record}, column {column:?}: {source}")]
    Conversion {
        record: u64,
        column: String,
        #[source]
        source: ConversionError,
    },

    /// PostgreSQL connection or statement error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL connection or statement error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Statement-level failure not raised by a driver
    #[error("Statement error: {0}")]
    Statement(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Catalog lookup returned something unusable
    #[error("Schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    /// Writer used after close or after a failure
    #[error("Writer unavailable: {0}")]
    WriterClosed(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed delimited input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        LoadError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Schema error
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Wrap a conversion failure with the record number and column it came from.
    pub fn conversion(record: u64, column: impl Into<String>, source: ConversionError) -> Self {
        LoadError::Conversion {
            record,
            column: column.into(),
            source,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            LoadError::Config(_) | LoadError::Yaml(_) | LoadError::Json(_) => 1,
            LoadError::Conversion { .. } => 3,
            LoadError::Postgres(_)
            | LoadError::Statement(_)
            | LoadError::Pool { .. }
            | LoadError::Schema { .. } => 4,
            #[cfg(feature = "mysql")]
            LoadError::Mysql(_) => 4,
            LoadError::WriterClosed(_) => 5,
            LoadError::Io(_) => 7,
            LoadError::Csv(_) => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for load operations.
pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_message() {
        let err = ConversionError::new("abc", SemanticType::Int32, "invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "cannot convert \"abc\" to int32: invalid digit found in string"
        );
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = LoadError::conversion(
            7,
            "score",
            ConversionError::new("x", SemanticType::Float64, "invalid float literal"),
        );
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Conversion failed in record 7"));
        assert!(detailed.contains("Caused by:\n  1: cannot convert \"x\" to float64"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(LoadError::Config("x".into()).exit_code(), 1);
        assert_eq!(LoadError::Statement("x".into()).exit_code(), 4);
        assert_eq!(LoadError::WriterClosed("x".into()).exit_code(), 5);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(LoadError::from(io).exit_code(), 7);
    }
}
