//! Identifier validation, quoting and table identities.
//!
//! SQL identifiers (table names, column names, schema names) cannot be passed as
//! parameters in prepared statements, so every name that ends up in generated
//! SQL text goes through [`validate_identifier`] and a dialect-specific quoting
//! function first. Column names come straight from the CSV header, which makes
//! this the only barrier between user-supplied text and the statement.

use crate::error::{LoadError, Result};
use std::fmt;

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LoadError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(LoadError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(LoadError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Split a `schema.table` reference on its first dot.
///
/// A reference without a dot has no schema part.
pub fn split_table_ref(reference: &str) -> (Option<&str>, &str) {
    match reference.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, reference),
    }
}

/// A schema-qualified table reference.
///
/// Holds the raw names for catalog queries and the quoted names for generated
/// SQL. Build it through a dialect so the quoting matches the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity {
    schema: String,
    table: String,
    quoted_schema: String,
    quoted_table: String,
}

impl TableIdentity {
    /// Build an identity with the given quoting function.
    pub fn new(schema: &str, table: &str, quote: impl Fn(&str) -> Result<String>) -> Result<Self> {
        Ok(Self {
            quoted_schema: quote(schema)?,
            quoted_table: quote(table)?,
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `schema.table` with dialect quoting, ready for SQL text.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.quoted_schema, self.quoted_table)
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
