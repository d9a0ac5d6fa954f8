//! MySQL SQL dialect (Strategy pattern).

use std::sync::Arc;

use crate::core::identifier::quote_mysql;
use crate::core::schema::InsertColumnDefinition;
use crate::core::traits::Dialect;
use crate::core::typemap::TypeMapping;
use crate::core::types::SemanticType;
use crate::error::Result;

/// MySQL prepared statement placeholder limit.
pub const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

/// MySQL dialect implementation.
#[derive(Debug, Clone)]
pub struct MysqlDialect {
    types: Arc<TypeMapping>,
}

impl MysqlDialect {
    pub fn new() -> Self {
        Self {
            types: Arc::new(Self::type_mapping_table()),
        }
    }

    /// Semantic type table for MySQL, keyed on `information_schema.COLUMNS.DATA_TYPE`.
    pub fn type_mapping_table() -> TypeMapping {
        TypeMapping::builder("mysql")
            .register(SemanticType::Int64, "bigint", &[])
            .register(SemanticType::Int32, "int", &["integer", "mediumint"])
            .register(SemanticType::Int16, "smallint", &[])
            .register(SemanticType::Int8, "tinyint", &[])
            .register(SemanticType::Float64, "double", &["double precision"])
            .register(SemanticType::Float32, "float", &["real"])
            .register(SemanticType::Boolean, "boolean", &["bool"])
            .register(
                SemanticType::Text,
                "text",
                &[
                    "varchar",
                    "char",
                    "tinytext",
                    "mediumtext",
                    "longtext",
                    "json",
                    "enum",
                    "set",
                    "decimal",
                    "date",
                    "time",
                    "datetime",
                    "timestamp",
                    "year",
                ],
            )
            .build()
    }
}

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn type_mapping(&self) -> &TypeMapping {
        &self.types
    }

    fn placeholder(&self, _index: usize, _column: &InsertColumnDefinition) -> Result<String> {
        Ok("?".to_string())
    }

    fn max_bind_params(&self) -> usize {
        MYSQL_MAX_PLACEHOLDERS
    }

    fn create_table_suffix(&self) -> &str {
        " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }
}
