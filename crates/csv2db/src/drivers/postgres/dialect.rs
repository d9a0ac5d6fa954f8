//! PostgreSQL SQL dialect (Strategy pattern).

use std::sync::Arc;

use crate::core::identifier::quote_pg;
use crate::core::schema::InsertColumnDefinition;
use crate::core::traits::Dialect;
use crate::core::typemap::TypeMapping;
use crate::core::types::SemanticType;
use crate::error::Result;

/// Largest parameter index the PostgreSQL wire protocol allows.
pub const PG_MAX_BIND_PARAMS: usize = 65_535;

/// Catalog names that accept a text parameter without an explicit cast.
const TEXT_LIKE: &[&str] = &["text", "varchar", "bpchar", "name", "char", "citext"];

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    types: Arc<TypeMapping>,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self {
            types: Arc::new(Self::type_mapping_table()),
        }
    }

    /// Semantic type table for PostgreSQL. There is no one-byte integer.
    pub fn type_mapping_table() -> TypeMapping {
        TypeMapping::builder("postgres")
            .register(SemanticType::Int64, "bigint", &["int8", "bigserial", "serial8"])
            .register(SemanticType::Int32, "integer", &["int", "int4", "serial", "serial4"])
            .register(SemanticType::Int16, "smallint", &["int2", "smallserial", "serial2"])
            .register(SemanticType::Float64, "double precision", &["float8"])
            .register(SemanticType::Float32, "real", &["float4"])
            .register(SemanticType::Boolean, "boolean", &["bool"])
            .register(
                SemanticType::Text,
                "text",
                &[
                    "varchar",
                    "character varying",
                    "char",
                    "character",
                    "bpchar",
                    "name",
                    "citext",
                ],
            )
            // Loaded as text and cast server-side through the native type.
            .alias(
                SemanticType::Text,
                &[
                    "numeric",
                    "decimal",
                    "money",
                    "json",
                    "jsonb",
                    "uuid",
                    "xml",
                    "date",
                    "time",
                    "timetz",
                    "timestamp",
                    "timestamptz",
                    "interval",
                    "inet",
                    "cidr",
                    "macaddr",
                ],
            )
            .build()
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn type_mapping(&self) -> &TypeMapping {
        &self.types
    }

    /// `$n::<type>`, plus a cast to the column's native type when a text value
    /// targets a non-text column such as `uuid` or `date`.
    fn placeholder(&self, index: usize, column: &InsertColumnDefinition) -> Result<String> {
        let ty = column.semantic_type();
        let mut placeholder = format!("${}::{}", index, self.types.sql_type(ty)?);
        if let Some(native) = column.definition.native_type.as_deref() {
            if ty.is_text() && !TEXT_LIKE.contains(&native) {
                placeholder.push_str("::");
                placeholder.push_str(&quote_pg(native)?);
            }
        }
        Ok(placeholder)
    }

    fn max_bind_params(&self) -> usize {
        PG_MAX_BIND_PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDefinition, Schema};

    fn insert_schema() -> crate::core::InsertSchema {
        let mut s = Schema::new();
        s.push("id", ColumnDefinition::new(SemanticType::Int64, false, 0)).unwrap();
        s.push("name", ColumnDefinition::new(SemanticType::Text, true, 1)).unwrap();
        s.to_insert_schema()
    }

    #[test]
    fn test_build_insert_numbers_placeholders() {
        let d = PostgresDialect::new();
        let table = d.table_identity("public", "people").unwrap();
        let sql = d.build_insert(&table, &insert_schema(), 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"people\" (\"id\", \"name\") VALUES \
             ($1::bigint, $2::text), ($3::bigint, $4::text)"
        );
    }

    #[test]
    fn test_build_insert_is_deterministic() {
        let d = PostgresDialect::new();
        let table = d.table_identity("public", "people").unwrap();
        let schema = insert_schema();
        assert_eq!(
            d.build_insert(&table, &schema, 3).unwrap(),
            d.build_insert(&table, &schema, 3).unwrap()
        );
    }

    #[test]
    fn test_native_cast_for_non_text_columns() {
        let d = PostgresDialect::new();
        let mut s = Schema::new();
        s.push(
            "id",
            ColumnDefinition::new(SemanticType::Text, false, 0).with_native_type("uuid"),
        )
        .unwrap();
        s.push(
            "label",
            ColumnDefinition::new(SemanticType::Text, false, 1).with_native_type("varchar"),
        )
        .unwrap();
        let schema = s.to_insert_schema();
        let cols = schema.ordered_columns();
        assert_eq!(d.placeholder(1, &cols[0]).unwrap(), "$1::text::\"uuid\"");
        assert_eq!(d.placeholder(2, &cols[1]).unwrap(), "$2::text");
    }

    #[test]
    fn test_int8_has_no_postgres_type() {
        let d = PostgresDialect::new();
        assert!(d.type_mapping().sql_type(SemanticType::Int8).is_err());
        assert_eq!(d.type_mapping().semantic_type("int4"), Some(SemanticType::Int32));
        assert_eq!(d.type_mapping().semantic_type("timestamptz"), Some(SemanticType::Text));
    }

    #[test]
    fn test_build_create_table() {
        let d = PostgresDialect::new();
        let table = d.table_identity("public", "scores").unwrap();
        let mut s = Schema::new();
        s.push("id", ColumnDefinition::new(SemanticType::Int64, false, 0)).unwrap();
        s.push("score", ColumnDefinition::new(SemanticType::Float64, true, 1)).unwrap();
        assert_eq!(
            d.build_create_table(&table, &s).unwrap(),
            "CREATE TABLE \"public\".\"scores\" (\n    \"id\" bigint NOT NULL,\n    \"score\" double precision\n)"
        );
    }

    #[test]
    fn test_qualify_matches_identity() {
        let d = PostgresDialect::new();
        let table = d.table_identity("sales", "orders").unwrap();
        assert_eq!(d.qualify("sales", "orders").unwrap(), table.qualified());
        assert!(d.qualify("", "orders").is_err());
    }

    #[test]
    fn test_build_create_table_rejects_empty_schema() {
        let d = PostgresDialect::new();
        let table = d.table_identity("public", "empty").unwrap();
        assert!(d.build_create_table(&table, &Schema::new()).is_err());
    }

    #[test]
    fn test_build_insert_rejects_oversized_statement() {
        let d = PostgresDialect::new();
        let table = d.table_identity("public", "people").unwrap();
        assert!(d.build_insert(&table, &insert_schema(), 40_000).is_err());
        assert!(d.build_insert(&table, &insert_schema(), 0).is_err());
    }
}
