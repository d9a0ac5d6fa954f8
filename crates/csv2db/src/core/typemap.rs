//! Bidirectional mapping between semantic types and a dialect's SQL types.
//!
//! Each dialect builds its own [`TypeMapping`] once, at construction, and
//! never changes it. There is no process-wide registry.

use super::types::SemanticType;
use crate::error::{LoadError, Result};
use std::collections::HashMap;

/// Immutable type table for one dialect.
#[derive(Debug, Clone, Default)]
pub struct TypeMapping {
    dialect: &'static str,
    to_sql: HashMap<SemanticType, String>,
    to_semantic: HashMap<String, SemanticType>,
}

impl TypeMapping {
    pub fn builder(dialect: &'static str) -> TypeMappingBuilder {
        TypeMappingBuilder {
            mapping: TypeMapping {
                dialect,
                ..Default::default()
            },
        }
    }

    /// SQL type used when creating a column of `ty`.
    pub fn sql_type(&self, ty: SemanticType) -> Result<&str> {
        self.to_sql.get(&ty).map(String::as_str).ok_or_else(|| {
            LoadError::Config(format!(
                "No {} column type is registered for semantic type {}",
                self.dialect, ty
            ))
        })
    }

    /// Semantic type of a catalog type name, matched case-insensitively.
    pub fn semantic_type(&self, sql_type: &str) -> Option<SemanticType> {
        self.to_semantic
            .get(sql_type.trim().to_ascii_lowercase().as_str())
            .copied()
    }
}

pub struct TypeMappingBuilder {
    mapping: TypeMapping,
}

impl TypeMappingBuilder {
    /// Register `primary` as the SQL type for `ty`; `aliases` map back to `ty`
    /// when read from a catalog.
    pub fn register(mut self, ty: SemanticType, primary: &str, aliases: &[&str]) -> Self {
        self.mapping.to_sql.insert(ty, primary.to_string());
        for name in std::iter::once(&primary).chain(aliases) {
            self.mapping
                .to_semantic
                .insert(name.to_ascii_lowercase(), ty);
        }
        self
    }

    /// Catalog names that read back as `ty` without being used for creation.
    pub fn alias(mut self, ty: SemanticType, aliases: &[&str]) -> Self {
        for name in aliases {
            self.mapping
                .to_semantic
                .insert(name.to_ascii_lowercase(), ty);
        }
        self
    }

    pub fn build(self) -> TypeMapping {
        self.mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TypeMapping {
        TypeMapping::builder("test")
            .register(SemanticType::Int64, "bigint", &["int8"])
            .register(SemanticType::Text, "text", &["varchar"])
            .alias(SemanticType::Text, &["uuid"])
            .build()
    }

    #[test]
    fn test_lookup_both_ways() {
        let m = sample();
        assert_eq!(m.sql_type(SemanticType::Int64).unwrap(), "bigint");
        assert_eq!(m.semantic_type("INT8"), Some(SemanticType::Int64));
        assert_eq!(m.semantic_type("uuid"), Some(SemanticType::Text));
        assert_eq!(m.semantic_type("geometry"), None);
    }

    #[test]
    fn test_unregistered_type_is_config_error() {
        let err = sample().sql_type(SemanticType::Int8).unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
        assert!(err.to_string().contains("int8"));
    }
}
