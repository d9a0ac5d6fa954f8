//! Column and schema metadata, and reconciliation of an input schema against
//! a destination table.
//!
//! A [`Schema`] is an insertion-ordered, name-keyed list of
//! [`ColumnDefinition`]s. It is built once from a CSV header (or a column
//! count) or loaded once from the destination catalog, and is read-only after
//! that. Reconciling the two produces an [`InsertSchema`], the only structure
//! the writers consult when turning raw text rows into statement parameters.

use super::convert::ValueConverter;
use super::types::SemanticType;
use crate::error::{LoadError, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Type, nullability and ordinal position of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub semantic_type: SemanticType,
    pub nullable: bool,
    /// Zero-based ordinal position.
    pub position: usize,
    /// Catalog type name when loaded from a database (e.g. `uuid`).
    pub native_type: Option<String>,
}

impl ColumnDefinition {
    pub fn new(semantic_type: SemanticType, nullable: bool, position: usize) -> Self {
        Self {
            semantic_type,
            nullable,
            position,
            native_type: None,
        }
    }

    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }
}

/// Ordered mapping from column name to definition. Names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<(String, ColumnDefinition)>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Duplicate names are a configuration error.
    pub fn push(&mut self, name: impl Into<String>, definition: ColumnDefinition) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(LoadError::Config(format!("Duplicate column name {:?}", name)));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.columns.push((name, definition));
        Ok(())
    }

    /// Schema of a CSV header row: every column text, not null, positioned by index.
    pub fn from_header<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut schema = Schema::new();
        for (position, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(LoadError::Config(format!(
                    "Header column {} has an empty name",
                    position
                )));
            }
            schema.push(name, ColumnDefinition::new(SemanticType::Text, false, position))?;
        }
        Ok(schema)
    }

    /// Schema for headerless input: columns `col0..col{n-1}`, text, not null.
    pub fn with_column_count(count: usize) -> Self {
        let mut schema = Schema::new();
        for position in 0..count {
            schema.index.insert(format!("col{}", position), position);
            schema.columns.push((
                format!("col{}", position),
                ColumnDefinition::new(SemanticType::Text, false, position),
            ));
        }
        schema
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDefinition> {
        self.index.get(name).map(|&i| &self.columns[i].1)
    }

    /// The column whose ordinal position equals `position`.
    pub fn get_by_position(&self, position: usize) -> Option<(&str, &ColumnDefinition)> {
        self.columns
            .iter()
            .find(|(_, def)| def.position == position)
            .map(|(name, def)| (name.as_str(), def))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.columns.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Bind a converter to every column unchanged.
    ///
    /// Used when the destination table was just created from this schema.
    pub fn to_insert_schema(&self) -> InsertSchema {
        let mut insert = InsertSchema::default();
        for (name, def) in &self.columns {
            insert.push_unchecked(InsertColumnDefinition::new(name, def.clone(), def.position));
        }
        insert
    }

    /// ASCII table of the columns, for debug logging.
    pub fn render(&self) -> impl fmt::Display {
        render_table(self.iter().map(|(name, def)| (name, def, def.position)))
    }
}

/// A resolved column: destination type and nullability, input position and
/// the converter derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertColumnDefinition {
    pub name: String,
    pub definition: ColumnDefinition,
    pub converter: ValueConverter,
}

impl InsertColumnDefinition {
    /// Take type, nullability and native type from `destination` and the
    /// ordinal position from the input side.
    pub fn new(name: &str, destination: ColumnDefinition, input_position: usize) -> Self {
        let converter = ValueConverter::for_column(destination.semantic_type, destination.nullable);
        Self {
            name: name.to_string(),
            definition: ColumnDefinition {
                position: input_position,
                ..destination
            },
            converter,
        }
    }

    /// Position of this column's cell in a raw input row.
    pub fn position(&self) -> usize {
        self.definition.position
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.definition.semantic_type
    }
}

/// Reconciled, converter-bound schema. Never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertSchema {
    columns: Vec<InsertColumnDefinition>,
    index: HashMap<String, usize>,
}

impl InsertSchema {
    // Callers guarantee distinct names: destination names are unique and each
    // destination column is matched at most once.
    fn push_unchecked(&mut self, column: InsertColumnDefinition) {
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
    }

    pub fn ordered_columns(&self) -> &[InsertColumnDefinition] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&InsertColumnDefinition> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Highest input position any column reads, if there are columns.
    pub fn max_position(&self) -> Option<usize> {
        self.columns.iter().map(|c| c.position()).max()
    }

    pub fn render(&self) -> impl fmt::Display {
        render_table(
            self.columns
                .iter()
                .map(|c| (c.name.as_str(), &c.definition, c.position())),
        )
    }
}

/// Outcome of a reconciliation, including what was left out.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub insert_schema: InsertSchema,
    /// Input columns with no destination match; their cells are not loaded.
    pub dropped_input: Vec<String>,
    /// Destination columns no input column maps to.
    pub unfilled_destination: Vec<String>,
}

/// Match input columns to destination columns by name.
pub fn reconcile_by_name(input: &Schema, destination: &Schema) -> Reconciliation {
    reconcile(input, destination, |name, _| {
        destination.get(name).map(|def| (name.to_string(), def.clone()))
    })
}

/// Match input columns to destination columns by ordinal position.
pub fn reconcile_by_position(input: &Schema, destination: &Schema) -> Reconciliation {
    reconcile(input, destination, |_, def| {
        destination
            .get_by_position(def.position)
            .map(|(name, dest)| (name.to_string(), dest.clone()))
    })
}

fn reconcile<F>(input: &Schema, destination: &Schema, resolve: F) -> Reconciliation
where
    F: Fn(&str, &ColumnDefinition) -> Option<(String, ColumnDefinition)>,
{
    let mut insert_schema = InsertSchema::default();
    let mut dropped_input = Vec::new();

    for (name, def) in input.iter() {
        match resolve(name, def) {
            Some((dest_name, dest_def)) => {
                insert_schema.push_unchecked(InsertColumnDefinition::new(
                    &dest_name,
                    dest_def,
                    def.position,
                ));
            }
            None => {
                warn!(
                    "Input column {:?} (position {}) has no match in the destination table, skipping it",
                    name, def.position
                );
                dropped_input.push(name.to_string());
            }
        }
    }

    let unfilled_destination: Vec<String> = destination
        .names()
        .filter(|name| insert_schema.get(name).is_none())
        .map(str::to_string)
        .collect();
    for name in &unfilled_destination {
        warn!("Destination column {:?} receives no input data", name);
    }

    Reconciliation {
        insert_schema,
        dropped_input,
        unfilled_destination,
    }
}

fn render_table<'a>(
    columns: impl Iterator<Item = (&'a str, &'a ColumnDefinition, usize)>,
) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset("||--+-++|    ++++++");
    table.set_header(vec!["#", "column", "type", "nullable", "native"]);
    for (name, def, position) in columns {
        table.add_row(vec![
            position.to_string(),
            name.to_string(),
            def.semantic_type.to_string(),
            def.nullable.to_string(),
            def.native_type.clone().unwrap_or_default(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;

    fn schema(cols: &[(&str, SemanticType, bool)]) -> Schema {
        let mut s = Schema::new();
        for (i, (name, ty, nullable)) in cols.iter().enumerate() {
            s.push(*name, ColumnDefinition::new(*ty, *nullable, i)).unwrap();
        }
        s
    }

    #[test]
    fn test_from_header() {
        let s = Schema::from_header(&["id", "name"]).unwrap();
        assert_eq!(s.len(), 2);
        let name = s.get("name").unwrap();
        assert_eq!(name.semantic_type, SemanticType::Text);
        assert!(!name.nullable);
        assert_eq!(name.position, 1);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_from_header_rejects_duplicates_and_empty() {
        let dup = Schema::from_header(&["a", "b", "a"]).unwrap_err();
        assert!(dup.to_string().contains("Duplicate column name \"a\""));
        assert!(Schema::from_header(&["a", ""]).is_err());
    }

    #[test]
    fn test_with_column_count() {
        let s = Schema::with_column_count(3);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["col0", "col1", "col2"]);
        assert_eq!(s.get_by_position(2).unwrap().0, "col2");
    }

    #[test]
    fn test_reconcile_by_name_drops_unmatched() {
        let input = schema(&[("a", SemanticType::Int32, false), ("b", SemanticType::Text, false)]);
        let dest = schema(&[("a", SemanticType::Int64, true), ("c", SemanticType::Text, false)]);

        let rec = reconcile_by_name(&input, &dest);
        let insert = &rec.insert_schema;
        assert_eq!(insert.len(), 1);
        let a = insert.get("a").unwrap();
        assert_eq!(a.semantic_type(), SemanticType::Int64);
        assert!(a.definition.nullable);
        assert!(a.converter.is_nullable());
        assert_eq!(rec.dropped_input, vec!["b".to_string()]);
        assert_eq!(rec.unfilled_destination, vec!["c".to_string()]);
    }

    #[test]
    fn test_reconcile_by_name_keeps_input_position() {
        let input = Schema::from_header(&["score", "id"]).unwrap();
        let dest = schema(&[("id", SemanticType::Int64, false), ("score", SemanticType::Float64, true)]);

        let insert = reconcile_by_name(&input, &dest).insert_schema;
        let names: Vec<_> = insert.names().collect();
        assert_eq!(names, vec!["score", "id"]);
        assert_eq!(insert.get("score").unwrap().position(), 0);
        assert_eq!(insert.get("id").unwrap().position(), 1);
        assert_eq!(insert.get("id").unwrap().converter.convert("7"), Ok(SqlValue::I64(7)));
    }

    #[test]
    fn test_reconcile_by_position_ignores_names() {
        let input = Schema::with_column_count(2);
        let dest = schema(&[
            ("x", SemanticType::Int64, false),
            ("y", SemanticType::Boolean, false),
            ("z", SemanticType::Text, true),
        ]);

        let rec = reconcile_by_position(&input, &dest);
        let insert = &rec.insert_schema;
        assert_eq!(insert.names().collect::<Vec<_>>(), vec!["x", "y"]);
        let y = insert.get("y").unwrap();
        assert_eq!(y.position(), 1);
        assert_eq!(y.semantic_type(), SemanticType::Boolean);
        assert!(rec.dropped_input.is_empty());
        assert_eq!(rec.unfilled_destination, vec!["z".to_string()]);
    }

    #[test]
    fn test_reconcile_by_position_drops_overflow_columns() {
        let input = Schema::with_column_count(3);
        let dest = schema(&[("x", SemanticType::Text, false)]);
        let rec = reconcile_by_position(&input, &dest);
        assert_eq!(rec.insert_schema.len(), 1);
        assert_eq!(rec.dropped_input, vec!["col1".to_string(), "col2".to_string()]);
    }

    #[test]
    fn test_reconcile_by_position_uses_catalog_positions() {
        // Destination with a gap where an unsupported column was skipped.
        let mut dest = Schema::new();
        dest.push("a", ColumnDefinition::new(SemanticType::Text, false, 0)).unwrap();
        dest.push("c", ColumnDefinition::new(SemanticType::Int32, false, 2)).unwrap();

        let rec = reconcile_by_position(&Schema::with_column_count(3), &dest);
        assert_eq!(rec.insert_schema.names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(rec.insert_schema.get("c").unwrap().position(), 2);
        assert_eq!(rec.dropped_input, vec!["col1".to_string()]);
    }

    #[test]
    fn test_to_insert_schema_is_identity() {
        let s = Schema::from_header(&["id", "name"]).unwrap();
        let insert = s.to_insert_schema();
        assert_eq!(insert.len(), 2);
        assert_eq!(insert.max_position(), Some(1));
        assert!(!insert.get("id").unwrap().converter.is_nullable());
    }

    #[test]
    fn test_render_lists_columns() {
        let s = schema(&[("id", SemanticType::Int64, false)]);
        let out = s.render().to_string();
        assert!(out.contains("id"));
        assert!(out.contains("int64"));
    }
}
