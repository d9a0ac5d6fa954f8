//! Core traits for loading rows into a destination database.
//!
//! - [`Dialect`]: SQL text strategy for one database engine
//! - [`TargetDriver`]: catalog and DDL operations plus writer creation
//! - [`InsertSession`]: one connection's transaction and prepared statement
//! - [`RowWriter`]: sink for raw text rows
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` renders engine-specific SQL for the generic writers
//! - **Abstract Factory**: `TargetDriver::create_writer` picks the writer family
//! - **Template Method**: the provided `Dialect` builders are written once in
//!   terms of `quote_ident`, `placeholder` and `type_mapping`

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::identifier::TableIdentity;
use super::schema::{InsertColumnDefinition, InsertSchema, Schema};
use super::typemap::TypeMapping;
use super::value::SqlValue;
use crate::error::{LoadError, Result};

/// SQL syntax strategy.
pub trait Dialect: Send + Sync {
    /// Dialect name (e.g. "postgres", "mysql").
    fn name(&self) -> &str;

    /// Validate and quote an identifier.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Type table this dialect was built with.
    fn type_mapping(&self) -> &TypeMapping;

    /// Placeholder for the 1-based parameter `index`, bound to `column`.
    fn placeholder(&self, index: usize, column: &InsertColumnDefinition) -> Result<String>;

    /// Maximum number of bound parameters in one statement.
    fn max_bind_params(&self) -> usize;

    /// Trailing clause for CREATE TABLE (engine, charset, ...).
    fn create_table_suffix(&self) -> &str {
        ""
    }

    /// Quoted `schema.table` reference.
    fn qualify(&self, schema: &str, table: &str) -> Result<String> {
        Ok(format!("{}.{}", self.quote_ident(schema)?, self.quote_ident(table)?))
    }

    fn table_identity(&self, schema: &str, table: &str) -> Result<TableIdentity> {
        TableIdentity::new(schema, table, |name| self.quote_ident(name))
    }

    /// Quoted, comma-separated column list of an insert schema.
    fn column_list(&self, schema: &InsertSchema) -> Result<String> {
        let quoted = schema
            .names()
            .map(|name| self.quote_ident(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }

    /// Multi-row parameterized INSERT for exactly `rows` tuples.
    ///
    /// The output depends only on the arguments, so a statement prepared from
    /// it can be reused for every flush of the same size.
    fn build_insert(&self, table: &TableIdentity, schema: &InsertSchema, rows: usize) -> Result<String> {
        if schema.is_empty() {
            return Err(LoadError::Config(format!(
                "Cannot build INSERT for {}: no columns",
                table
            )));
        }
        if rows == 0 {
            return Err(LoadError::Statement(format!(
                "Cannot build INSERT for {} with zero rows",
                table
            )));
        }
        let width = schema.len();
        if rows * width > self.max_bind_params() {
            return Err(LoadError::Config(format!(
                "INSERT of {} rows x {} columns exceeds the {} parameter limit of {}",
                rows,
                width,
                self.name(),
                self.max_bind_params()
            )));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            table.qualified(),
            self.column_list(schema)?
        );
        for row in 0..rows {
            if row > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (i, column) in schema.ordered_columns().iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&self.placeholder(row * width + i + 1, column)?);
            }
            sql.push(')');
        }
        Ok(sql)
    }

    /// CREATE TABLE from a schema, in schema order.
    fn build_create_table(&self, table: &TableIdentity, schema: &Schema) -> Result<String> {
        if schema.is_empty() {
            return Err(LoadError::Config(format!(
                "Cannot create table {} with zero columns",
                table
            )));
        }
        let mut sql = format!("CREATE TABLE {} (\n", table.qualified());
        for (i, (name, def)) in schema.iter().enumerate() {
            if i > 0 {
                sql.push_str(",\n");
            }
            let _ = write!(
                sql,
                "    {} {}",
                self.quote_ident(name)?,
                self.type_mapping().sql_type(def.semantic_type)?
            );
            if !def.nullable {
                sql.push_str(" NOT NULL");
            }
        }
        sql.push_str("\n)");
        sql.push_str(self.create_table_suffix());
        Ok(sql)
    }

    fn build_drop_table(&self, table: &TableIdentity) -> String {
        format!("DROP TABLE IF EXISTS {}", table.qualified())
    }

    fn build_truncate(&self, table: &TableIdentity) -> String {
        format!("TRUNCATE TABLE {}", table.qualified())
    }

    fn build_delete_all(&self, table: &TableIdentity) -> String {
        format!("DELETE FROM {}", table.qualified())
    }
}

/// How a driver writes rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMethod {
    /// Multi-row INSERT statements in one transaction.
    #[default]
    Batch,
    /// Bulk copy protocol where the engine has one (PostgreSQL COPY).
    Copy,
}

/// Tunables handed to [`TargetDriver::create_writer`].
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Flush once more than this many rows are buffered; derived from the
    /// dialect's bound-parameter limit when unset.
    pub batch_size: Option<usize>,
    pub insert_method: InsertMethod,
}

/// Destination database operations.
///
/// One implementation per engine. The loader depends only on this trait.
#[async_trait]
pub trait TargetDriver: Send + Sync {
    /// Engine name (e.g. "postgres").
    fn name(&self) -> &str;

    /// Resolve a table reference, filling in the default schema.
    fn table_identity(&self, schema: Option<&str>, table: &str) -> Result<TableIdentity>;

    async fn table_exists(&self, table: &TableIdentity) -> Result<bool>;

    /// Column schema in catalog order. Columns of unsupported types are skipped.
    async fn load_schema(&self, table: &TableIdentity) -> Result<Schema>;

    /// Create the table. Fails on a schema with zero columns.
    async fn create_table(&self, table: &TableIdentity, schema: &Schema) -> Result<()>;

    async fn drop_table(&self, table: &TableIdentity) -> Result<()>;

    async fn truncate_table(&self, table: &TableIdentity) -> Result<()>;

    async fn delete_all_rows(&self, table: &TableIdentity) -> Result<()>;

    /// Parameterized INSERT text for `rows` tuples.
    fn render_insert_statement(
        &self,
        table: &TableIdentity,
        schema: &InsertSchema,
        rows: usize,
    ) -> Result<String>;

    /// Writer for this table. May be a bulk-copy writer instead of the
    /// batched one when the engine supports it.
    async fn create_writer(
        &self,
        table: &TableIdentity,
        schema: Arc<InsertSchema>,
        options: &WriterOptions,
    ) -> Result<Box<dyn RowWriter>>;

    /// Close the connection pool.
    async fn close(&self);
}

/// A single connection holding at most one transaction and one prepared
/// statement.
#[async_trait]
pub trait InsertSession: Send {
    async fn begin(&mut self) -> Result<()>;

    /// Prepare `sql`, replacing any previously prepared statement.
    async fn prepare(&mut self, sql: &str) -> Result<()>;

    /// Execute the prepared statement. Returns affected rows.
    async fn execute(&mut self, params: &[SqlValue]) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Sink for raw text rows.
///
/// Not safe for concurrent `add` calls from several producers.
#[async_trait]
pub trait RowWriter: Send {
    async fn add(&mut self, row: Vec<String>) -> Result<()>;

    /// Write everything still buffered and commit.
    async fn close(&mut self) -> Result<()>;

    /// Roll back whatever is uncommitted. Used when the input fails mid-load.
    async fn abort(&mut self) -> Result<()>;
}
