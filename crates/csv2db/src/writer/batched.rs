//! Buffered, transactional multi-row INSERT writer.
//!
//! Rows are converted as they arrive and buffered. Once more than
//! `batch_size` rows are buffered they are flushed with one multi-row INSERT
//! inside a single transaction that stays open until [`RowWriter::close`].
//! The prepared statement is cached by row count: full batches reuse it and
//! only an undersized trailing batch triggers a second prepare.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::identifier::TableIdentity;
use crate::core::schema::InsertSchema;
use crate::core::traits::{Dialect, InsertSession, RowWriter, WriterOptions};
use crate::core::value::SqlValue;
use crate::drivers::DialectImpl;
use crate::error::{ConversionError, LoadError, Result};

/// Lifecycle of a [`BatchedWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// No open transaction, empty buffer.
    Idle,
    /// Rows buffered or a transaction open.
    Accumulating,
    /// An execute is in progress.
    Flushing,
    /// Committed; no more rows accepted.
    Closed,
    /// Rolled back after an error; no more rows accepted.
    Failed,
}

/// Counters reported when the writer closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub rows_written: u64,
    pub flushes: u64,
    pub prepares: u64,
}

/// Rows per flush threshold that keeps every statement inside `param_budget`.
///
/// A flush fires once the buffer holds more than `batch_size` rows, so the
/// largest statement carries `batch_size + 1` rows.
pub fn resolve_batch_size(requested: Option<usize>, columns: usize, param_budget: usize) -> Result<usize> {
    if columns == 0 {
        return Err(LoadError::Config(
            "Cannot size batches for an insert schema with zero columns".to_string(),
        ));
    }
    if columns > param_budget {
        return Err(LoadError::Config(format!(
            "{} columns exceed the budget of {} bound parameters per statement",
            columns, param_budget
        )));
    }

    let max = param_budget / columns - 1;
    match requested {
        Some(size) if size > max => {
            warn!(
                "Batch size {} with {} columns exceeds the parameter budget of {}; using {}",
                size, columns, param_budget, max
            );
            Ok(max)
        }
        Some(size) => Ok(size),
        None => Ok(max),
    }
}

/// Generic batched writer over any [`InsertSession`].
pub struct BatchedWriter<S: InsertSession> {
    session: S,
    dialect: DialectImpl,
    table: TableIdentity,
    schema: Arc<InsertSchema>,
    batch_size: usize,
    buffer: Vec<SqlValue>,
    buffered_rows: usize,
    prepared_rows: Option<usize>,
    in_transaction: bool,
    state: WriterState,
    stats: WriterStats,
    records_seen: u64,
}

impl<S: InsertSession> BatchedWriter<S> {
    pub fn new(
        session: S,
        dialect: DialectImpl,
        table: TableIdentity,
        schema: Arc<InsertSchema>,
        options: &WriterOptions,
    ) -> Result<Self> {
        let batch_size =
            resolve_batch_size(options.batch_size, schema.len(), dialect.max_bind_params())?;

        debug!(
            "Batched writer for {}: {} columns, batch size {}",
            table,
            schema.len(),
            batch_size
        );

        Ok(Self {
            session,
            dialect,
            table,
            buffer: Vec::with_capacity((batch_size + 1) * schema.len()),
            schema,
            batch_size,
            buffered_rows: 0,
            prepared_rows: None,
            in_transaction: false,
            state: WriterState::Idle,
            stats: WriterStats::default(),
            records_seen: 0,
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write buffered rows now, inside the open transaction.
    pub async fn flush(&mut self) -> Result<()> {
        self.ensure_usable()?;
        if self.buffered_rows == 0 {
            return Ok(());
        }

        self.state = WriterState::Flushing;
        match self.execute_buffer().await {
            Ok(()) => {
                self.state = WriterState::Accumulating;
                Ok(())
            }
            Err(e) => {
                self.fail().await;
                Err(e)
            }
        }
    }

    async fn execute_buffer(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.session.begin().await?;
            self.in_transaction = true;
        }

        let rows = self.buffered_rows;
        let reprepare = self.prepared_rows != Some(rows);
        if reprepare {
            let sql = self.dialect.build_insert(&self.table, &self.schema, rows)?;
            self.session.prepare(&sql).await?;
            self.prepared_rows = Some(rows);
            self.stats.prepares += 1;
        }

        self.session.execute(&self.buffer).await?;
        debug!(table = %self.table, rows, reprepare, "Flushed batch");

        self.buffer.clear();
        self.buffered_rows = 0;
        self.stats.flushes += 1;
        self.stats.rows_written += rows as u64;
        Ok(())
    }

    fn convert_into_buffer(&mut self, row: &[String]) -> Result<()> {
        let start = self.buffer.len();
        for column in self.schema.ordered_columns() {
            let converted = match row.get(column.position()) {
                Some(raw) => column.converter.convert(raw),
                None => Err(ConversionError::new(
                    "",
                    column.semantic_type(),
                    format!(
                        "record has {} fields but the column is at position {}",
                        row.len(),
                        column.position()
                    ),
                )),
            };
            match converted {
                Ok(value) => self.buffer.push(value),
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(LoadError::conversion(self.records_seen, &column.name, e));
                }
            }
        }
        Ok(())
    }

    /// Drop buffered rows, roll back and refuse further work.
    async fn fail(&mut self) {
        self.state = WriterState::Failed;
        self.buffer.clear();
        self.buffered_rows = 0;
        if self.in_transaction {
            self.in_transaction = false;
            if let Err(e) = self.session.rollback().await {
                warn!("Rollback on {} failed: {}", self.table, e);
            }
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            WriterState::Closed => Err(LoadError::WriterClosed(format!(
                "writer for {} is closed",
                self.table
            ))),
            WriterState::Failed => Err(LoadError::WriterClosed(format!(
                "writer for {} failed earlier and was rolled back",
                self.table
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S: InsertSession> RowWriter for BatchedWriter<S> {
    async fn add(&mut self, row: Vec<String>) -> Result<()> {
        self.ensure_usable()?;
        self.records_seen += 1;

        if let Err(e) = self.convert_into_buffer(&row) {
            self.fail().await;
            return Err(e);
        }
        self.buffered_rows += 1;
        self.state = WriterState::Accumulating;

        if self.buffered_rows > self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Failed => return self.ensure_usable(),
            _ => {}
        }

        self.flush().await?;

        if self.in_transaction {
            if let Err(e) = self.session.commit().await {
                self.fail().await;
                return Err(e);
            }
            self.in_transaction = false;
        }

        self.state = WriterState::Closed;
        info!(
            table = %self.table,
            rows = self.stats.rows_written,
            flushes = self.stats.flushes,
            prepares = self.stats.prepares,
            "Writer committed"
        );
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        if matches!(self.state, WriterState::Closed | WriterState::Failed) {
            return Ok(());
        }
        self.state = WriterState::Failed;
        self.buffer.clear();
        self.buffered_rows = 0;
        if self.in_transaction {
            self.in_transaction = false;
            self.session.rollback().await?;
            warn!("Rolled back uncommitted rows on {}", self.table);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDefinition, Schema};
    use crate::core::types::SemanticType;
    use crate::drivers::PostgresDialect;
    use crate::writer::testing::{RecordingSession, SessionEvent};

    fn people_schema() -> Arc<InsertSchema> {
        let mut s = Schema::new();
        s.push("id", ColumnDefinition::new(SemanticType::Int64, false, 0)).unwrap();
        s.push("name", ColumnDefinition::new(SemanticType::Text, false, 1)).unwrap();
        Arc::new(s.to_insert_schema())
    }

    fn writer(session: RecordingSession, batch_size: usize) -> BatchedWriter<RecordingSession> {
        let dialect = DialectImpl::Postgres(PostgresDialect::new());
        let table = dialect.table_identity("public", "people").unwrap();
        let options = WriterOptions {
            batch_size: Some(batch_size),
            ..Default::default()
        };
        BatchedWriter::new(session, dialect, table, people_schema(), &options).unwrap()
    }

    fn row(id: &str, name: &str) -> Vec<String> {
        vec![id.to_string(), name.to_string()]
    }

    #[test]
    fn test_default_batch_size_follows_dialect_limit() {
        let dialect = DialectImpl::Postgres(PostgresDialect::new());
        let table = dialect.table_identity("public", "people").unwrap();
        let w = BatchedWriter::new(
            RecordingSession::new(),
            dialect,
            table,
            people_schema(),
            &WriterOptions::default(),
        )
        .unwrap();
        assert_eq!(w.batch_size(), 65535 / 2 - 1);
    }

    #[test]
    fn test_resolve_batch_size() {
        assert_eq!(resolve_batch_size(None, 3, 65_535).unwrap(), 21_844);
        assert_eq!(resolve_batch_size(Some(100), 3, 65_535).unwrap(), 100);
        assert_eq!(resolve_batch_size(Some(50_000), 3, 65_535).unwrap(), 21_844);
        assert_eq!(resolve_batch_size(None, 10, 10).unwrap(), 0);
        assert!(resolve_batch_size(None, 11, 10).is_err());
        assert!(resolve_batch_size(None, 0, 10).is_err());
    }

    #[test]
    fn test_default_batch_never_exceeds_budget() {
        for columns in 1..200 {
            let size = resolve_batch_size(None, columns, 65_535).unwrap();
            assert!((size + 1) * columns <= 65_535, "{} columns", columns);
        }
    }

    #[tokio::test]
    async fn test_single_row_flush_has_one_tuple() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 1);
        w.add(row("1", "Alice")).await.unwrap();
        w.close().await.unwrap();

        let events = session.events();
        assert_eq!(
            events,
            vec![
                SessionEvent::Begin,
                SessionEvent::Prepare(
                    "INSERT INTO \"public\".\"people\" (\"id\", \"name\") VALUES ($1::bigint, $2::text)"
                        .to_string()
                ),
                SessionEvent::Execute(vec![SqlValue::I64(1), SqlValue::Text("Alice".into())]),
                SessionEvent::Commit,
            ]
        );
        assert_eq!(w.state(), WriterState::Closed);
    }

    #[tokio::test]
    async fn test_statement_cached_across_equal_flushes() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 1);

        // Batch size 1 flushes every second row.
        for i in 0..5 {
            w.add(row(&i.to_string(), "x")).await.unwrap();
        }
        assert_eq!(session.prepare_count(), 1);
        assert_eq!(w.stats().flushes, 2);

        w.close().await.unwrap();
        assert_eq!(session.prepare_count(), 2);
        assert_eq!(session.executed_row_counts(2), vec![2, 2, 1]);
        assert_eq!(w.stats().rows_written, 5);
        assert_eq!(w.stats().prepares, 2);
    }

    #[tokio::test]
    async fn test_exact_multiple_never_reprepares() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 1);
        for i in 0..4 {
            w.add(row(&i.to_string(), "x")).await.unwrap();
        }
        w.close().await.unwrap();
        assert_eq!(session.prepare_count(), 1);
        assert_eq!(session.executed_row_counts(2), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_close_without_rows_is_noop() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 10);
        w.close().await.unwrap();
        assert!(session.events().is_empty());
        assert_eq!(w.state(), WriterState::Closed);
        w.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_conversion_error_rolls_back_and_poisons() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 1);
        w.add(row("1", "a")).await.unwrap();
        w.add(row("2", "b")).await.unwrap();

        let err = w.add(row("three", "c")).await.unwrap_err();
        match &err {
            LoadError::Conversion { record, column, .. } => {
                assert_eq!(*record, 3);
                assert_eq!(column, "id");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(w.state(), WriterState::Failed);
        assert_eq!(session.events().last(), Some(&SessionEvent::Rollback));
        assert!(!session.events().contains(&SessionEvent::Commit));

        assert!(matches!(w.add(row("4", "d")).await, Err(LoadError::WriterClosed(_))));
        assert!(w.close().await.is_err());
    }

    #[tokio::test]
    async fn test_short_row_is_conversion_error() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 10);
        let err = w.add(vec!["1".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("column \"name\""));
        // Nothing was flushed, so there was no transaction to roll back.
        assert!(session.events().is_empty());
    }

    #[tokio::test]
    async fn test_execute_failure_rolls_back() {
        let session = RecordingSession::new().fail_execute_at(1);
        let mut w = writer(session.clone(), 0);
        let err = w.add(row("1", "a")).await.unwrap_err();
        assert!(matches!(err, LoadError::Statement(_)));
        assert_eq!(
            session.events(),
            vec![
                SessionEvent::Begin,
                SessionEvent::Prepare(
                    "INSERT INTO \"public\".\"people\" (\"id\", \"name\") VALUES ($1::bigint, $2::text)"
                        .to_string()
                ),
                SessionEvent::Rollback,
            ]
        );
        assert_eq!(w.state(), WriterState::Failed);
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back() {
        let session = RecordingSession::new().fail_commit();
        let mut w = writer(session.clone(), 10);
        w.add(row("1", "a")).await.unwrap();
        assert!(w.close().await.is_err());
        assert_eq!(session.events().last(), Some(&SessionEvent::Rollback));
        assert_eq!(w.state(), WriterState::Failed);
    }

    #[tokio::test]
    async fn test_abort_discards_open_transaction() {
        let session = RecordingSession::new();
        let mut w = writer(session.clone(), 0);
        w.add(row("1", "a")).await.unwrap();
        w.add(row("2", "b")).await.unwrap();
        w.abort().await.unwrap();
        let events = session.events();
        assert_eq!(events.last(), Some(&SessionEvent::Rollback));
        assert!(!events.contains(&SessionEvent::Commit));
    }
}
