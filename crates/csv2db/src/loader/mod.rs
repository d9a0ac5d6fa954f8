//! Load orchestration: input schema, table preparation, reconciliation and
//! feeding records to the writer.

mod progress;

pub use progress::{ProgressCounters, ProgressReporter, ProgressUpdate};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{LoadSettings, TableMode};
use crate::core::identifier::TableIdentity;
use crate::core::schema::{reconcile_by_name, reconcile_by_position, InsertSchema, Schema};
use crate::core::traits::{RowWriter, TargetDriver};
use crate::drivers;
use crate::error::{LoadError, Result};
use crate::source::RecordSource;
use crate::writer::{BackgroundWriter, FatalHandler};

/// Result of a load run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    /// Destination table, `schema.table`.
    pub table: String,
    pub rows_loaded: u64,
    /// Columns written per row.
    pub columns: usize,
    pub duration_seconds: f64,
    pub rows_per_second: u64,
}

impl LoadResult {
    fn new(table: &TableIdentity, rows_loaded: u64, columns: usize, elapsed: Duration) -> Self {
        let duration_seconds = elapsed.as_secs_f64();
        let rows_per_second = if duration_seconds > 0.0 {
            (rows_loaded as f64 / duration_seconds) as u64
        } else {
            rows_loaded
        };
        Self {
            table: table.to_string(),
            rows_loaded,
            columns,
            duration_seconds,
            rows_per_second,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads one CSV input into one table.
pub struct Loader {
    settings: LoadSettings,
    driver: Arc<dyn TargetDriver>,
    progress: bool,
    fatal_handler: Option<FatalHandler>,
}

impl Loader {
    /// Connect to the destination named in the settings.
    pub async fn connect(settings: LoadSettings) -> Result<Self> {
        let driver = drivers::connect(&settings.connect).await?;
        Ok(Self::new(settings, driver))
    }

    pub fn new(settings: LoadSettings, driver: Arc<dyn TargetDriver>) -> Self {
        Self {
            settings,
            driver,
            progress: false,
            fatal_handler: None,
        }
    }

    /// Print JSON-lines progress to stderr while loading.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Replace the process-terminating handler for background writer errors.
    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.fatal_handler = Some(handler);
        self
    }

    /// Run the load and release the driver.
    pub async fn run(self) -> Result<LoadResult> {
        let result = self.load().await;
        self.driver.close().await;
        result
    }

    async fn load(&self) -> Result<LoadResult> {
        let settings = &self.settings;
        let table = self
            .driver
            .table_identity(settings.schema.as_deref(), &settings.table)?;
        let mut source = RecordSource::open(&settings.source)?;

        info!(
            "Loading {} into {} ({} driver, table mode {})",
            settings.source.input,
            table,
            self.driver.name(),
            settings.table_mode
        );

        let mut exists = self.driver.table_exists(&table).await?;
        if exists {
            exists = self.prepare_existing_table(&table).await?;
        }
        if !settings.has_header && !exists {
            warn!("Input has no header and the table does not exist, using col0..colN as column names");
        }

        let first = match source.next_record().await {
            Some(record) => record?,
            None => {
                info!("Input is empty, nothing to load");
                return Ok(LoadResult::new(&table, 0, 0, Duration::ZERO));
            }
        };

        let input_schema = if settings.has_header {
            Schema::from_header(&first)?
        } else {
            Schema::with_column_count(first.len())
        };
        debug!("Input schema:\n{}", input_schema.render());

        let insert_schema = Arc::new(self.insert_schema(&table, &input_schema, exists).await?);
        info!("Insert schema:\n{}", insert_schema.render());
        let statement = self.driver.render_insert_statement(&table, &insert_schema, 1)?;
        debug!("Single-row insert: {}", statement);

        let inner = self
            .driver
            .create_writer(&table, insert_schema.clone(), &settings.writer)
            .await?;
        let mut writer = match &self.fatal_handler {
            Some(handler) => BackgroundWriter::spawn_with_fatal_handler(
                inner,
                settings.queue_capacity,
                handler.clone(),
            ),
            None => BackgroundWriter::spawn(inner, settings.queue_capacity),
        };

        let started = Instant::now();
        let rows = Arc::new(AtomicU64::new(0));
        let reporter = self.progress.then(|| {
            ProgressReporter::spawn(ProgressCounters {
                table: table.to_string(),
                rows: rows.clone(),
                bytes_read: source.byte_counter(),
                total_bytes: source.total_bytes(),
            })
        });

        let leading = (!settings.has_header).then_some(first);
        let outcome = match feed(&mut source, &mut writer, leading, &rows).await {
            Ok(()) => writer.close().await,
            Err(FeedError::Read(e)) => {
                warn!("Reading input failed, rolling back");
                if let Err(abort_err) = writer.abort().await {
                    warn!("Rollback failed: {}", abort_err);
                }
                Err(e)
            }
            // The writer task has stopped; its own error is the cause.
            Err(FeedError::Write(e)) => match writer.close().await {
                Err(cause) => Err(cause),
                Ok(()) => Err(e),
            },
        };
        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        outcome?;

        let result = LoadResult::new(
            &table,
            rows.load(Ordering::Relaxed),
            insert_schema.len(),
            started.elapsed(),
        );
        info!(
            "Loaded {} rows into {} in {:.1}s ({} rows/sec)",
            result.rows_loaded, result.table, result.duration_seconds, result.rows_per_second
        );
        Ok(result)
    }

    /// Apply the table mode to an existing table; returns whether it still exists.
    async fn prepare_existing_table(&self, table: &TableIdentity) -> Result<bool> {
        match self.settings.table_mode {
            TableMode::DropAndCreate => {
                self.driver.drop_table(table).await?;
                Ok(false)
            }
            TableMode::Truncate => {
                self.driver.truncate_table(table).await?;
                Ok(true)
            }
            TableMode::DeleteAll => {
                self.driver.delete_all_rows(table).await?;
                Ok(true)
            }
            TableMode::Create | TableMode::AsIs => Ok(true),
        }
    }

    async fn insert_schema(
        &self,
        table: &TableIdentity,
        input: &Schema,
        exists: bool,
    ) -> Result<InsertSchema> {
        let insert_schema = if exists {
            let destination = self.driver.load_schema(table).await?;
            debug!("Destination schema:\n{}", destination.render());
            let reconciled = if self.settings.has_header {
                reconcile_by_name(input, &destination)
            } else {
                reconcile_by_position(input, &destination)
            };
            reconciled.insert_schema
        } else if self.settings.table_mode.creates_missing() {
            self.driver.create_table(table, input).await?;
            input.to_insert_schema()
        } else {
            return Err(LoadError::Config(format!(
                "Table {} does not exist. Set the table mode to create or create the table first",
                table
            )));
        };

        if insert_schema.is_empty() {
            return Err(LoadError::Config(format!(
                "No input column matches a column of {}",
                table
            )));
        }
        Ok(insert_schema)
    }
}

enum FeedError {
    Read(LoadError),
    Write(LoadError),
}

async fn feed(
    source: &mut RecordSource,
    writer: &mut BackgroundWriter,
    leading: Option<Vec<String>>,
    rows: &AtomicU64,
) -> std::result::Result<(), FeedError> {
    if let Some(record) = leading {
        writer.add(record).await.map_err(FeedError::Write)?;
        rows.fetch_add(1, Ordering::Relaxed);
    }
    while let Some(record) = source.next_record().await {
        let record = record.map_err(FeedError::Read)?;
        writer.add(record).await.map_err(FeedError::Write)?;
        rows.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}
