//! COPY FROM STDIN writer for PostgreSQL.
//!
//! Rows are converted with the same converters as the batched writer, encoded
//! in COPY text format and streamed in chunks. The COPY is one statement, so
//! the load is atomic without an explicit transaction; dropping the sink
//! before `finish` aborts it.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use deadpool_postgres::Object;
use futures::SinkExt;
use tokio_postgres::CopyInSink;
use tracing::{debug, info, warn};

use crate::core::identifier::TableIdentity;
use crate::core::schema::InsertSchema;
use crate::core::traits::{Dialect, RowWriter};
use crate::core::value::SqlValue;
use crate::error::{ConversionError, LoadError, Result};
use crate::writer::WriterState;

use super::PostgresDialect;

/// Bytes buffered before a chunk is sent.
const COPY_CHUNK_BYTES: usize = 1 << 20;

pub struct PostgresCopyWriter {
    client: Object,
    copy_sql: String,
    table: TableIdentity,
    schema: Arc<InsertSchema>,
    sink: Option<Pin<Box<CopyInSink<Bytes>>>>,
    buffer: BytesMut,
    records_seen: u64,
    state: WriterState,
}

impl PostgresCopyWriter {
    pub fn new(
        client: Object,
        dialect: &PostgresDialect,
        table: TableIdentity,
        schema: Arc<InsertSchema>,
    ) -> Result<Self> {
        let copy_sql = format!(
            "COPY {} ({}) FROM STDIN",
            table.qualified(),
            dialect.column_list(&schema)?
        );
        Ok(Self {
            client,
            copy_sql,
            table,
            schema,
            sink: None,
            buffer: BytesMut::with_capacity(COPY_CHUNK_BYTES),
            records_seen: 0,
            state: WriterState::Idle,
        })
    }

    fn encode_row(&mut self, row: &[String]) -> Result<()> {
        let start = self.buffer.len();
        for (i, column) in self.schema.ordered_columns().iter().enumerate() {
            let converted = match row.get(column.position()) {
                Some(raw) => column.converter.convert(raw),
                None => Err(ConversionError::new(
                    "",
                    column.semantic_type(),
                    format!("record has {} fields", row.len()),
                )),
            };
            let value = match converted {
                Ok(value) => value,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(LoadError::conversion(self.records_seen, &column.name, e));
                }
            };
            if i > 0 {
                self.buffer.put_u8(b'\t');
            }
            encode_copy_text(&value, &mut self.buffer);
        }
        self.buffer.put_u8(b'\n');
        Ok(())
    }

    async fn send_chunk(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        if self.sink.is_none() {
            debug!("{}", self.copy_sql);
            let sink = self.client.copy_in::<_, Bytes>(self.copy_sql.as_str()).await?;
            self.sink = Some(Box::pin(sink));
        }
        let chunk = self.buffer.split().freeze();
        if let Some(sink) = self.sink.as_mut() {
            sink.send(chunk).await?;
        }
        Ok(())
    }

    fn fail(&mut self) {
        self.state = WriterState::Failed;
        self.buffer.clear();
        if self.sink.take().is_some() {
            warn!("Aborted COPY into {}", self.table);
        }
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            WriterState::Closed | WriterState::Failed => Err(LoadError::WriterClosed(format!(
                "COPY writer for {} is no longer accepting rows",
                self.table
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RowWriter for PostgresCopyWriter {
    async fn add(&mut self, row: Vec<String>) -> Result<()> {
        self.ensure_usable()?;
        self.records_seen += 1;
        self.state = WriterState::Accumulating;

        if let Err(e) = self.encode_row(&row) {
            self.fail();
            return Err(e);
        }
        if self.buffer.len() >= COPY_CHUNK_BYTES {
            self.state = WriterState::Flushing;
            if let Err(e) = self.send_chunk().await {
                self.fail();
                return Err(e);
            }
            self.state = WriterState::Accumulating;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.state {
            WriterState::Closed => return Ok(()),
            WriterState::Failed => return self.ensure_usable(),
            _ => {}
        }

        if let Err(e) = self.send_chunk().await {
            self.fail();
            return Err(e);
        }
        let rows = match self.sink.take() {
            Some(mut sink) => match sink.as_mut().finish().await {
                Ok(rows) => rows,
                Err(e) => {
                    self.state = WriterState::Failed;
                    return Err(e.into());
                }
            },
            None => 0,
        };

        self.state = WriterState::Closed;
        info!(table = %self.table, rows, "COPY committed");
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        if !matches!(self.state, WriterState::Closed | WriterState::Failed) {
            self.fail();
        }
        Ok(())
    }
}

/// Append one value in COPY text format.
pub(crate) fn encode_copy_text(value: &SqlValue, out: &mut BytesMut) {
    use std::fmt::Write;

    match value {
        SqlValue::Null(_) => out.put_slice(b"\\N"),
        SqlValue::Bool(v) => out.put_u8(if *v { b't' } else { b'f' }),
        SqlValue::F64(v) => put_float(*v, out),
        SqlValue::F32(v) if !v.is_finite() => put_float(f64::from(*v), out),
        SqlValue::Text(s) => {
            for &b in s.as_bytes() {
                match b {
                    b'\\' => out.put_slice(b"\\\\"),
                    b'\n' => out.put_slice(b"\\n"),
                    b'\r' => out.put_slice(b"\\r"),
                    b'\t' => out.put_slice(b"\\t"),
                    _ => out.put_u8(b),
                }
            }
        }
        other => {
            let _ = write!(out, "{}", other);
        }
    }
}

fn put_float(v: f64, out: &mut BytesMut) {
    use std::fmt::Write;

    if v.is_nan() {
        out.put_slice(b"NaN");
    } else if v == f64::INFINITY {
        out.put_slice(b"Infinity");
    } else if v == f64::NEG_INFINITY {
        out.put_slice(b"-Infinity");
    } else {
        let _ = write!(out, "{}", v);
    }
}
