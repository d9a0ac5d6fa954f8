//! In-memory test doubles for the writer layer.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::traits::{InsertSession, RowWriter};
use crate::core::value::SqlValue;
use crate::error::{LoadError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Begin,
    Prepare(String),
    Execute(Vec<SqlValue>),
    Commit,
    Rollback,
}

/// Session that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    events: Arc<Mutex<Vec<SessionEvent>>>,
    executes: Arc<Mutex<usize>>,
    fail_execute_at: Option<usize>,
    fail_commit: bool,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th execute (1-based) fail.
    pub fn fail_execute_at(mut self, n: usize) -> Self {
        self.fail_execute_at = Some(n);
        self
    }

    pub fn fail_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Prepare(_)))
            .count()
    }

    /// Rows per execute, given the column count.
    pub fn executed_row_counts(&self, columns: usize) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Execute(params) => Some(params.len() / columns),
                _ => None,
            })
            .collect()
    }

    /// Every bound parameter, in execution order.
    pub fn executed_params(&self) -> Vec<SqlValue> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Execute(params) => Some(params),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn record(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl InsertSession for RecordingSession {
    async fn begin(&mut self) -> Result<()> {
        self.record(SessionEvent::Begin);
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<()> {
        self.record(SessionEvent::Prepare(sql.to_string()));
        Ok(())
    }

    async fn execute(&mut self, params: &[SqlValue]) -> Result<u64> {
        let n = {
            let mut executes = self.executes.lock().unwrap();
            *executes += 1;
            *executes
        };
        if self.fail_execute_at == Some(n) {
            return Err(LoadError::Statement("duplicate key value".to_string()));
        }
        self.record(SessionEvent::Execute(params.to_vec()));
        Ok(params.len() as u64)
    }

    async fn commit(&mut self) -> Result<()> {
        if self.fail_commit {
            return Err(LoadError::Statement("could not serialize access".to_string()));
        }
        self.record(SessionEvent::Commit);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.record(SessionEvent::Rollback);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriterEvent {
    Add(Vec<String>),
    Close,
    Abort,
}

/// Row writer that records calls, optionally failing on a given row.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    events: Arc<Mutex<Vec<WriterEvent>>>,
    fail_on: Option<Vec<String>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(row: &[&str]) -> Self {
        Self {
            fail_on: Some(row.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<WriterEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl RowWriter for RecordingWriter {
    async fn add(&mut self, row: Vec<String>) -> Result<()> {
        if self.fail_on.as_ref() == Some(&row) {
            return Err(LoadError::Statement(format!("rejected row {:?}", row)));
        }
        self.events.lock().unwrap().push(WriterEvent::Add(row));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.events.lock().unwrap().push(WriterEvent::Close);
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.events.lock().unwrap().push(WriterEvent::Abort);
        Ok(())
    }
}
