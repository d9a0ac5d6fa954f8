//! Asynchronous hand-off between the record producer and a row writer.
//!
//! The producer enqueues rows on a bounded channel and only waits when the
//! channel is full. A single spawned task drains it in FIFO order into the
//! wrapped writer. Errors from the wrapped writer are fatal: rows already
//! queued cannot be taken back, so the task hands the error to a fatal handler
//! that by default terminates the process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::core::traits::RowWriter;
use crate::error::{LoadError, Result};

/// Default queue capacity in rows.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Called with the first error raised by the wrapped writer.
pub type FatalHandler = Arc<dyn Fn(&LoadError) + Send + Sync>;

enum Message {
    Row(Vec<String>),
    Close,
    Abort,
}

/// Row writer running on its own task behind a bounded queue.
pub struct BackgroundWriter {
    tx: Option<mpsc::Sender<Message>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl BackgroundWriter {
    /// Spawn with the process-terminating fatal handler.
    pub fn spawn(inner: Box<dyn RowWriter>, capacity: usize) -> Self {
        Self::spawn_with_fatal_handler(inner, capacity, Arc::new(exit_process))
    }

    pub fn spawn_with_fatal_handler(
        inner: Box<dyn RowWriter>,
        capacity: usize,
        on_fatal: FatalHandler,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(consume(inner, rx, on_fatal));
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    async fn send(&mut self, message: Message) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| LoadError::WriterClosed("background writer is closed".to_string()))?;
        tx.send(message).await.map_err(|_| {
            LoadError::WriterClosed("background writer stopped after an error".to_string())
        })
    }

    async fn finish(&mut self, last: Message) -> Result<()> {
        if self.tx.is_some() {
            // A failed send means the task already exited; its result is in the handle.
            let _ = self.send(last).await;
            self.tx = None;
        }
        match self.handle.take() {
            Some(handle) => handle.await.map_err(|e| {
                LoadError::WriterClosed(format!("background writer task failed: {}", e))
            })?,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowWriter for BackgroundWriter {
    /// Enqueue a row; waits only while the queue is full.
    async fn add(&mut self, row: Vec<String>) -> Result<()> {
        self.send(Message::Row(row)).await
    }

    /// Wait for the queue to drain and the wrapped writer to close.
    async fn close(&mut self) -> Result<()> {
        self.finish(Message::Close).await
    }

    async fn abort(&mut self) -> Result<()> {
        self.finish(Message::Abort).await
    }
}

async fn consume(
    mut inner: Box<dyn RowWriter>,
    mut rx: mpsc::Receiver<Message>,
    on_fatal: FatalHandler,
) -> Result<()> {
    let mut rows: u64 = 0;
    while let Some(message) = rx.recv().await {
        match message {
            Message::Row(row) => {
                if let Err(e) = inner.add(row).await {
                    on_fatal(&e);
                    return Err(e);
                }
                rows += 1;
            }
            Message::Close => {
                debug!("Background writer drained {} rows, closing", rows);
                if let Err(e) = inner.close().await {
                    on_fatal(&e);
                    return Err(e);
                }
                return Ok(());
            }
            Message::Abort => return inner.abort().await,
        }
    }

    warn!("Background writer input ended without close, rolling back");
    inner.abort().await
}

fn exit_process(err: &LoadError) {
    error!("{}", err.format_detailed());
    std::process::exit(i32::from(err.exit_code()));
}
