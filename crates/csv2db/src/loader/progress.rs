//! JSON-lines progress on stderr.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// One progress line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub table: String,
    pub rows: u64,
    pub bytes_read: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub elapsed_seconds: f64,
}

/// Shared counters sampled by the reporter.
#[derive(Debug, Clone)]
pub struct ProgressCounters {
    pub table: String,
    pub rows: Arc<AtomicU64>,
    pub bytes_read: Arc<AtomicU64>,
    pub total_bytes: Option<u64>,
}

impl ProgressCounters {
    pub fn snapshot(&self, elapsed: Duration) -> ProgressUpdate {
        let bytes_read = self.bytes_read.load(Ordering::Relaxed);
        let percent = self
            .total_bytes
            .filter(|total| *total > 0)
            .map(|total| (bytes_read as f64 / total as f64 * 100.0).min(100.0));
        ProgressUpdate {
            table: self.table.clone(),
            rows: self.rows.load(Ordering::Relaxed),
            bytes_read,
            total_bytes: self.total_bytes,
            percent,
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }
}

/// Background task printing a [`ProgressUpdate`] every second.
pub struct ProgressReporter {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(counters: ProgressCounters) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => emit(&counters.snapshot(started.elapsed())),
                    _ = &mut stopped => {
                        emit(&counters.snapshot(started.elapsed()));
                        break;
                    }
                }
            }
        });
        Self {
            stop: Some(stop),
            handle,
        }
    }

    /// Print a final line and stop.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

fn emit(update: &ProgressUpdate) {
    if let Ok(json) = serde_json::to_string(update) {
        eprintln!("{}", json);
    }
}
