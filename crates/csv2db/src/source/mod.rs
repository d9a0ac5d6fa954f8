//! CSV record source.
//!
//! Records are parsed on a blocking task and handed to the async side over a
//! bounded channel. The input is a file path or `--` for stdin; bytes are
//! transcoded to UTF-8 before parsing.

mod decode;

pub use decode::{CountingReader, DecodingReader};

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use encoding_rs::Encoding;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{LoadError, Result};

/// Input path that selects stdin.
pub const STDIN_INPUT: &str = "--";

/// Records parsed ahead of the consumer.
const RECORD_CHANNEL_CAPACITY: usize = 1024;

/// Look up an encoding by its WHATWG label (`utf-8`, `windows-1251`, `latin1`, ...).
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| LoadError::Config(format!("Unknown input encoding '{}'", label)))
}

/// How to read the input.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub input: String,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

/// Streaming CSV reader.
pub struct RecordSource {
    rx: mpsc::Receiver<Result<Vec<String>>>,
    bytes_read: Arc<AtomicU64>,
    total_bytes: Option<u64>,
}

impl RecordSource {
    /// Open the input and start parsing.
    ///
    /// Opening a missing file fails here, before any table is touched.
    pub fn open(options: &SourceOptions) -> Result<Self> {
        let (reader, total_bytes): (Box<dyn Read + Send>, Option<u64>) =
            if options.input == STDIN_INPUT {
                (Box::new(io::stdin()), None)
            } else {
                let file = File::open(&options.input).map_err(|e| {
                    io::Error::new(e.kind(), format!("cannot open {}: {}", options.input, e))
                })?;
                let size = file.metadata().ok().map(|m| m.len());
                (Box::new(file), size)
            };
        debug!(
            "Reading {} as {} with delimiter {:?}",
            options.input,
            options.encoding.name(),
            char::from(options.delimiter)
        );
        Ok(Self::from_reader(
            reader,
            options.delimiter,
            options.encoding,
            total_bytes,
        ))
    }

    /// Parse records from any reader.
    pub fn from_reader<R>(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
        total_bytes: Option<u64>,
    ) -> Self
    where
        R: Read + Send + 'static,
    {
        let bytes_read = Arc::new(AtomicU64::new(0));
        let counting = CountingReader::new(reader, bytes_read.clone());
        let decoded = DecodingReader::new(counting, encoding);
        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        tokio::task::spawn_blocking(move || parse(decoded, delimiter, tx));

        Self {
            rx,
            bytes_read,
            total_bytes,
        }
    }

    /// Next record, `None` at end of input.
    pub async fn next_record(&mut self) -> Option<Result<Vec<String>>> {
        self.rx.recv().await
    }

    /// Raw input bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Shared handle on the byte counter, for progress reporting.
    pub fn byte_counter(&self) -> Arc<AtomicU64> {
        self.bytes_read.clone()
    }

    /// Input size when known (regular files).
    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }
}

impl Drop for RecordSource {
    fn drop(&mut self) {
        // Unblocks the parser if the consumer stops early.
        self.rx.close();
    }
}

fn parse<R: Read>(reader: R, delimiter: u8, tx: mpsc::Sender<Result<Vec<String>>>) {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(false)
        .from_reader(reader);

    for result in csv_reader.records() {
        let item = result
            .map(|record| record.iter().map(str::to_string).collect())
            .map_err(LoadError::from);
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            return;
        }
    }
}
