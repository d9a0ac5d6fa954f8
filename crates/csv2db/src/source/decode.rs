//! Byte-level adapters between the input stream and the CSV parser.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use encoding_rs::{CoderResult, Decoder, Encoding};
use tracing::warn;

const RAW_CHUNK: usize = 64 * 1024;

/// Counts raw bytes pulled from the wrapped reader.
pub struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R, count: Arc<AtomicU64>) -> Self {
        Self { inner, count }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Transcodes any `encoding_rs` encoding to UTF-8, dropping a leading BOM.
///
/// Malformed sequences become U+FFFD; the first occurrence is logged.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    pending: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    finished: bool,
    reported_malformed: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder_with_bom_removal(),
            pending: Vec::with_capacity(RAW_CHUNK),
            decoded: Vec::new(),
            pos: 0,
            finished: false,
            reported_malformed: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = vec![0u8; RAW_CHUNK];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;
        self.pending.extend_from_slice(&chunk[..n]);

        let capacity = self
            .decoder
            .max_utf8_buffer_length(self.pending.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "input chunk too large"))?;
        self.decoded.clear();
        self.decoded.resize(capacity, 0);
        self.pos = 0;

        let (result, read, written, had_errors) =
            self.decoder
                .decode_to_utf8(&self.pending, &mut self.decoded, last);
        self.decoded.truncate(written);
        self.pending.drain(..read);

        if had_errors && !self.reported_malformed {
            self.reported_malformed = true;
            warn!(
                "Input is not valid {}, malformed bytes were replaced",
                self.decoder.encoding().name()
            );
        }
        if last && result == CoderResult::InputEmpty && self.pending.is_empty() {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.decoded.len() {
                let n = buf.len().min(self.decoded.len() - self.pos);
                buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}
