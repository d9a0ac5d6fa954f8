//! Row writers.
//!
//! - [`BatchedWriter`]: multi-row INSERTs in one transaction over any
//!   [`InsertSession`](crate::core::InsertSession)
//! - [`BackgroundWriter`]: bounded queue plus one consumer task in front of
//!   any other writer

mod background;
mod batched;

#[cfg(test)]
pub(crate) mod testing;

pub use background::{BackgroundWriter, FatalHandler, DEFAULT_QUEUE_CAPACITY};
pub use batched::{resolve_batch_size, BatchedWriter, WriterState, WriterStats};
