//! Batched command execution.
//!
//! [`QueryBatch`] collects commands, [`partition`] splits them into round
//! trips, and [`BatchExecutor`] sends those round trips over one shared
//! connection.

mod assembler;
mod executor;
mod query_batch;

pub use assembler::{assign_batches, batch_sizes, partition, short_batch_size, Batch};
pub use executor::BatchExecutor;
pub use query_batch::QueryBatch;
