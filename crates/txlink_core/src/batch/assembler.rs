//! Splitting command lists into round trips.
//!
//! Commands are grouped into batches of `batch_size`. A short tail is not
//! sent on its own: when at most `batch_size / 3 + 1` commands would be left
//! over, they ride along with the last full batch instead.
//!
//! ```text
//! 65 commands, size 50:  [0..65)               one batch
//! 70 commands, size 50:  [0..50) [50..70)      tail of 20 split off
//! ```

use crate::error::{CoreError, CoreResult};

/// Returns the tail length threshold for `batch_size`.
#[must_use]
pub const fn short_batch_size(batch_size: usize) -> usize {
    batch_size / 3
}

/// A group of consecutive commands sent in one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// Position of this batch in the run, starting at 0.
    pub index: usize,
    /// Items in original order.
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Computes the batch number of every position in a list of `len` items.
///
/// A running index advances for each item that still has more than
/// `batch_size / 3` items after it; the item's batch is that index divided
/// by `batch_size`. Items near the end stop advancing the index, which is
/// what folds a short tail into the batch before it.
///
/// # Errors
///
/// Returns `InvalidBatchSize` if `batch_size` is zero.
pub fn assign_batches(len: usize, batch_size: usize) -> CoreResult<Vec<usize>> {
    if batch_size == 0 {
        return Err(CoreError::InvalidBatchSize { size: batch_size });
    }

    let short = short_batch_size(batch_size);
    let mut index: Option<usize> = None;
    let assignments = (0..len)
        .map(|position| {
            let remaining = len - position - 1;
            if remaining > short {
                index = Some(index.map_or(0, |i| i + 1));
            }
            index.unwrap_or(0) / batch_size
        })
        .collect();
    Ok(assignments)
}

/// Partitions `items` into ordered batches.
///
/// Every batch but the last holds exactly `batch_size` items; the last holds
/// between one and `batch_size + batch_size / 3 + 1`. Empty input yields no
/// batches.
///
/// # Errors
///
/// Returns `InvalidBatchSize` if `batch_size` is zero.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> CoreResult<Vec<Batch<T>>> {
    let assignments = assign_batches(items.len(), batch_size)?;

    let mut batches: Vec<Batch<T>> = Vec::new();
    for (item, batch) in items.into_iter().zip(assignments) {
        match batches.last_mut() {
            Some(last) if last.index == batch => last.items.push(item),
            _ => batches.push(Batch {
                index: batch,
                items: vec![item],
            }),
        }
    }
    Ok(batches)
}

/// Returns only the batch sizes `partition` would produce.
///
/// # Errors
///
/// Returns `InvalidBatchSize` if `batch_size` is zero.
pub fn batch_sizes(len: usize, batch_size: usize) -> CoreResult<Vec<usize>> {
    let mut sizes: Vec<usize> = Vec::new();
    for batch in assign_batches(len, batch_size)? {
        match sizes.get_mut(batch) {
            Some(size) => *size += 1,
            None => sizes.push(1),
        }
    }
    Ok(sizes)
}
