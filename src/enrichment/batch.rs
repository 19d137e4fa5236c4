use std::num::NonZeroUsize;

use crate::dataset::JoinedRecord;

/// A contiguous slice of the joined records, processed and persisted as a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch<'a> {
    /// Position among the batches of this run, starting at 0.
    pub ordinal: usize,
    /// Absolute index of the first record in the joined set.
    pub offset: usize,
    pub records: &'a [JoinedRecord],
}

impl Batch<'_> {
    pub fn first_local_id(&self) -> Option<i64> {
        self.records.first().map(|r| r.local_id)
    }

    pub fn last_local_id(&self) -> Option<i64> {
        self.records.last().map(|r| r.local_id)
    }

    /// Offset to resume from once this batch is on disk.
    pub fn end_offset(&self) -> usize {
        self.offset + self.records.len()
    }
}

/// Ordered, non-overlapping batches over `records[start_offset..]`.
/// Records before the offset are never part of any batch.
pub fn plan_batches(
    records: &[JoinedRecord],
    start_offset: usize,
    batch_size: NonZeroUsize,
) -> Vec<Batch<'_>> {
    let Some(tail) = records.get(start_offset..) else {
        return Vec::new();
    };
    tail.chunks(batch_size.get())
        .enumerate()
        .map(|(ordinal, chunk)| Batch {
            ordinal,
            offset: start_offset + ordinal * batch_size.get(),
            records: chunk,
        })
        .collect()
}
