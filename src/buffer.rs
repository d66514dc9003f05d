//! Memory-bounded record buffer.

use crate::run::Record;

/// Accumulates records for one run, limited by the number of records the
/// memory budget allows.
pub struct RecordBuffer {
    limit: usize,
    inner: Vec<Record>,
}

impl RecordBuffer {
    pub fn new(limit: usize) -> Self {
        RecordBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.inner.push(record);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the memory limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Drains the buffered records in ascending order, leaving the buffer
    /// empty and reusable. Records are scalar so an unstable sort suffices.
    pub fn take_sorted(&mut self) -> Vec<Record> {
        let mut records = std::mem::take(&mut self.inner);
        records.sort_unstable();
        records
    }
}
