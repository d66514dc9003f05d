//! Ascending-order validator, the merge loop's termination oracle.

use std::path::Path;

use crate::run::RecordReader;
use crate::sort::SortError;

/// Streams the file once and reports whether its records are non-decreasing.
/// An empty or single-record file counts as ordered.
pub fn is_ascending(path: &Path) -> Result<bool, SortError> {
    let mut records = RecordReader::open(path)?;

    let mut prev = match records.next().transpose()? {
        Some(record) => record,
        None => return Ok(true),
    };

    for record in records {
        let record = record?;
        if record < prev {
            return Ok(false);
        }
        prev = record;
    }

    Ok(true)
}
