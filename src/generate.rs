//! Test data generation. Tooling only, never invoked by the sort itself.

use std::path::Path;

use log;
use rand::Rng;

use crate::run::{Record, RecordWriter};
use crate::sort::SortError;

/// Upper bound (exclusive) for generated values.
pub const MAX_VALUE: Record = 1_000_000;

/// Writes random newline-terminated records to `path` until the file reaches
/// at least `size_bytes` bytes.
pub fn generate(path: &Path, size_bytes: u64) -> Result<(), SortError> {
    let mut rng = rand::thread_rng();
    let mut writer = RecordWriter::create(path)?;
    let mut written: u64 = 0;
    let mut count: u64 = 0;

    while written < size_bytes {
        let record = rng.gen_range(0..MAX_VALUE);
        writer.write_record(record)?;
        written += record.to_string().len() as u64 + 1;
        count += 1;
    }
    writer.finish()?;

    log::info!("generated {} records ({} bytes) into {}", count, written, path.display());

    Ok(())
}
