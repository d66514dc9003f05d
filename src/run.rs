//! Line-oriented record I/O and run file creation.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use tempfile;

use crate::sort::SortError;

/// A single input value. Records have no identity beyond their value,
/// duplicates are valid input.
pub type Record = i64;

/// In-memory footprint of one record, the unit the memory budget is divided by.
pub const RECORD_SIZE: usize = std::mem::size_of::<Record>();

/// Streaming reader over a newline-delimited record file.
/// Any line that does not parse as an integer is fatal.
pub struct RecordReader {
    path: PathBuf,
    lines: io::Lines<io::BufReader<fs::File>>,
    line_no: u64,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, SortError> {
        let file = fs::File::open(path).map_err(|err| SortError::io(path, err))?;

        Ok(RecordReader {
            path: path.to_path_buf(),
            lines: io::BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Record, SortError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(SortError::io(&self.path, err))),
        };

        self.line_no += 1;
        Some(line.trim().parse().map_err(|err| SortError::Parse {
            path: self.path.clone(),
            line: self.line_no,
            source: err,
        }))
    }
}

/// Buffered writer emitting one record per line.
pub struct RecordWriter {
    path: PathBuf,
    inner: io::BufWriter<fs::File>,
}

impl RecordWriter {
    /// Opens the file for writing, truncating any previous content.
    pub fn create(path: &Path) -> Result<Self, SortError> {
        let file = fs::File::create(path).map_err(|err| SortError::io(path, err))?;
        Ok(Self::wrap(path, file))
    }

    /// Opens the file for writing at its end, keeping existing records in place.
    pub fn append(path: &Path) -> Result<Self, SortError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| SortError::io(path, err))?;
        Ok(Self::wrap(path, file))
    }

    fn wrap(path: &Path, file: fs::File) -> Self {
        RecordWriter {
            path: path.to_path_buf(),
            inner: io::BufWriter::new(file),
        }
    }

    pub fn write_record(&mut self, record: Record) -> Result<(), SortError> {
        writeln!(self.inner, "{}", record).map_err(|err| SortError::io(&self.path, err))
    }

    pub fn finish(mut self) -> Result<(), SortError> {
        self.inner.flush().map_err(|err| SortError::io(&self.path, err))
    }
}

/// Writes one sorted run to a fresh uniquely-named file inside `dir`.
/// The file is removed when the returned handle is dropped.
pub fn write_run(dir: &Path, records: &[Record]) -> Result<tempfile::NamedTempFile, SortError> {
    let run_file = tempfile::Builder::new()
        .prefix("run-")
        .suffix(".txt")
        .tempfile_in(dir)
        .map_err(SortError::TempDir)?;

    let mut writer = io::BufWriter::new(run_file.as_file());
    for record in records {
        writeln!(writer, "{}", record).map_err(|err| SortError::io(run_file.path(), err))?;
    }
    writer.flush().map_err(|err| SortError::io(run_file.path(), err))?;
    drop(writer);

    Ok(run_file)
}
