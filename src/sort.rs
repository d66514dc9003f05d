//! External sorter: run building, distribution and merge orchestration.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use log;
use tempfile;

use crate::buffer::RecordBuffer;
use crate::distribute::distribute;
use crate::merge::{MergeEngine, MergeStats};
use crate::run::{write_run, RecordReader, RECORD_SIZE};

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// I/O error tagged with the file it occurred on.
    Io { path: PathBuf, source: io::Error },
    /// A line that does not parse as an integer.
    Parse {
        path: PathBuf,
        line: u64,
        source: ParseIntError,
    },
    /// Memory budget too small to hold a single record.
    Budget { budget: u64 },
}

impl SortError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        SortError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SortError::TempDir(err) => Some(err),
            SortError::Io { source, .. } => Some(source),
            SortError::Parse { source, .. } => Some(source),
            SortError::Budget { .. } => None,
        }
    }
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::Io { path, source } => {
                write!(f, "I/O operation failed on {}: {}", path.display(), source)
            }
            SortError::Parse { path, line, source } => {
                write!(f, "malformed record at {}:{}: {}", path.display(), line, source)
            }
            SortError::Budget { budget } => {
                write!(f, "memory budget of {} bytes cannot hold a single record", budget)
            }
        }
    }
}

/// Counters describing a completed sort.
#[derive(Debug, Clone, Copy)]
pub struct SortMetrics {
    /// Number of sorted runs the input was split into.
    pub run_count: usize,
    /// Number of merge passes it took to reach a single ascending sequence.
    pub merge_passes: u64,
}

/// External sorter builder. Provides methods for [`PolyphaseSorter`] initialization.
#[derive(Clone)]
pub struct PolyphaseSorterBuilder {
    /// Memory budget in bytes for one in-memory run.
    memory_budget: u64,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
}

impl PolyphaseSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        PolyphaseSorterBuilder::default()
    }

    /// Sets the memory budget, in bytes, available for buffering records.
    pub fn with_memory_budget(mut self, bytes: u64) -> PolyphaseSorterBuilder {
        self.memory_budget = bytes;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> PolyphaseSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Builds a [`PolyphaseSorter`] instance using provided configuration.
    pub fn build(self) -> Result<PolyphaseSorter, SortError> {
        PolyphaseSorter::new(self.memory_budget, self.tmp_dir.as_deref())
    }
}

impl Default for PolyphaseSorterBuilder {
    fn default() -> Self {
        PolyphaseSorterBuilder {
            memory_budget: u64::MAX,
            tmp_dir: None,
        }
    }
}

/// External polyphase sorter.
pub struct PolyphaseSorter {
    /// Records one run may hold, derived from the memory budget.
    buffer_capacity: usize,
    /// Directory holding run files and the auxiliary slots.
    tmp_dir: tempfile::TempDir,
}

impl PolyphaseSorter {
    /// Creates a new sorter instance.
    ///
    /// # Arguments
    /// * `memory_budget` - Bytes available for the in-memory run buffer; must
    ///   fit at least one record.
    /// * `tmp_path` - Directory to be used to store temporary data. If the
    ///   parameter is [`None`] the default OS temporary directory will be used.
    pub fn new(memory_budget: u64, tmp_path: Option<&Path>) -> Result<Self, SortError> {
        let buffer_capacity = (memory_budget / RECORD_SIZE as u64) as usize;
        if buffer_capacity == 0 {
            return Err(SortError::Budget { budget: memory_budget });
        }

        return Ok(PolyphaseSorter {
            buffer_capacity,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
        });
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts the input file into the output file.
    ///
    /// Splits the input into memory-sized sorted runs, distributes them across
    /// the three auxiliary slots and merges the slots until a single ascending
    /// sequence remains, which is then moved to `output`. All temporary files
    /// are removed on success. Failures are fatal and leave the output path in
    /// an unspecified state.
    pub fn sort(&self, input: &Path, output: &Path) -> Result<SortMetrics, SortError> {
        let runs = self.build_runs(input)?;
        let run_count = runs.len();
        log::info!("input split into {} sorted runs", run_count);

        let slots = [
            self.tmp_dir.path().join("aux-0.txt"),
            self.tmp_dir.path().join("aux-1.txt"),
            self.tmp_dir.path().join("aux-2.txt"),
        ];
        let run_paths = Vec::from_iter(runs.iter().map(|run| run.path().to_path_buf()));
        distribute(&run_paths, &slots)?;
        // run files are no longer needed once concatenated into the slots
        drop(runs);

        let mut stats = MergeStats::default();
        let sorted = MergeEngine::new(slots.clone()).run(&mut stats)?;
        log::info!("merge completed after {} passes", stats.merge_passes);

        publish(&sorted, output)?;
        for slot in slots.iter().filter(|slot| *slot != &sorted) {
            fs::remove_file(slot).map_err(|err| SortError::io(slot, err))?;
        }

        Ok(SortMetrics {
            run_count,
            merge_passes: stats.merge_passes,
        })
    }

    fn build_runs(&self, input: &Path) -> Result<Vec<tempfile::NamedTempFile>, SortError> {
        let mut runs = Vec::new();
        let mut buffer = RecordBuffer::new(self.buffer_capacity);

        for record in RecordReader::open(input)? {
            buffer.push(record?);
            if buffer.is_full() {
                runs.push(self.flush_run(&mut buffer)?);
            }
        }
        if !buffer.is_empty() {
            runs.push(self.flush_run(&mut buffer)?);
        }

        Ok(runs)
    }

    fn flush_run(&self, buffer: &mut RecordBuffer) -> Result<tempfile::NamedTempFile, SortError> {
        log::debug!("sorting run of {} records", buffer.len());
        let records = buffer.take_sorted();
        write_run(self.tmp_dir.path(), &records)
    }
}

/// Moves the final sorted file to the output path. Falls back to copy and
/// remove when the rename crosses file systems.
fn publish(sorted: &Path, output: &Path) -> Result<(), SortError> {
    if fs::rename(sorted, output).is_err() {
        fs::copy(sorted, output).map_err(|err| SortError::io(output, err))?;
        fs::remove_file(sorted).map_err(|err| SortError::io(sorted, err))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{PolyphaseSorter, PolyphaseSorterBuilder, SortError};
    use crate::run::{Record, RecordReader, RECORD_SIZE};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_input(dir: &tempfile::TempDir, records: &[Record]) -> PathBuf {
        let path = dir.path().join("input.txt");
        let content: String = records.iter().map(|r| format!("{}\n", r)).collect();
        fs::write(&path, content).unwrap();
        path
    }

    fn read_output(path: &Path) -> Vec<Record> {
        RecordReader::open(path).unwrap().map(Result::unwrap).collect()
    }

    fn sorter(dir: &tempfile::TempDir, budget: u64) -> PolyphaseSorter {
        PolyphaseSorterBuilder::new()
            .with_memory_budget(budget)
            .with_tmp_dir(dir.path())
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::one_record_at_a_time(RECORD_SIZE as u64)]
    #[case::several_runs(8 * RECORD_SIZE as u64)]
    #[case::single_run(1024 * 1024)]
    fn test_sort_shuffled_input(tmp_dir: tempfile::TempDir, #[case] budget: u64) {
        let expected = Vec::from_iter(0..100);
        let mut shuffled = expected.clone();
        shuffled.shuffle(&mut rand::thread_rng());

        let input = write_input(&tmp_dir, &shuffled);
        let output = tmp_dir.path().join("sorted.txt");

        sorter(&tmp_dir, budget).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), expected);
    }

    #[rstest]
    fn test_multiset_preserved_with_duplicates(tmp_dir: tempfile::TempDir) {
        let mut records: Vec<Record> = (0..30).map(|n| n % 7).collect();
        records.shuffle(&mut rand::thread_rng());

        let input = write_input(&tmp_dir, &records);
        let output = tmp_dir.path().join("sorted.txt");

        sorter(&tmp_dir, 4 * RECORD_SIZE as u64).sort(&input, &output).unwrap();

        let mut expected = records.clone();
        expected.sort_unstable();
        assert_eq!(read_output(&output), expected);
    }

    #[rstest]
    fn test_empty_input(tmp_dir: tempfile::TempDir) {
        let input = write_input(&tmp_dir, &[]);
        let output = tmp_dir.path().join("sorted.txt");

        let metrics = sorter(&tmp_dir, 1024).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), Vec::<Record>::new());
        assert_eq!(metrics.run_count, 0);
    }

    #[rstest]
    fn test_single_record(tmp_dir: tempfile::TempDir) {
        let input = write_input(&tmp_dir, &[42]);
        let output = tmp_dir.path().join("sorted.txt");

        sorter(&tmp_dir, 1024).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), vec![42]);
    }

    #[rstest]
    fn test_sorted_input_is_unchanged(tmp_dir: tempfile::TempDir) {
        let records = Vec::from_iter(0..50);
        let input = write_input(&tmp_dir, &records);
        let output = tmp_dir.path().join("sorted.txt");

        sorter(&tmp_dir, 8 * RECORD_SIZE as u64).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), records);
    }

    #[rstest]
    fn test_input_of_exactly_one_block(tmp_dir: tempfile::TempDir) {
        let records = vec![9, 7, 5, 3];
        let input = write_input(&tmp_dir, &records);
        let output = tmp_dir.path().join("sorted.txt");

        let metrics = sorter(&tmp_dir, 4 * RECORD_SIZE as u64).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), vec![3, 5, 7, 9]);
        assert_eq!(metrics.run_count, 1);
    }

    #[rstest]
    fn test_single_run_scenario(tmp_dir: tempfile::TempDir) {
        let input = write_input(&tmp_dir, &[5, 3, 3, 1, 4]);
        let output = tmp_dir.path().join("sorted.txt");

        let metrics = sorter(&tmp_dir, 1024).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), vec![1, 3, 3, 4, 5]);
        assert_eq!(metrics.run_count, 1);
    }

    #[rstest]
    fn test_three_run_scenario(tmp_dir: tempfile::TempDir) {
        // budget of three records forces three runs, one per auxiliary slot
        let input = write_input(&tmp_dir, &[9, 3, 6, 1, 7, 4, 8, 2, 5]);
        let output = tmp_dir.path().join("sorted.txt");

        let metrics = sorter(&tmp_dir, 3 * RECORD_SIZE as u64).sort(&input, &output).unwrap();

        assert_eq!(read_output(&output), Vec::from_iter(1..=9));
        assert_eq!(metrics.run_count, 3);
        assert!(metrics.merge_passes >= 2);
    }

    #[rstest]
    fn test_budget_does_not_change_result(tmp_dir: tempfile::TempDir) {
        let mut records = Vec::from_iter(-50..50);
        records.shuffle(&mut rand::thread_rng());
        let input = write_input(&tmp_dir, &records);

        let small = tmp_dir.path().join("sorted-small.txt");
        let large = tmp_dir.path().join("sorted-large.txt");
        sorter(&tmp_dir, 2 * RECORD_SIZE as u64).sort(&input, &small).unwrap();
        sorter(&tmp_dir, 1024 * 1024).sort(&input, &large).unwrap();

        assert_eq!(read_output(&small), read_output(&large));
    }

    #[rstest]
    #[case(0)]
    #[case(RECORD_SIZE as u64 - 1)]
    fn test_budget_too_small_is_rejected(tmp_dir: tempfile::TempDir, #[case] budget: u64) {
        let result = PolyphaseSorterBuilder::new()
            .with_memory_budget(budget)
            .with_tmp_dir(tmp_dir.path())
            .build();

        match result {
            Err(SortError::Budget { budget: reported }) => assert_eq!(reported, budget),
            _ => panic!("expected a budget error"),
        }
    }

    #[rstest]
    fn test_malformed_input_aborts(tmp_dir: tempfile::TempDir) {
        let input = tmp_dir.path().join("input.txt");
        fs::write(&input, "1\nnot-a-number\n3\n").unwrap();
        let output = tmp_dir.path().join("sorted.txt");

        let result = sorter(&tmp_dir, 1024).sort(&input, &output);
        assert!(matches!(result, Err(SortError::Parse { line: 2, .. })));
    }

    #[rstest]
    fn test_temporary_files_are_cleaned_up(tmp_dir: tempfile::TempDir) {
        let input = write_input(&tmp_dir, &[3, 1, 2]);
        let output = tmp_dir.path().join("sorted.txt");

        let sorter = sorter(&tmp_dir, RECORD_SIZE as u64);
        let work_dir = sorter.tmp_dir.path().to_path_buf();
        sorter.sort(&input, &output).unwrap();

        let leftovers = fs::read_dir(&work_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
