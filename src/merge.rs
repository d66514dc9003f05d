//! Rotating polyphase merge engine.
//!
//! The engine owns the three auxiliary slots produced by the distributor and
//! merges them pass by pass until a single ascending sequence remains. Each
//! pass merges runs pairwise from two input slots into the third (a min-heap
//! keyed by record value picks the next record, run boundaries are detected by
//! descent) and stops as soon as one input is exhausted. Merged runs are
//! appended, so runs the distributor placed in the output slot stay intact
//! until a later pass consumes them. A fully consumed slot is truncated and
//! becomes the next output; the previous output becomes the left input and the
//! surviving input keeps its read position as the right input.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs;
use std::path::{Path, PathBuf};

use log;

use crate::run::{Record, RecordReader, RecordWriter};
use crate::sort::SortError;
use crate::validate::is_ascending;

/// Merge pass counters, passed into the engine for observability.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeStats {
    /// Number of merge passes performed.
    pub merge_passes: u64,
}

/// A record stream with one record of lookahead, used to detect where the
/// current run of a slot ends.
struct RunReader {
    inner: RecordReader,
    head: Option<Record>,
}

impl RunReader {
    fn open(path: &Path) -> Result<Self, SortError> {
        let mut inner = RecordReader::open(path)?;
        let head = inner.next().transpose()?;
        Ok(RunReader { inner, head })
    }

    fn head(&self) -> Option<Record> {
        self.head
    }

    fn exhausted(&self) -> bool {
        self.head.is_none()
    }

    /// Consumes the head record and buffers the next one.
    fn advance(&mut self) -> Result<(), SortError> {
        self.head = self.inner.next().transpose()?;
        Ok(())
    }
}

/// Merges the current run of each non-exhausted input into one ascending run
/// on the output. A record whose successor is smaller ends its source's run;
/// the successor stays buffered for a later run.
fn merge_run(left: &mut RunReader, right: &mut RunReader, out: &mut RecordWriter) -> Result<(), SortError> {
    let sources = [left, right];
    let mut heap: BinaryHeap<(Reverse<Record>, usize)> = BinaryHeap::with_capacity(2);

    for (idx, source) in sources.iter().enumerate() {
        if let Some(record) = source.head() {
            heap.push((Reverse(record), idx));
        }
    }

    while let Some((Reverse(record), idx)) = heap.pop() {
        out.write_record(record)?;
        sources[idx].advance()?;
        if let Some(next) = sources[idx].head() {
            if next >= record {
                heap.push((Reverse(next), idx));
            }
        }
    }

    Ok(())
}

/// One merge pass: merges runs pairwise until either input is exhausted.
/// An input that is already empty contributes nothing, so a pass against an
/// empty slot moves exactly one run.
fn merge_pass(left: &mut RunReader, right: &mut RunReader, out: &mut RecordWriter) -> Result<(), SortError> {
    loop {
        if left.exhausted() && right.exhausted() {
            break;
        }

        merge_run(left, right, out)?;

        if left.exhausted() || right.exhausted() {
            break;
        }
    }

    Ok(())
}

struct Slot {
    path: PathBuf,
    /// Open reader holding the position of the first unconsumed run, if the
    /// slot was partially read by a previous pass.
    reader: Option<RunReader>,
}

/// The merge-loop state machine over the three auxiliary slots.
pub struct MergeEngine {
    slots: [Slot; 3],
}

impl MergeEngine {
    /// Creates an engine over three existing auxiliary files. Files may be
    /// empty but must exist.
    pub fn new(slots: [PathBuf; 3]) -> Self {
        MergeEngine {
            slots: slots.map(|path| Slot { path, reader: None }),
        }
    }

    /// Runs merge passes, rotating slot roles, until the whole sequence ends
    /// up in one slot in ascending order. Returns the path of that slot.
    pub fn run(&mut self, stats: &mut MergeStats) -> Result<PathBuf, SortError> {
        let (mut left, mut right, mut out) = (0_usize, 1_usize, 2_usize);

        loop {
            stats.merge_passes += 1;
            log::debug!(
                "merge pass {}: {} + {} -> {}",
                stats.merge_passes,
                self.slots[left].path.display(),
                self.slots[right].path.display(),
                self.slots[out].path.display(),
            );

            let mut left_reader = self.take_reader(left)?;
            let mut right_reader = self.take_reader(right)?;
            let mut writer = RecordWriter::append(&self.slots[out].path)?;

            merge_pass(&mut left_reader, &mut right_reader, &mut writer)?;
            writer.finish()?;

            let left_done = left_reader.exhausted();
            let right_done = right_reader.exhausted();

            // A consumed slot holds only dead bytes; truncate it right away so
            // slot contents always equal live records. A surviving input keeps
            // its reader, and with it the position of its next unconsumed run.
            if left_done {
                self.truncate(left)?;
            } else {
                self.slots[left].reader = Some(left_reader);
            }
            if right_done {
                self.truncate(right)?;
            } else {
                self.slots[right].reader = Some(right_reader);
            }

            if left_done && right_done && is_ascending(&self.slots[out].path)? {
                return Ok(self.slots[out].path.clone());
            }

            // Rotation: the freed slot becomes the next output, the previous
            // output the next left input, the survivor the next right input.
            let freed = if right_done { right } else { left };
            let survivor = left + right - freed;
            (left, right, out) = (out, survivor, freed);
        }
    }

    fn take_reader(&mut self, idx: usize) -> Result<RunReader, SortError> {
        match self.slots[idx].reader.take() {
            Some(reader) => Ok(reader),
            None => RunReader::open(&self.slots[idx].path),
        }
    }

    fn truncate(&mut self, idx: usize) -> Result<(), SortError> {
        self.slots[idx].reader = None;
        let path = &self.slots[idx].path;
        fs::File::create(path).map_err(|err| SortError::io(path, err))?;
        Ok(())
    }
}
