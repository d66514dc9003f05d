//! Three-way run distribution.

use std::fs;
use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};

use log;

use crate::sort::SortError;

/// Partitions the run files across the three auxiliary slots and concatenates
/// each group, in its original order, into one physical file per slot.
///
/// The first `max(1, n / 3)` runs go to the first slot, the next
/// `max(1, n / 3)` to the second, the remainder to the third. With fewer than
/// three runs the trailing slots are created empty; the merge engine treats an
/// empty slot as a valid "no more records" input.
pub fn distribute<P: AsRef<Path>>(runs: &[P], slots: &[PathBuf; 3]) -> Result<(), SortError> {
    let first = runs.len().div_euclid(3).max(1).min(runs.len());
    let second = runs.len().div_euclid(3).max(1).min(runs.len() - first);

    let (group_a, rest) = runs.split_at(first);
    let (group_b, group_c) = rest.split_at(second);

    log::debug!(
        "distributing {} runs across auxiliary slots as {}/{}/{}",
        runs.len(),
        group_a.len(),
        group_b.len(),
        group_c.len()
    );

    for (slot, group) in slots.iter().zip([group_a, group_b, group_c]) {
        concat_runs(group, slot)?;
    }

    Ok(())
}

fn concat_runs<P: AsRef<Path>>(runs: &[P], slot: &Path) -> Result<(), SortError> {
    let file = fs::File::create(slot).map_err(|err| SortError::io(slot, err))?;
    let mut writer = io::BufWriter::new(file);

    for run in runs {
        let run = run.as_ref();
        let mut reader = fs::File::open(run).map_err(|err| SortError::io(run, err))?;
        io::copy(&mut reader, &mut writer).map_err(|err| SortError::io(slot, err))?;
    }

    writer.flush().map_err(|err| SortError::io(slot, err))
}
