//! `polysort` is a polyphase external merge sort for newline-delimited integers.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External
//! sorting is required when the data being sorted do not fit into the main memory (RAM) of a computer and
//! instead must reside in slower external memory, usually a hard disk drive. `polysort` sorts in three
//! stages: the input is split into memory-sized blocks that are sorted in RAM and written out as runs, the
//! runs are distributed across three auxiliary files, and the auxiliary files are merged pass by pass with
//! rotating input/output roles until a single ascending sequence remains. For more information see
//! [Polyphase merge sort](https://en.wikipedia.org/wiki/Polyphase_merge_sort).
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bytesize::MIB;
//! use polysort::PolyphaseSorterBuilder;
//!
//! fn main() {
//!     env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();
//!
//!     let sorter = PolyphaseSorterBuilder::new()
//!         .with_memory_budget(50 * MIB)
//!         .with_tmp_dir(Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     let metrics = sorter.sort(Path::new("input.txt"), Path::new("sorted.txt")).unwrap();
//!     println!("{} runs, {} merge passes", metrics.run_count, metrics.merge_passes);
//! }
//! ```

pub mod buffer;
pub mod distribute;
pub mod generate;
pub mod merge;
pub mod run;
pub mod sort;
pub mod validate;

pub use buffer::RecordBuffer;
pub use merge::{MergeEngine, MergeStats};
pub use run::{Record, RecordReader, RecordWriter};
pub use sort::{PolyphaseSorter, PolyphaseSorterBuilder, SortError, SortMetrics};
pub use validate::is_ascending;
