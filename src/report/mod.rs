//! Run reports and store statistics
//!
//! This module handles:
//! - Counting what one source run discovered, saved, skipped and failed
//! - Summarizing the record stores on disk for `--stats`

mod run;
pub mod stats;

pub use run::{print_run_report, RunReport};
pub use stats::{load_statistics, print_statistics, StoreStatistics};
