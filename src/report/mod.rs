//! Run reports for the pipeline stages.
//!
//! This module keeps an auditable record of every trial a stage touched:
//! one line per trial in a dated report file, plus counters for the
//! end-of-run summary.

pub mod log;

// Re-export commonly used types
pub use log::{dated_file_name, ReportKind, RunReport, RunStats, FILE_DATE_FORMAT};
