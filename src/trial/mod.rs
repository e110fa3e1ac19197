//! Trial input for the analyte quality pipeline.
//!
//! This module provides the typed row model of a trial recording and the
//! CSV loader that produces it.

pub mod loader;
pub mod types;

// Re-export commonly used types
pub use loader::{file_name_of, list_trial_files, load_trial, read_header};
pub use types::{sensor_columns, Trial, TrialRow, SENSOR_COUNT};
