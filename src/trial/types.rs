//! Typed trial rows.
//!
//! A trial is one recording session: an ordered list of rows sampled at a
//! fixed interval, each with 32 integer sensor channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of sensing elements on the array.
pub const SENSOR_COUNT: usize = 32;

/// Names of the sensor columns, `s1..s32`.
pub fn sensor_columns() -> Vec<String> {
    (1..=SENSOR_COUNT).map(|i| format!("s{i}")).collect()
}

/// One sampled row of a trial.
///
/// Sensor cells and labels may be empty in the source file; they are kept as
/// `None` so that null checks can report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    /// Seconds since the start of the trial
    pub seconds: i64,
    /// Sampling frequency in Hz
    pub frequency: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: DateTime<Utc>,
    pub sensor_module_id: String,
    pub dataset: String,
    pub run_name: String,
    pub trial_id: Option<String>,
    pub session_id: String,
    /// Phase marker (baseline, exposure, ...)
    pub label: Option<String>,
    pub sensors: [Option<i64>; SENSOR_COUNT],
}

/// A loaded trial file.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// File name without directory
    pub file_name: String,
    /// Header as read from the file
    pub columns: Vec<String>,
    pub rows: Vec<TrialRow>,
}

impl Trial {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Run name of the first row; analyte detection reads this.
    pub fn run_name(&self) -> Option<&str> {
        self.rows.first().map(|r| r.run_name.as_str())
    }

    /// Seconds between the first two rows.
    pub fn row_interval_seconds(&self) -> Option<i64> {
        match self.rows.as_slice() {
            [first, second, ..] => Some(second.seconds - first.seconds),
            _ => None,
        }
    }

    /// Raw values of one channel (0-based index).
    pub fn channel(&self, index: usize) -> impl Iterator<Item = Option<i64>> + '_ {
        self.rows.iter().map(move |r| r.sensors[index])
    }

    /// Whether any sensor cell of any row is empty.
    pub fn has_null_sensor(&self) -> bool {
        self.rows.iter().any(|r| r.sensors.iter().any(Option::is_none))
    }

    /// First empty sensor cell as `(row, channel)`, both 0-based.
    pub fn first_null_sensor(&self) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row, r)| {
            r.sensors
                .iter()
                .position(Option::is_none)
                .map(|channel| (row, channel))
        })
    }

    pub fn humidity(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.humidity).collect()
    }

    pub fn temperature(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.temperature).collect()
    }

    /// Labels as plain strings, empty cells mapped to `None`.
    pub fn labels(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows.iter().map(|r| r.label.as_deref())
    }
}
