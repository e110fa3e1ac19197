//! Error types for the analyte quality pipeline.
//!
//! Per-trial errors are caught at the corpus-loop boundary in
//! [`crate::pipeline`]; run-level errors (`InputPath`, `EmptyCorpus`,
//! `ProfileMissing`) abort the run.

use crate::config::ConfigError;
use crate::core::analyte::Analyte;
use crate::core::windowing::Period;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// An input or output folder does not exist
    #[error("Input folder {} does not exist", path.display())]
    InputPath { path: PathBuf },

    /// No known analyte token in the trial's run_name
    #[error("{file}: analyte label not found in run_name '{run_name}'")]
    AnalyteNotFound { file: String, run_name: String },

    /// No exposure row to anchor the baseline window, or an empty window
    #[error("{file}: insufficient baseline ({reason})")]
    InsufficientBaseline { file: String, reason: String },

    /// A baseline channel is zero, so normalization is undefined
    #[error("{file}: baseline of s{channel} is zero")]
    DivideByZeroBaseline { file: String, channel: usize },

    /// A sensor cell is empty
    #[error("{file}: s{channel} has a missing value at row {row}")]
    MissingSensorValue {
        file: String,
        channel: usize,
        row: usize,
    },

    /// A statistic needed rows from a period that has none
    #[error("{file}: {period} period has no rows")]
    EmptyPhase { file: String, period: Period },

    /// The file cannot be read as a trial
    #[error("{file}: {message}")]
    TrialFormat { file: String, message: String },

    /// A trial's analyte differs from the analyte being aggregated or scored
    #[error("{file}: analyte {found} does not match {expected}")]
    AnalyteMismatch {
        file: String,
        expected: Analyte,
        found: Analyte,
    },

    /// Structural check failure
    #[error("{file}  ---ERROR--- {violation}")]
    Schema {
        file: String,
        violation: SchemaViolation,
    },

    /// Aggregation included no trial
    #[error("No usable trials for {analyte} ({excluded} excluded)")]
    EmptyCorpus { analyte: String, excluded: usize },

    /// No reference profile stored for the analyte
    #[error("No reference profile found for {analyte} under {location}")]
    ProfileMissing { analyte: Analyte, location: String },

    /// A stored reference profile cannot be decoded
    #[error("Reference profile {key}: {message}")]
    ProfileFormat { key: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary blob encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Whether the error is scoped to a single trial, so a corpus loop may
    /// record it and advance to the next file.
    pub fn is_per_trial(&self) -> bool {
        !matches!(
            self,
            Error::InputPath { .. }
                | Error::EmptyCorpus { .. }
                | Error::ProfileMissing { .. }
                | Error::Config(_)
        )
    }
}

/// Structural violations found by the schema validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("Column {0} not found in file")]
    MissingColumn(String),

    #[error("column {0} does not contain constant values")]
    NonConstantColumn(String),

    #[error("seconds series is NOT monotonic increasing")]
    SecondsNotIncreasing,

    #[error("frequency value {frequency} is different from 1/{delta_seconds}")]
    FrequencyMismatch { frequency: f64, delta_seconds: i64 },

    #[error("timestamp difference is different than seconds difference for row {0}")]
    TimestampDrift(usize),

    #[error("humidity outside range")]
    HumidityOutOfRange,

    #[error("temperature outside range")]
    TemperatureOutOfRange,

    #[error("In sensor_module_id: the number of ids is not 3")]
    ModuleIdSegments,

    #[error("In sensor_module_id: sensor_module_id size is not correct, we need ids to have sizes 6, 4 and 7")]
    ModuleIdLengths,

    #[error("In sensor_module_id: {0} is not a number")]
    ModuleIdNotNumeric(String),

    #[error("In dataset col: The number of ids is not 3")]
    DatasetSegments,

    #[error("In run_name col: The number of ids is not 6")]
    RunNameSegments,

    #[error("In run_name col: Project name in run_name and dataset columns doesnt match")]
    ProjectMismatch,

    #[error("{0} is not a UUID4")]
    SessionIdNotUuid4(String),

    #[error("s{0} has NAN values")]
    SensorNull(usize),

    #[error("s{0} has negative or zero values")]
    SensorNonPositive(usize),

    #[error("s{0} has unique values and is not saturated")]
    SensorConstant(usize),

    #[error("Label column has NAN values")]
    LabelNull,

    #[error("Trial_state column contains different values. Expected values: {expected:?} Existing values: {found:?}")]
    UnknownLabels {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// The reason a trial scored 0.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityCheckFailure {
    #[error("Humidity range {range:.3} in {period} window > {limit}")]
    Humidity {
        period: Period,
        range: f64,
        limit: f64,
    },

    #[error("RESPONSE EXPOSURE FAIL: Nb. sensing elements {rule} is {count} (fails when {fail_when})")]
    ResponseExposure {
        rule: String,
        count: usize,
        fail_when: String,
    },

    #[error("Nb of saturated sensors {count} > max nb saturated sensors {max}")]
    SaturationAboveMax { count: usize, max: f64 },

    #[error("Nb of saturated sensors {count} > mean + 2*std ({limit:.3})")]
    SaturationAboveSpread { count: usize, limit: f64 },

    #[error("Baseline variation too large found in sensors {channels:?}")]
    BaselineVariation { channels: Vec<usize> },
}

impl QualityCheckFailure {
    /// Short name of the check that failed.
    pub fn check_name(&self) -> &'static str {
        match self {
            QualityCheckFailure::Humidity { .. } => "humidity",
            QualityCheckFailure::ResponseExposure { .. } => "response_exposure",
            QualityCheckFailure::SaturationAboveMax { .. }
            | QualityCheckFailure::SaturationAboveSpread { .. } => "saturation",
            QualityCheckFailure::BaselineVariation { .. } => "baseline",
        }
    }
}
