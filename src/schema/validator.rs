//! Structural validation of trial files.
//!
//! Checks run in a fixed order and the first violation rejects the trial:
//! column presence, constant metadata, time columns, humidity/temperature
//! ranges, identifier formats, sensor channels, then labels.

use crate::core::analyte::Analyte;
use crate::core::normalize::{detect_analyte, max_sensor_value};
use crate::error::{Error, Result, SchemaViolation};
use crate::trial::loader::{file_name_of, load_trial, read_header};
use crate::trial::types::{sensor_columns, Trial, SENSOR_COUNT};
use std::path::Path;
use tracing::Span;
use uuid::Uuid;

/// Metadata columns every trial file must carry, before `s1..s32`.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "seconds",
    "frequency",
    "temperature",
    "humidity",
    "timestamp_ms",
    "sensor_module_id",
    "dataset",
    "run_name",
    "trial_id",
    "session_id",
    "label",
];

/// Columns whose value must not change within a trial.
pub const CONSTANT_COLUMNS: [&str; 6] = [
    "frequency",
    "sensor_module_id",
    "dataset",
    "run_name",
    "trial_id",
    "session_id",
];

pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 150.0);

const MODULE_ID_LENGTHS: [usize; 3] = [6, 4, 7];
const FREQUENCY_TOLERANCE: f64 = 1e-9;

/// Validates trial files against the fixed schema.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    span: Span,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("schema"),
        }
    }

    /// Validate one file. Returns the trial's analyte when every check
    /// passes.
    pub fn validate(&self, path: &Path) -> Result<Analyte> {
        let _guard = self.span.enter();
        let file = file_name_of(path);
        tracing::info!(file = %file, "====STARTING====");

        let header = read_header(path)?;
        check_columns(&header).map_err(|violation| Error::Schema {
            file: file.clone(),
            violation,
        })?;

        let trial = load_trial(path)?;
        let analyte = self.validate_trial(&trial)?;
        tracing::info!(file = %file, %analyte, "====SCHEMA CHECKS COMPLETE!====");
        Ok(analyte)
    }

    /// Validate an already loaded trial.
    pub fn validate_trial(&self, trial: &Trial) -> Result<Analyte> {
        let analyte = detect_analyte(trial)?;
        let schema_error = |violation| Error::Schema {
            file: trial.file_name.clone(),
            violation,
        };

        check_columns(&trial.columns).map_err(schema_error)?;
        if trial.len() < 2 {
            return Err(Error::TrialFormat {
                file: trial.file_name.clone(),
                message: "fewer than two rows".to_string(),
            });
        }

        check_constant_columns(trial)
            .and_then(|_| check_time_columns(trial))
            .and_then(|_| check_ranges(trial))
            .and_then(|_| check_formats(trial))
            .and_then(|_| check_sensors(trial))
            .and_then(|_| check_labels(trial, analyte))
            .map_err(schema_error)?;

        Ok(analyte)
    }
}

type Check = std::result::Result<(), SchemaViolation>;

/// Every required column is present.
pub fn check_columns(columns: &[String]) -> Check {
    let required = REQUIRED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(sensor_columns());
    for column in required {
        if !columns.contains(&column) {
            return Err(SchemaViolation::MissingColumn(column));
        }
    }
    Ok(())
}

fn is_constant<T: PartialEq>(values: impl IntoIterator<Item = T>) -> bool {
    let mut values = values.into_iter();
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

pub fn check_constant_columns(trial: &Trial) -> Check {
    let rows = &trial.rows;
    for column in CONSTANT_COLUMNS {
        let constant = match column {
            "frequency" => is_constant(rows.iter().map(|r| r.frequency)),
            "sensor_module_id" => is_constant(rows.iter().map(|r| &r.sensor_module_id)),
            "dataset" => is_constant(rows.iter().map(|r| &r.dataset)),
            "run_name" => is_constant(rows.iter().map(|r| &r.run_name)),
            "trial_id" => is_constant(rows.iter().map(|r| &r.trial_id)),
            _ => is_constant(rows.iter().map(|r| &r.session_id)),
        };
        if !constant {
            return Err(SchemaViolation::NonConstantColumn(column.to_string()));
        }
    }
    Ok(())
}

/// `seconds` increases, `frequency` matches the sampling interval and the
/// timestamps advance with `seconds`.
pub fn check_time_columns(trial: &Trial) -> Check {
    let rows = &trial.rows;
    if rows.windows(2).any(|w| w[1].seconds < w[0].seconds) {
        return Err(SchemaViolation::SecondsNotIncreasing);
    }

    let delta_seconds = rows[1].seconds - rows[0].seconds;
    let frequency = rows[0].frequency;
    let expected = 1.0 / delta_seconds as f64;
    let tolerance = FREQUENCY_TOLERANCE * expected.abs().max(frequency.abs());
    if !expected.is_finite() || (frequency - expected).abs() > tolerance {
        return Err(SchemaViolation::FrequencyMismatch {
            frequency,
            delta_seconds,
        });
    }

    for i in 1..rows.len() {
        let seconds = rows[i].seconds - rows[i - 1].seconds;
        let elapsed = (rows[i].timestamp - rows[i - 1].timestamp).num_seconds();
        if seconds != elapsed {
            return Err(SchemaViolation::TimestampDrift(i));
        }
    }
    Ok(())
}

fn within(values: impl Iterator<Item = f64>, (low, high): (f64, f64)) -> bool {
    values.into_iter().all(|v| v >= low && v <= high)
}

pub fn check_ranges(trial: &Trial) -> Check {
    if !within(trial.rows.iter().map(|r| r.humidity), HUMIDITY_RANGE) {
        return Err(SchemaViolation::HumidityOutOfRange);
    }
    if !within(trial.rows.iter().map(|r| r.temperature), TEMPERATURE_RANGE) {
        return Err(SchemaViolation::TemperatureOutOfRange);
    }
    Ok(())
}

/// Identifier formats of `sensor_module_id`, `dataset`, `run_name` and
/// `session_id`, read from the first row.
pub fn check_formats(trial: &Trial) -> Check {
    let first = &trial.rows[0];

    let module_id: Vec<&str> = first.sensor_module_id.split('_').collect();
    if module_id.len() != 3 {
        return Err(SchemaViolation::ModuleIdSegments);
    }
    let lengths_ok = module_id
        .iter()
        .zip(MODULE_ID_LENGTHS)
        .all(|(segment, len)| segment.chars().count() == len);
    if !lengths_ok {
        return Err(SchemaViolation::ModuleIdLengths);
    }
    if let Some(segment) = module_id
        .iter()
        .find(|s| !s.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(SchemaViolation::ModuleIdNotNumeric(segment.to_string()));
    }

    let dataset: Vec<&str> = first.dataset.split('-').collect();
    if dataset.len() != 3 {
        return Err(SchemaViolation::DatasetSegments);
    }

    let run_name: Vec<&str> = first.run_name.split('_').collect();
    if run_name.len() != 6 {
        return Err(SchemaViolation::RunNameSegments);
    }
    if dataset[1].to_lowercase() != run_name[3].to_lowercase() {
        return Err(SchemaViolation::ProjectMismatch);
    }

    if !is_uuid4(&first.session_id) {
        return Err(SchemaViolation::SessionIdNotUuid4(first.session_id.clone()));
    }
    Ok(())
}

/// Whether `s` is a version-4 UUID.
pub fn is_uuid4(s: &str) -> bool {
    Uuid::parse_str(s).is_ok_and(|u| u.get_version_num() == 4)
}

/// Sensor channels have no nulls, no non-positive values and vary unless
/// pinned at the sensor ceiling.
pub fn check_sensors(trial: &Trial) -> Check {
    for channel in 0..SENSOR_COUNT {
        if trial.channel(channel).any(|v| v.is_none()) {
            return Err(SchemaViolation::SensorNull(channel + 1));
        }
    }
    for channel in 0..SENSOR_COUNT {
        if trial.channel(channel).flatten().any(|v| v <= 0) {
            return Err(SchemaViolation::SensorNonPositive(channel + 1));
        }
    }

    let ceiling = max_sensor_value(trial);
    for channel in 0..SENSOR_COUNT {
        let values: Vec<i64> = trial.channel(channel).flatten().collect();
        if is_constant(values.iter()) && values.first() != Some(&ceiling) {
            return Err(SchemaViolation::SensorConstant(channel + 1));
        }
    }
    Ok(())
}

/// Labels are present and belong to the analyte's phase vocabulary.
pub fn check_labels(trial: &Trial, analyte: Analyte) -> Check {
    if trial.labels().any(|l| l.is_none()) {
        return Err(SchemaViolation::LabelNull);
    }

    let mut found: Vec<String> = Vec::new();
    for label in trial.labels().flatten() {
        if !found.iter().any(|f| f == label) {
            found.push(label.to_string());
        }
    }

    let profile = analyte.profile();
    if !found.iter().all(|l| profile.is_known_phase(l)) {
        return Err(SchemaViolation::UnknownLabels {
            expected: profile.phases.iter().map(|p| p.to_string()).collect(),
            found,
        });
    }
    Ok(())
}
