//! Trial parser and normalizer.
//!
//! Turns a loaded [`Trial`] into a [`NormalizedTrial`]: analyte, sensor
//! ceiling, phase windows, per-channel baseline and the normalized series
//! `(raw - baseline) / baseline`.

use crate::core::analyte::{Analyte, AnalyteProfile};
use crate::core::stats;
use crate::core::windowing::{Period, PeriodMasks, WindowError, DEFAULT_BASELINE_WINDOW};
use crate::error::{Error, Result};
use crate::trial::loader::load_trial;
use crate::trial::types::{Trial, SENSOR_COUNT};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

/// Sensor ceiling of the standard firmware.
pub const STANDARD_SENSOR_CEILING: i64 = 1_000_000;

/// Sensor ceiling used when any channel reads above the standard one.
pub const EXTENDED_SENSOR_CEILING: i64 = 2_000_000;

/// A trial with its derived baseline and normalized series. Immutable once
/// built.
#[derive(Debug, Clone)]
pub struct NormalizedTrial {
    pub trial: Trial,
    pub analyte: Analyte,
    /// Either [`STANDARD_SENSOR_CEILING`] or [`EXTENDED_SENSOR_CEILING`]
    pub max_sensor_value: i64,
    pub periods: PeriodMasks,
    /// Per-channel median over the baseline window
    pub baseline: [f64; SENSOR_COUNT],
    /// Per-row, per-channel normalized values
    pub normalized: Vec<[f64; SENSOR_COUNT]>,
}

impl NormalizedTrial {
    pub fn file_name(&self) -> &str {
        &self.trial.file_name
    }

    pub fn profile(&self) -> &'static AnalyteProfile {
        self.analyte.profile()
    }

    /// Channels whose baseline sits at the sensor ceiling.
    pub fn saturation(&self) -> [bool; SENSOR_COUNT] {
        let ceiling = self.max_sensor_value as f64;
        self.baseline.map(|b| b == ceiling)
    }

    pub fn saturated_count(&self) -> usize {
        self.saturation().iter().filter(|&&s| s).count()
    }

    /// Normalized values of one channel restricted to a period.
    pub fn period_values(&self, period: Period, channel: usize) -> Vec<f64> {
        self.periods
            .rows(period)
            .into_iter()
            .map(|row| self.normalized[row][channel])
            .collect()
    }

    /// Per-channel sample standard deviation of normalized values within a
    /// period. `NaN` for channels with fewer than two rows in the period.
    pub fn period_std(&self, period: Period) -> [f64; SENSOR_COUNT] {
        let rows = self.periods.rows(period);
        std::array::from_fn(|channel| {
            let values: Vec<f64> = rows.iter().map(|&r| self.normalized[r][channel]).collect();
            stats::sample_std(&values)
        })
    }

    /// Per-channel sign of (last - first) normalized value within a period.
    pub fn direction(&self, period: Period) -> Result<[i8; SENSOR_COUNT]> {
        let rows = self.periods.rows(period);
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => {
                return Err(Error::EmptyPhase {
                    file: self.trial.file_name.clone(),
                    period,
                })
            }
        };
        Ok(std::array::from_fn(|channel| {
            stats::sign(self.normalized[last][channel] - self.normalized[first][channel])
        }))
    }

    /// Humidity readings of the rows in a period.
    pub fn humidity_in(&self, period: Period) -> Vec<f64> {
        self.periods
            .rows(period)
            .into_iter()
            .map(|row| self.trial.rows[row].humidity)
            .collect()
    }
}

/// Parses trial files into [`NormalizedTrial`]s.
#[derive(Debug, Clone)]
pub struct TrialNormalizer {
    baseline_window: Duration,
    span: Span,
}

impl Default for TrialNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl TrialNormalizer {
    pub fn new(baseline_window: Duration) -> Self {
        Self {
            baseline_window,
            span: tracing::info_span!("parser"),
        }
    }

    pub fn baseline_window(&self) -> Duration {
        self.baseline_window
    }

    /// Load and normalize one trial file.
    pub fn parse(&self, path: &Path) -> Result<NormalizedTrial> {
        let trial = load_trial(path)?;
        self.normalize(trial)
    }

    /// Normalize an already loaded trial.
    pub fn normalize(&self, trial: Trial) -> Result<NormalizedTrial> {
        let _guard = self.span.enter();
        let file = trial.file_name.clone();

        let analyte = detect_analyte(&trial)?;
        tracing::info!(file = %file, %analyte, "analyte identified");

        if let Some((row, channel)) = trial.first_null_sensor() {
            return Err(Error::MissingSensorValue {
                file,
                channel: channel + 1,
                row,
            });
        }

        let max_sensor_value = max_sensor_value(&trial);
        let periods = PeriodMasks::compute(&trial, analyte.profile(), self.baseline_window)
            .map_err(|e| window_error(&file, e))?;

        let baseline_rows = periods.rows(Period::Baseline);
        if baseline_rows.is_empty() {
            return Err(Error::InsufficientBaseline {
                file,
                reason: "no baseline-labeled row in the window before exposure".to_string(),
            });
        }

        let baseline: [f64; SENSOR_COUNT] = std::array::from_fn(|channel| {
            let values: Vec<f64> = baseline_rows
                .iter()
                .map(|&r| raw(&trial, r, channel))
                .collect();
            stats::median(&values)
        });

        if let Some(channel) = baseline.iter().position(|&b| b == 0.0) {
            return Err(Error::DivideByZeroBaseline {
                file,
                channel: channel + 1,
            });
        }

        let normalized = (0..trial.len())
            .map(|row| {
                std::array::from_fn(|channel| {
                    (raw(&trial, row, channel) - baseline[channel]) / baseline[channel]
                })
            })
            .collect();

        tracing::debug!(
            file = %file,
            max_sensor_value,
            baseline_rows = baseline_rows.len(),
            exposure_rows = periods.count(Period::Exposure),
            recovery_rows = periods.count(Period::Recovery),
            "trial normalized"
        );

        Ok(NormalizedTrial {
            trial,
            analyte,
            max_sensor_value,
            periods,
            baseline,
            normalized,
        })
    }
}

/// Analyte named by the first row's run_name.
pub fn detect_analyte(trial: &Trial) -> Result<Analyte> {
    let run_name = trial.run_name().unwrap_or_default();
    Analyte::detect(run_name).ok_or_else(|| Error::AnalyteNotFound {
        file: trial.file_name.clone(),
        run_name: run_name.to_string(),
    })
}

/// Sensor ceiling for the whole trial, shared by every channel.
pub fn max_sensor_value(trial: &Trial) -> i64 {
    let exceeds = trial
        .rows
        .iter()
        .flat_map(|r| r.sensors.iter().flatten())
        .any(|&v| v > STANDARD_SENSOR_CEILING);
    if exceeds {
        EXTENDED_SENSOR_CEILING
    } else {
        STANDARD_SENSOR_CEILING
    }
}

fn raw(trial: &Trial, row: usize, channel: usize) -> f64 {
    trial.rows[row].sensors[channel].unwrap_or_default() as f64
}

fn window_error(file: &str, err: WindowError) -> Error {
    match err {
        WindowError::NoExposure => Error::InsufficientBaseline {
            file: file.to_string(),
            reason: "no exposure-labeled row to anchor the baseline window".to_string(),
        },
        WindowError::BadInterval(interval) => Error::TrialFormat {
            file: file.to_string(),
            message: format!("cannot derive a row interval from seconds ({interval:?})"),
        },
    }
}
