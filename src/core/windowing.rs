//! Row-wise phase windows of a trial.
//!
//! Exposure and recovery windows are plain label membership. The baseline
//! window is anchored on the first exposure row: only baseline-labeled rows
//! within the configured span before that row belong to it.

use crate::core::analyte::AnalyteProfile;
use crate::trial::types::Trial;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default span of the pre-exposure baseline window (10 minutes).
pub const DEFAULT_BASELINE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// The three phases a trial row can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Baseline,
    Exposure,
    Recovery,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Baseline, Period::Exposure, Period::Recovery];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Baseline => "baseline",
            Period::Exposure => "exposure",
            Period::Recovery => "recovery",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean row masks, one entry per trial row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodMasks {
    pub baseline: Vec<bool>,
    pub exposure: Vec<bool>,
    pub recovery: Vec<bool>,
}

/// Why a baseline window could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// Fewer than two rows, or a non-positive sampling interval
    BadInterval(Option<i64>),
    /// No row carries an exposure label
    NoExposure,
}

impl PeriodMasks {
    /// Compute the three masks of a trial.
    pub fn compute(
        trial: &Trial,
        profile: &AnalyteProfile,
        baseline_window: Duration,
    ) -> Result<Self, WindowError> {
        let exposure = label_mask(trial, profile.exposure_labels);
        let recovery = label_mask(trial, profile.recovery_labels);
        let labeled_baseline = label_mask(trial, profile.baseline_labels);

        let interval = match trial.row_interval_seconds() {
            Some(i) if i > 0 => i,
            other => return Err(WindowError::BadInterval(other)),
        };
        let first_exposure = exposure
            .iter()
            .position(|&e| e)
            .ok_or(WindowError::NoExposure)?;

        let window_rows = window_rows(baseline_window, interval);
        let start = first_exposure.saturating_sub(window_rows);

        let baseline = labeled_baseline
            .iter()
            .enumerate()
            .map(|(row, &labeled)| labeled && row >= start && row < first_exposure)
            .collect();

        Ok(Self {
            baseline,
            exposure,
            recovery,
        })
    }

    pub fn mask(&self, period: Period) -> &[bool] {
        match period {
            Period::Baseline => &self.baseline,
            Period::Exposure => &self.exposure,
            Period::Recovery => &self.recovery,
        }
    }

    /// Row indices selected by a period's mask.
    pub fn rows(&self, period: Period) -> Vec<usize> {
        self.mask(period)
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| m.then_some(i))
            .collect()
    }

    pub fn count(&self, period: Period) -> usize {
        self.mask(period).iter().filter(|&&m| m).count()
    }

    /// Index of the first exposure row.
    pub fn first_exposure_row(&self) -> Option<usize> {
        self.exposure.iter().position(|&e| e)
    }
}

/// Number of rows covering `window` at the given sampling interval.
pub fn window_rows(window: Duration, interval_secs: i64) -> usize {
    if interval_secs <= 0 {
        return 0;
    }
    (window.as_secs() / interval_secs as u64) as usize
}

fn label_mask(trial: &Trial, labels: &[&str]) -> Vec<bool> {
    trial
        .labels()
        .map(|l| l.is_some_and(|l| labels.contains(&l)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analyte::Analyte;
    use crate::trial::types::{TrialRow, SENSOR_COUNT};
    use chrono::DateTime;

    fn trial(labels: &[&str], interval: i64) -> Trial {
        let rows = labels
            .iter()
            .enumerate()
            .map(|(i, label)| TrialRow {
                seconds: i as i64 * interval,
                frequency: 1.0 / interval as f64,
                temperature: 25.0,
                humidity: 40.0,
                timestamp: DateTime::from_timestamp(i as i64 * interval, 0).unwrap(),
                sensor_module_id: "123456_1234_1234567".to_string(),
                dataset: "lab-proj-v1".to_string(),
                run_name: "IAS_1_2_proj_no2_a".to_string(),
                trial_id: None,
                session_id: "x".to_string(),
                label: Some(label.to_string()),
                sensors: [Some(1000); SENSOR_COUNT],
            })
            .collect();
        Trial {
            file_name: "t.csv".to_string(),
            columns: vec![],
            rows,
        }
    }

    #[test]
    fn test_baseline_window_is_limited_before_exposure() {
        // 5 baseline rows at 60s intervals, window of 3 minutes = 3 rows
        let t = trial(
            &["baseline", "baseline", "baseline", "baseline", "baseline", "exposure", "recovery"],
            60,
        );
        let masks =
            PeriodMasks::compute(&t, Analyte::No2.profile(), Duration::from_secs(180)).unwrap();

        assert_eq!(masks.rows(Period::Baseline), vec![2, 3, 4]);
        assert_eq!(masks.rows(Period::Exposure), vec![5]);
        assert_eq!(masks.rows(Period::Recovery), vec![6]);
    }

    #[test]
    fn test_baseline_never_after_first_exposure() {
        let t = trial(&["baseline", "exposure", "baseline", "recovery"], 1);
        let masks = PeriodMasks::compute(&t, Analyte::No2.profile(), DEFAULT_BASELINE_WINDOW)
            .unwrap();
        assert_eq!(masks.rows(Period::Baseline), vec![0]);
    }

    #[test]
    fn test_short_pre_exposure_keeps_all_baseline_rows() {
        let t = trial(&["baseline", "baseline", "exposure"], 1);
        let masks = PeriodMasks::compute(&t, Analyte::No2.profile(), DEFAULT_BASELINE_WINDOW)
            .unwrap();
        assert_eq!(masks.count(Period::Baseline), 2);
        assert_eq!(masks.first_exposure_row(), Some(2));
    }

    #[test]
    fn test_no_exposure_is_an_error() {
        let t = trial(&["baseline", "baseline", "recovery"], 1);
        let err = PeriodMasks::compute(&t, Analyte::No2.profile(), DEFAULT_BASELINE_WINDOW)
            .unwrap_err();
        assert_eq!(err, WindowError::NoExposure);
    }

    #[test]
    fn test_ethanol_exposure_sub_phases() {
        let t = trial(&["baseline", "low", "med", "high", "recovery"], 1);
        let masks =
            PeriodMasks::compute(&t, Analyte::Ethanol.profile(), DEFAULT_BASELINE_WINDOW)
                .unwrap();
        assert_eq!(masks.rows(Period::Exposure), vec![1, 2, 3]);
    }

    #[test]
    fn test_window_rows() {
        assert_eq!(window_rows(DEFAULT_BASELINE_WINDOW, 1), 600);
        assert_eq!(window_rows(DEFAULT_BASELINE_WINDOW, 7), 85);
        assert_eq!(window_rows(DEFAULT_BASELINE_WINDOW, 0), 0);
    }
}
