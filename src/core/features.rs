//! Per-trial statistics feeding the corpus aggregator.
//!
//! Everything here is derived from a single [`NormalizedTrial`]; the
//! cross-trial reductions live in [`crate::analytics::aggregator`].

use crate::core::normalize::NormalizedTrial;
use crate::core::stats;
use crate::core::windowing::Period;
use crate::error::Result;
use crate::trial::types::SENSOR_COUNT;
use serde::{Deserialize, Serialize};

/// The direction codes a channel can take: exposure sign + recovery sign.
pub const DIRECTION_CODES: [i8; 5] = [-2, -1, 0, 1, 2];

/// Statistics of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFeatures {
    pub saturation: [bool; SENSOR_COUNT],
    pub saturated_count: usize,
    /// Sample std of normalized values per channel, in the baseline window
    pub baseline_std: [f64; SENSOR_COUNT],
    pub exposure_std: [f64; SENSOR_COUNT],
    pub recovery_std: [f64; SENSOR_COUNT],
    /// Channel ended the exposure window higher than it started
    pub increasing: [bool; SENSOR_COUNT],
    /// Channel ended the exposure window lower than it started
    pub decreasing: [bool; SENSOR_COUNT],
    /// Exposure sign + recovery sign, in {-2..2}
    pub direction_code: [i8; SENSOR_COUNT],
    pub humidity_std: f64,
    pub temperature_std: f64,
}

impl TrialFeatures {
    /// Compute the statistics of one trial.
    ///
    /// Fails with `EmptyPhase` when the exposure or recovery window has no
    /// rows, since the direction of a channel is undefined there.
    pub fn compute(trial: &NormalizedTrial) -> Result<Self> {
        let exposure_direction = trial.direction(Period::Exposure)?;
        let recovery_direction = trial.direction(Period::Recovery)?;

        let saturation = trial.saturation();
        let saturated_count = saturation.iter().filter(|&&s| s).count();

        Ok(Self {
            saturation,
            saturated_count,
            baseline_std: trial.period_std(Period::Baseline),
            exposure_std: trial.period_std(Period::Exposure),
            recovery_std: trial.period_std(Period::Recovery),
            increasing: exposure_direction.map(|d| d > 0),
            decreasing: exposure_direction.map(|d| d < 0),
            direction_code: std::array::from_fn(|c| exposure_direction[c] + recovery_direction[c]),
            humidity_std: stats::sample_std(&trial.trial.humidity()),
            temperature_std: stats::sample_std(&trial.trial.temperature()),
        })
    }

    pub fn increasing_count(&self) -> usize {
        self.increasing.iter().filter(|&&b| b).count()
    }

    pub fn decreasing_count(&self) -> usize {
        self.decreasing.iter().filter(|&&b| b).count()
    }

    pub fn period_std(&self, period: Period) -> &[f64; SENSOR_COUNT] {
        match period {
            Period::Baseline => &self.baseline_std,
            Period::Exposure => &self.exposure_std,
            Period::Recovery => &self.recovery_std,
        }
    }
}

/// Position of a direction code in [`DIRECTION_CODES`].
pub fn direction_bin(code: i8) -> Option<usize> {
    DIRECTION_CODES.iter().position(|&c| c == code)
}
