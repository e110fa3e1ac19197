//! Quality scorer.
//!
//! Scores a freshly normalized trial against its analyte's reference
//! profile. Four checks run in a fixed order and the first failure decides
//! the verdict:
//!
//! 1. humidity stability in the baseline and exposure windows
//! 2. exposure responsiveness (per-analyte rule table)
//! 3. saturated-channel count against the corpus
//! 4. baseline-window variation against the corpus

use crate::analytics::profile::ReferenceProfile;
use crate::core::analyte::{Analyte, ResponseRule};
use crate::core::normalize::NormalizedTrial;
use crate::core::stats;
use crate::core::windowing::Period;
use crate::error::{Error, QualityCheckFailure, Result};
use crate::trial::types::SENSOR_COUNT;
use serde::Serialize;
use tracing::Span;

/// Score of a trial that passes every check.
pub const PASS_SCORE: u8 = 100;

/// Score of a trial that fails any check.
pub const FAIL_SCORE: u8 = 0;

/// Multiplier of the corpus std in the saturation and baseline bounds.
const SPREAD_SIGMAS: f64 = 2.0;

/// Outcome of scoring one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityVerdict {
    pub file_name: String,
    pub analyte: Analyte,
    pub score: u8,
    #[serde(skip)]
    pub failure: Option<QualityCheckFailure>,
}

impl QualityVerdict {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs the quality checks of one analyte.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    profile: ReferenceProfile,
    span: Span,
}

impl QualityScorer {
    pub fn new(profile: ReferenceProfile) -> Self {
        Self {
            span: tracing::info_span!("scorer", analyte = %profile.analyte),
            profile,
        }
    }

    pub fn profile(&self) -> &ReferenceProfile {
        &self.profile
    }

    /// Score a trial. Fails only when the trial belongs to another analyte.
    pub fn score(&self, trial: &NormalizedTrial) -> Result<QualityVerdict> {
        let _guard = self.span.enter();
        if trial.analyte != self.profile.analyte {
            return Err(Error::AnalyteMismatch {
                file: trial.file_name().to_string(),
                expected: self.profile.analyte,
                found: trial.analyte,
            });
        }

        let failure = self.check(trial).err();
        let score = if failure.is_some() { FAIL_SCORE } else { PASS_SCORE };

        match &failure {
            Some(f) => tracing::info!(
                file = %trial.file_name(),
                check = f.check_name(),
                reason = %f,
                score,
                "quality check failed"
            ),
            None => tracing::info!(file = %trial.file_name(), score, "quality checks passed"),
        }

        Ok(QualityVerdict {
            file_name: trial.file_name().to_string(),
            analyte: trial.analyte,
            score,
            failure,
        })
    }

    /// Run the four checks in order, stopping at the first failure.
    pub fn check(&self, trial: &NormalizedTrial) -> std::result::Result<(), QualityCheckFailure> {
        check_humidity(trial)?;
        check_response(trial)?;
        check_saturation(trial, &self.profile)?;
        check_baseline(trial, &self.profile)
    }
}

/// Humidity swing inside the baseline and exposure windows.
pub fn check_humidity(trial: &NormalizedTrial) -> std::result::Result<(), QualityCheckFailure> {
    let Some(limit) = trial.profile().humidity_limit else {
        return Ok(());
    };
    for period in [Period::Baseline, Period::Exposure] {
        let range = stats::range(&trial.humidity_in(period));
        tracing::debug!(%period, range, limit, "humidity range");
        if range > limit {
            return Err(QualityCheckFailure::Humidity {
                period,
                range,
                limit,
            });
        }
    }
    Ok(())
}

/// Number of channels for which `rule` holds in at least one exposure row.
pub fn responding_channels(trial: &NormalizedTrial, rule: &ResponseRule) -> usize {
    let rows = trial.periods.rows(Period::Exposure);
    (0..SENSOR_COUNT)
        .filter(|&c| {
            rows.iter()
                .any(|&r| rule.predicate.holds(trial.normalized[r][c]))
        })
        .count()
}

/// Exposure responsiveness against the analyte's rule table.
pub fn check_response(trial: &NormalizedTrial) -> std::result::Result<(), QualityCheckFailure> {
    for rule in trial.profile().response_rules {
        let count = responding_channels(trial, rule);
        tracing::debug!(rule = %rule.predicate, count, "response rule");
        if rule.fails(count) {
            return Err(QualityCheckFailure::ResponseExposure {
                rule: rule.predicate.to_string(),
                count,
                fail_when: rule.fail_condition(),
            });
        }
    }
    Ok(())
}

/// Saturated-channel count against the corpus max and spread.
pub fn check_saturation(
    trial: &NormalizedTrial,
    profile: &ReferenceProfile,
) -> std::result::Result<(), QualityCheckFailure> {
    let count = trial.saturated_count();
    let max = profile.saturation.max_saturated;
    if count as f64 > max {
        return Err(QualityCheckFailure::SaturationAboveMax { count, max });
    }
    let limit = profile.saturation_limit(SPREAD_SIGMAS);
    if count as f64 > limit {
        return Err(QualityCheckFailure::SaturationAboveSpread { count, limit });
    }
    Ok(())
}

/// Baseline-window variation of every channel against the corpus.
pub fn check_baseline(
    trial: &NormalizedTrial,
    profile: &ReferenceProfile,
) -> std::result::Result<(), QualityCheckFailure> {
    let baseline_std = trial.period_std(Period::Baseline);
    let channels: Vec<usize> = baseline_std
        .iter()
        .enumerate()
        .filter(|(c, std)| **std > profile.baseline_std_limit(*c, SPREAD_SIGMAS))
        .map(|(c, _)| c + 1)
        .collect();

    if channels.is_empty() {
        Ok(())
    } else {
        Err(QualityCheckFailure::BaselineVariation { channels })
    }
}
