//! Corpus aggregator.
//!
//! Folds the per-trial statistics of every trial of one analyte into a
//! [`ReferenceProfile`]. The fold is a [`TrialAccumulator`]: partial
//! accumulators over disjoint subsets of the corpus can be merged, and the
//! final reduction does not depend on the order trials were added.

use crate::analytics::profile::{
    ChannelVariation, HumidTempStats, MovementStats, ReferenceProfile, SaturationStats,
};
use crate::core::analyte::Analyte;
use crate::core::features::{direction_bin, TrialFeatures};
use crate::core::normalize::{detect_analyte, TrialNormalizer};
use crate::core::stats;
use crate::core::windowing::Period;
use crate::error::{Error, Result};
use crate::trial::loader::{file_name_of, load_trial};
use crate::trial::types::SENSOR_COUNT;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::Span;

/// Running totals over the trials of one corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialAccumulator {
    trials: usize,
    saturated_counts: Vec<f64>,
    saturation_totals: [usize; SENSOR_COUNT],
    /// Per period, per channel: the per-trial std of normalized values
    period_stds: [Vec<Vec<f64>>; 3],
    increasing_totals: [usize; SENSOR_COUNT],
    decreasing_totals: [usize; SENSOR_COUNT],
    increasing_counts: Vec<f64>,
    decreasing_counts: Vec<f64>,
    direction_counts: [[usize; 5]; SENSOR_COUNT],
    humidity_stds: Vec<f64>,
    temperature_stds: Vec<f64>,
}

impl Default for TrialAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialAccumulator {
    pub fn new() -> Self {
        Self {
            trials: 0,
            saturated_counts: Vec::new(),
            saturation_totals: [0; SENSOR_COUNT],
            period_stds: std::array::from_fn(|_| vec![Vec::new(); SENSOR_COUNT]),
            increasing_totals: [0; SENSOR_COUNT],
            decreasing_totals: [0; SENSOR_COUNT],
            increasing_counts: Vec::new(),
            decreasing_counts: Vec::new(),
            direction_counts: [[0; 5]; SENSOR_COUNT],
            humidity_stds: Vec::new(),
            temperature_stds: Vec::new(),
        }
    }

    /// Number of trials folded in so far.
    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn is_empty(&self) -> bool {
        self.trials == 0
    }

    /// Fold one trial's statistics in.
    pub fn add(&mut self, features: &TrialFeatures) {
        self.trials += 1;
        self.saturated_counts.push(features.saturated_count as f64);

        for (p, period) in Period::ALL.iter().enumerate() {
            for (c, std) in features.period_std(*period).iter().enumerate() {
                self.period_stds[p][c].push(*std);
            }
        }

        for c in 0..SENSOR_COUNT {
            self.saturation_totals[c] += features.saturation[c] as usize;
            self.increasing_totals[c] += features.increasing[c] as usize;
            self.decreasing_totals[c] += features.decreasing[c] as usize;
            if let Some(bin) = direction_bin(features.direction_code[c]) {
                self.direction_counts[c][bin] += 1;
            }
        }

        self.increasing_counts.push(features.increasing_count() as f64);
        self.decreasing_counts.push(features.decreasing_count() as f64);
        self.humidity_stds.push(features.humidity_std);
        self.temperature_stds.push(features.temperature_std);
    }

    /// Combine with the accumulator of a disjoint set of trials.
    pub fn merge(mut self, other: TrialAccumulator) -> Self {
        self.trials += other.trials;
        self.saturated_counts.extend(other.saturated_counts);
        self.increasing_counts.extend(other.increasing_counts);
        self.decreasing_counts.extend(other.decreasing_counts);
        self.humidity_stds.extend(other.humidity_stds);
        self.temperature_stds.extend(other.temperature_stds);

        for (mine, theirs) in self.period_stds.iter_mut().zip(other.period_stds) {
            for (c, values) in theirs.into_iter().enumerate() {
                mine[c].extend(values);
            }
        }

        for c in 0..SENSOR_COUNT {
            self.saturation_totals[c] += other.saturation_totals[c];
            self.increasing_totals[c] += other.increasing_totals[c];
            self.decreasing_totals[c] += other.decreasing_totals[c];
            for bin in 0..5 {
                self.direction_counts[c][bin] += other.direction_counts[c][bin];
            }
        }
        self
    }

    /// Reduce to a reference profile. `None` when no trial was added.
    pub fn finish(&self, analyte: Analyte) -> Option<ReferenceProfile> {
        if self.trials == 0 {
            return None;
        }
        let n = self.trials as f64;
        let saturated = sorted(&self.saturated_counts);

        let saturation = SaturationStats {
            mean_saturated: stats::mean(&saturated),
            std_saturated: stats::population_std(&saturated),
            max_saturated: saturated.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            per_channel: self.saturation_totals.map(|t| t as f64 / n),
        };

        let variation = std::array::from_fn(|c| {
            let [baseline, exposure, recovery] =
                std::array::from_fn(|p| sorted(&self.period_stds[p][c]));
            ChannelVariation {
                mean_baseline: stats::nan_mean(&baseline),
                std_baseline: stats::nan_sample_std(&baseline),
                mean_exposure: stats::nan_mean(&exposure),
                std_exposure: stats::nan_sample_std(&exposure),
                mean_recovery: stats::nan_mean(&recovery),
                std_recovery: stats::nan_sample_std(&recovery),
            }
        });

        let increasing = sorted(&self.increasing_counts);
        let decreasing = sorted(&self.decreasing_counts);
        let movement = MovementStats {
            increasing_percentage: self.increasing_totals.iter().map(|&t| t as f64 / n).collect(),
            decreasing_percentage: self.decreasing_totals.iter().map(|&t| t as f64 / n).collect(),
            increasing_mean: stats::mean(&increasing),
            increasing_std: stats::population_std(&increasing),
            decreasing_mean: stats::mean(&decreasing),
            decreasing_std: stats::population_std(&decreasing),
        };

        let direction = self.direction_counts.map(|bins| bins.map(|b| b as f64 / n));

        let humidity = sorted(&self.humidity_stds);
        let temperature = sorted(&self.temperature_stds);
        let humid_temp = HumidTempStats {
            humidity_mean: stats::nan_mean(&humidity),
            humidity_std: stats::nan_population_std(&humidity),
            temperature_mean: stats::nan_mean(&temperature),
            temperature_std: stats::nan_population_std(&temperature),
        };

        Some(ReferenceProfile {
            analyte,
            saturation,
            variation,
            movement,
            direction,
            humid_temp,
        })
    }
}

// Reductions run over sorted values so the result is identical for any
// insertion order.
fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Result of aggregating one analyte's corpus.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub profile: ReferenceProfile,
    pub included: Vec<String>,
    /// File name and reason of every excluded trial
    pub excluded: Vec<(String, String)>,
}

/// Builds the reference profile of one analyte.
#[derive(Debug, Clone)]
pub struct Aggregator {
    analyte: Analyte,
    normalizer: TrialNormalizer,
    span: Span,
}

impl Aggregator {
    pub fn new(analyte: Analyte, normalizer: TrialNormalizer) -> Self {
        Self {
            analyte,
            normalizer,
            span: tracing::info_span!("aggregator", %analyte),
        }
    }

    pub fn analyte(&self) -> Analyte {
        self.analyte
    }

    /// Parse one trial and compute its statistics.
    pub fn trial_features(&self, path: &Path) -> Result<TrialFeatures> {
        let trial = self.normalizer.parse(path)?;
        if trial.analyte != self.analyte {
            return Err(Error::AnalyteMismatch {
                file: trial.file_name().to_string(),
                expected: self.analyte,
                found: trial.analyte,
            });
        }
        TrialFeatures::compute(&trial)
    }

    /// Fold every usable trial of `files` into one accumulator. Trials that
    /// cannot be used are excluded with their reason.
    pub fn fold(&self, files: &[PathBuf]) -> Result<CorpusFold> {
        let _guard = self.span.enter();
        tracing::info!(trials = files.len(), "aggregating corpus");

        let mut fold = CorpusFold::default();
        for path in files {
            let file = file_name_of(path);
            match self.trial_features(path) {
                Ok(features) => {
                    fold.accumulator.add(&features);
                    fold.included.push(file);
                }
                Err(e) if e.is_per_trial() => {
                    tracing::warn!(file = %file, error = %e, "trial excluded from aggregation");
                    fold.excluded.push((file, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fold)
    }

    /// Aggregate every trial in `files`. Trials that cannot be used are
    /// excluded and reported in the outcome; the run fails only if none is
    /// left.
    pub fn aggregate(&self, files: &[PathBuf]) -> Result<AggregationOutcome> {
        let fold = self.fold(files)?;
        let _guard = self.span.enter();

        let profile = fold
            .accumulator
            .finish(self.analyte)
            .ok_or_else(|| Error::EmptyCorpus {
                analyte: self.analyte.to_string(),
                excluded: fold.excluded.len(),
            })?;

        tracing::info!(
            included = fold.included.len(),
            excluded = fold.excluded.len(),
            mean_saturated = profile.saturation.mean_saturated,
            max_saturated = profile.saturation.max_saturated,
            "corpus aggregated"
        );

        Ok(AggregationOutcome {
            profile,
            included: fold.included,
            excluded: fold.excluded,
        })
    }
}

/// Accumulated statistics of a corpus before reduction, with the trials
/// that went into it and the ones left out.
#[derive(Debug, Clone, Default)]
pub struct CorpusFold {
    pub accumulator: TrialAccumulator,
    pub included: Vec<String>,
    /// File name and reason of every excluded trial
    pub excluded: Vec<(String, String)>,
}

/// Trial files grouped by the analyte named in their run name.
#[derive(Debug, Default)]
pub struct AnalytePartition {
    pub groups: BTreeMap<Analyte, Vec<PathBuf>>,
    /// Files whose analyte could not be determined, with the reason
    pub unassigned: Vec<(String, String)>,
}

/// Group trial files by analyte.
pub fn partition_by_analyte(files: &[PathBuf]) -> AnalytePartition {
    let mut partition = AnalytePartition::default();
    for path in files {
        match load_trial(path).and_then(|trial| detect_analyte(&trial)) {
            Ok(analyte) => partition.groups.entry(analyte).or_default().push(path.clone()),
            Err(e) => {
                let file = file_name_of(path);
                tracing::warn!(file = %file, error = %e, "trial has no usable analyte");
                partition.unassigned.push((file, e.to_string()));
            }
        }
    }
    partition
}
