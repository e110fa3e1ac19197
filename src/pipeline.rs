//! Corpus loops of the three pipeline stages.
//!
//! Per-trial errors are caught here: schema validation records an error
//! line, aggregation excludes the trial and scoring records a score of 0.
//! Run-level errors (missing input folder, empty corpus, missing reference
//! profile) abort the stage.

use crate::analytics::aggregator::{partition_by_analyte, AggregationOutcome, Aggregator};
use crate::analytics::profile::ProfileStore;
use crate::config::Config;
use crate::core::analyte::Analyte;
use crate::core::normalize::TrialNormalizer;
use crate::error::{Error, Result};
use crate::quality::scorer::QualityScorer;
use crate::report::{ReportKind, RunReport, RunStats};
use crate::schema::validator::SchemaValidator;
use crate::storage::LocalBlobStore;
use crate::trial::loader::{file_name_of, list_trial_files};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a finished stage reports back.
#[derive(Debug, Clone)]
pub struct StageSummary {
    pub stats: RunStats,
    /// Printable summary
    pub summary: String,
    /// Report file, when one was written
    pub report: Option<PathBuf>,
}

impl StageSummary {
    fn close(report: RunReport) -> Result<Self> {
        let summary = report.summary();
        let path = report.path().map(Path::to_path_buf);
        let stats = report.finish()?;
        Ok(Self {
            stats,
            summary,
            report: path,
        })
    }
}

/// Result of the analytics stage.
#[derive(Debug, Clone)]
pub struct AnalyticsRun {
    /// One outcome per analyte that produced a profile
    pub outcomes: Vec<AggregationOutcome>,
    /// Analytes found in the input folder whose every trial was excluded
    pub empty: Vec<Analyte>,
    pub summary: StageSummary,
}

impl AnalyticsRun {
    pub fn analytes(&self) -> Vec<Analyte> {
        self.outcomes.iter().map(|o| o.profile.analyte).collect()
    }
}

/// Runs the pipeline stages with one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    normalizer: TrialNormalizer,
    validator: SchemaValidator,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            normalizer: TrialNormalizer::new(config.baseline_window),
            validator: SchemaValidator::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate every trial in `input`, writing the schema report to
    /// `output` when enabled.
    pub fn validate_schema(&self, input: &Path, output: &Path) -> Result<StageSummary> {
        let files = list_trial_files(input)?;
        tracing::info!(input = %input.display(), trials = files.len(), "initiating schema validation");

        let mut report = if self.config.write_schema_report {
            RunReport::create(ReportKind::Schema, output)?
        } else {
            RunReport::new(ReportKind::Schema)
        };

        for path in &files {
            let file = file_name_of(path);
            match self.validator.validate(path) {
                Ok(_) => report.record_pass(&file)?,
                Err(Error::Schema { violation, .. }) => {
                    tracing::warn!(file = %file, %violation, "schema check failed");
                    report.record_fail(&file, &violation.to_string())?;
                }
                Err(e) if e.is_per_trial() => {
                    tracing::error!(file = %file, error = %e, "trial could not be validated");
                    report.record_error(&file, &trial_reason(&file, &e.to_string()))?;
                }
                Err(e) => return Err(e),
            }
        }

        StageSummary::close(report)
    }

    /// Build and persist one reference profile per analyte found in
    /// `input`.
    pub fn analyze(&self, input: &Path, analytics: &Path) -> Result<AnalyticsRun> {
        let files = list_trial_files(input)?;
        tracing::info!(input = %input.display(), trials = files.len(), "analysing data");

        let mut report = RunReport::new(ReportKind::Analytics);
        let partition = partition_by_analyte(&files);
        for (file, reason) in &partition.unassigned {
            report.record_error(file, &trial_reason(file, reason))?;
        }
        if partition.groups.is_empty() {
            return Err(Error::EmptyCorpus {
                analyte: "any analyte".to_string(),
                excluded: partition.unassigned.len(),
            });
        }

        let store = ProfileStore::new(LocalBlobStore::new(analytics));
        let mut outcomes = Vec::new();
        let mut empty = Vec::new();
        for (analyte, group) in &partition.groups {
            let aggregator = Aggregator::new(*analyte, self.normalizer.clone());
            let fold = aggregator.fold(group)?;
            for (file, reason) in &fold.excluded {
                report.record_error(file, &trial_reason(file, reason))?;
            }

            let Some(profile) = fold.accumulator.finish(*analyte) else {
                tracing::error!(
                    %analyte,
                    excluded = fold.excluded.len(),
                    "no usable trials, reference profile not built"
                );
                empty.push(*analyte);
                continue;
            };
            store.save(&profile)?;
            for file in &fold.included {
                report.record_pass(file)?;
            }
            outcomes.push(AggregationOutcome {
                profile,
                included: fold.included,
                excluded: fold.excluded,
            });
        }

        if outcomes.is_empty() {
            return Err(Error::EmptyCorpus {
                analyte: "any analyte".to_string(),
                excluded: report.stats().errored as usize,
            });
        }

        tracing::info!(analytics = %analytics.display(), profiles = outcomes.len(), "statistical files generated");
        Ok(AnalyticsRun {
            outcomes,
            empty,
            summary: StageSummary::close(report)?,
        })
    }

    /// Score every trial in `input` against the profiles under `analytics`,
    /// writing the quality report to `output`.
    pub fn score(&self, input: &Path, analytics: &Path, output: &Path) -> Result<StageSummary> {
        let files = list_trial_files(input)?;
        tracing::info!(input = %input.display(), trials = files.len(), "initiating data quality checks");

        let store = ProfileStore::new(LocalBlobStore::new(analytics));
        let mut scorers: HashMap<Analyte, QualityScorer> = HashMap::new();
        let mut report = RunReport::create(ReportKind::Quality, output)?;

        for path in &files {
            let file = file_name_of(path);
            let trial = match self.normalizer.parse(path) {
                Ok(trial) => trial,
                Err(e) if e.is_per_trial() => {
                    tracing::error!(file = %file, error = %e, "trial could not be scored");
                    report.record_error(&file, &trial_reason(&file, &e.to_string()))?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let scorer = match scorers.entry(trial.analyte) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let profile = store.load(trial.analyte)?;
                    entry.insert(QualityScorer::new(profile))
                }
            };

            match scorer.score(&trial) {
                Ok(verdict) => match &verdict.failure {
                    None => report.record_pass(&file)?,
                    Some(failure) => report.record_fail(&file, &failure.to_string())?,
                },
                Err(e) => {
                    tracing::error!(file = %file, error = %e, "trial could not be scored");
                    report.record_error(&file, &trial_reason(&file, &e.to_string()))?;
                }
            }
        }

        StageSummary::close(report)
    }

    /// Schema validation, analytics then scoring over the configured
    /// folders, with `input` overriding the samples folder.
    pub fn run(&self, input: Option<&Path>) -> Result<Vec<StageSummary>> {
        match input {
            Some(path) if !path.is_dir() => {
                return Err(Error::InputPath {
                    path: path.to_path_buf(),
                })
            }
            Some(_) => {}
            None => self.config.validate_input_paths()?,
        }
        let input = input.unwrap_or(self.config.samples_path.as_path());
        self.config.ensure_output_directories()?;

        let schema = self.validate_schema(input, &self.config.schema_results_path)?;
        let analytics = self.analyze(input, &self.config.analytics_path)?;
        let quality = self.score(
            input,
            &self.config.analytics_path,
            &self.config.quality_results_path,
        )?;

        Ok(vec![schema, analytics.summary, quality])
    }
}

/// Error message without the leading file name.
fn trial_reason(file: &str, message: &str) -> String {
    message
        .strip_prefix(&format!("{file}: "))
        .unwrap_or(message)
        .to_string()
}
