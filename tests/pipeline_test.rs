//! End-to-end tests of the schema, analytics and scoring stages over
//! synthetic trial folders.

mod common;

use analyte_quality::analytics::profile::{
    DIRECTION_KEY, HUMID_TEMP_KEY, MOVEMENT_KEY, SATURATION_KEY, VARIATION_KEY,
};
use analyte_quality::{
    Analyte, Config, Error, LocalBlobStore, Pipeline, ProfileStore, QualityCheckFailure,
    QualityScorer, TrialNormalizer,
};
use common::TrialCsv;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    analytics: PathBuf,
    quality: PathBuf,
    schema: PathBuf,
    config: Config,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = Config {
            samples_path: root.join("input_files"),
            analytics_path: root.join("statistical_analysis"),
            quality_results_path: root.join("quality_results"),
            schema_results_path: root.join("schema_validate"),
            logs_path: root.join("logs"),
            ..Config::default()
        };
        std::fs::create_dir_all(&config.samples_path).unwrap();
        Self {
            input: config.samples_path.clone(),
            analytics: config.analytics_path.clone(),
            quality: config.quality_results_path.clone(),
            schema: config.schema_results_path.clone(),
            config,
            _dir: dir,
        }
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config.clone())
    }

    /// A second input folder, for trials scored against an existing corpus.
    fn folder(&self, name: &str) -> PathBuf {
        let path = self.input.parent().unwrap().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }
}

fn report_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn profile_of(ws: &Workspace, analyte: Analyte) -> analyte_quality::ReferenceProfile {
    ProfileStore::new(LocalBlobStore::new(&ws.analytics))
        .load(analyte)
        .unwrap()
}

fn score_file(ws: &Workspace, path: &Path, analyte: Analyte) -> analyte_quality::QualityVerdict {
    let trial = TrialNormalizer::default().parse(path).unwrap();
    QualityScorer::new(profile_of(ws, analyte))
        .score(&trial)
        .unwrap()
}

#[test]
fn test_full_run_passes_clean_corpus() {
    let ws = Workspace::new();
    for i in 0..4 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }

    let summaries = ws.pipeline().run(None).unwrap();
    assert_eq!(summaries.len(), 3);

    let schema = &summaries[0];
    assert_eq!(schema.stats.passed, 4);
    let lines = report_lines(schema.report.as_ref().unwrap());
    assert_eq!(lines[0], "trial_0.csv Schema check: PASS");

    let analytics = &summaries[1];
    assert_eq!(analytics.stats.passed, 4);
    for key in [
        SATURATION_KEY,
        VARIATION_KEY,
        MOVEMENT_KEY,
        DIRECTION_KEY,
        HUMID_TEMP_KEY,
    ] {
        assert!(ws.analytics.join("no2").join(key).is_file(), "{key} missing");
    }

    let quality = &summaries[2];
    assert_eq!(quality.stats.passed, 4);
    assert_eq!(quality.stats.failed, 0);
    let report = quality.report.as_ref().unwrap();
    assert!(report.starts_with(&ws.quality));
    let lines = report_lines(report);
    assert_eq!(lines.len(), 4);
    assert!(lines.contains(&"trial_3.csv Data quality score: 100".to_string()));
    assert!(ws.schema.is_dir());
}

#[test]
fn test_no2_response_threshold() {
    let ws = Workspace::new();
    for i in 0..3 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }
    ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();

    let new = ws.folder("new");
    let three = TrialCsv::responding("no2", 0..3, 0.95).write(&new, "three.csv");
    let two = TrialCsv::responding("no2", 0..2, 0.95).write(&new, "two.csv");

    assert_eq!(score_file(&ws, &three, Analyte::No2).score, 100);

    let verdict = score_file(&ws, &two, Analyte::No2);
    assert_eq!(verdict.score, 0);
    assert!(matches!(
        verdict.failure,
        Some(QualityCheckFailure::ResponseExposure { count: 2, .. })
    ));

    let summary = ws.pipeline().score(&new, &ws.analytics, &ws.quality).unwrap();
    assert_eq!(summary.stats.passed, 1);
    assert_eq!(summary.stats.failed, 1);
    let lines = report_lines(summary.report.as_ref().unwrap());
    assert!(lines.contains(&"two.csv Data quality score: 0".to_string()));
}

#[test]
fn test_saturation_against_historical_max() {
    let ws = Workspace::new();
    TrialCsv::responding("no2", 0..3, 0.95)
        .saturate(10)
        .write(&ws.input, "saturated.csv");
    for i in 0..3 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }
    ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();

    let profile = profile_of(&ws, Analyte::No2);
    assert_eq!(profile.saturation.max_saturated, 1.0);
    assert_eq!(profile.saturation.mean_saturated, 0.25);

    let new = ws.folder("new");
    let at_max = TrialCsv::responding("no2", 0..3, 0.95)
        .saturate(12)
        .write(&new, "at_max.csv");
    let above_max = TrialCsv::responding("no2", 0..3, 0.95)
        .saturate(12)
        .saturate(13)
        .write(&new, "above_max.csv");

    assert_eq!(score_file(&ws, &at_max, Analyte::No2).score, 100);

    let verdict = score_file(&ws, &above_max, Analyte::No2);
    assert_eq!(verdict.score, 0);
    assert_eq!(
        verdict.failure,
        Some(QualityCheckFailure::SaturationAboveMax { count: 2, max: 1.0 })
    );
}

#[test]
fn test_humidity_limit_for_no() {
    let ws = Workspace::new();
    for i in 0..3 {
        TrialCsv::responding("no", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }
    ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();

    let new = ws.folder("new");
    let steady = TrialCsv::responding("no", 0..3, 0.95)
        .with_humidity(2, 42.0)
        .write(&new, "steady.csv");
    let swinging = TrialCsv::responding("no", 0..3, 0.95)
        .with_humidity(2, 43.5)
        .write(&new, "swinging.csv");

    assert_eq!(score_file(&ws, &steady, Analyte::No).score, 100);

    let verdict = score_file(&ws, &swinging, Analyte::No);
    assert_eq!(verdict.score, 0);
    assert!(matches!(
        verdict.failure,
        Some(QualityCheckFailure::Humidity { limit, .. }) if limit == 3.0
    ));
}

#[test]
fn test_unusable_trials_are_excluded_from_analytics() {
    let ws = Workspace::new();
    for i in 0..3 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }
    TrialCsv::responding("no2", 0..3, 0.95)
        .with_sensor(3, 5, None)
        .write(&ws.input, "null_sensor.csv");
    TrialCsv::new("no2", &[("baseline", 4), ("recovery", 4)]).write(&ws.input, "no_exposure.csv");
    TrialCsv::standard("argon").write(&ws.input, "unknown.csv");

    let run = ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();
    assert_eq!(run.analytes(), vec![Analyte::No2]);

    let outcome = &run.outcomes[0];
    assert_eq!(outcome.included.len(), 3);
    let excluded: Vec<&str> = outcome.excluded.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(excluded, vec!["no_exposure.csv", "null_sensor.csv"]);

    assert_eq!(run.summary.stats.passed, 3);
    assert_eq!(run.summary.stats.errored, 3);
}

#[test]
fn test_multi_analyte_folder_builds_one_profile_each() {
    let ws = Workspace::new();
    for i in 0..2 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("no2_{i}.csv"));
        TrialCsv::new("nh3", &[("baseline", 6), ("exposure", 6), ("open_recovery", 4)])
            .respond(0..32, 1.05)
            .write(&ws.input, &format!("nh3_{i}.csv"));
    }

    let run = ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();
    assert_eq!(run.analytes(), vec![Analyte::No2, Analyte::Nh3]);

    let store = ProfileStore::new(LocalBlobStore::new(&ws.analytics));
    assert_eq!(store.analytes(), vec![Analyte::No2, Analyte::Nh3]);

    let nh3 = profile_of(&ws, Analyte::Nh3);
    assert_eq!(nh3.movement.increasing_percentage, vec![1.0; 32]);
    assert_eq!(nh3.movement.increasing_mean, 32.0);

    let summary = ws.pipeline().score(&ws.input, &ws.analytics, &ws.quality).unwrap();
    assert_eq!(summary.stats.passed, 4);
}

#[test]
fn test_analyte_without_usable_trials_does_not_abort_others() {
    let ws = Workspace::new();
    for i in 0..3 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("no2_{i}.csv"));
    }
    TrialCsv::new("nh3", &[("baseline", 6), ("exposure", 6), ("open_recovery", 4)])
        .respond(0..32, 1.05)
        .with_sensor(3, 5, None)
        .write(&ws.input, "nh3_bad.csv");

    let run = ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();
    assert_eq!(run.analytes(), vec![Analyte::No2]);
    assert_eq!(run.empty, vec![Analyte::Nh3]);
    assert_eq!(run.summary.stats.passed, 3);
    assert_eq!(run.summary.stats.errored, 1);

    let store = ProfileStore::new(LocalBlobStore::new(&ws.analytics));
    assert_eq!(store.analytes(), vec![Analyte::No2]);

    let summaries = ws.pipeline().run(None).unwrap();
    let quality = &summaries[2];
    assert_eq!(quality.stats.passed, 3);
    assert_eq!(quality.stats.errored, 1);
    let lines = report_lines(quality.report.as_ref().unwrap());
    assert!(lines.contains(&"nh3_bad.csv Data quality score: 0".to_string()));
}

#[test]
fn test_folder_without_any_usable_trial_is_empty_corpus() {
    let ws = Workspace::new();
    TrialCsv::responding("no2", 0..3, 0.95)
        .with_sensor(0, 1, None)
        .write(&ws.input, "no2_bad.csv");
    TrialCsv::new("nh3", &[("baseline", 6), ("open_recovery", 4)]).write(&ws.input, "nh3_bad.csv");

    let err = ws
        .pipeline()
        .analyze(&ws.input, &ws.analytics)
        .unwrap_err();
    assert!(matches!(err, Error::EmptyCorpus { excluded: 2, .. }));
}

#[test]
fn test_profile_round_trip_through_files() {
    let ws = Workspace::new();
    for i in 0..3 {
        TrialCsv::responding("no2", 0..3, 0.95)
            .with_humidity(i, 40.0 + i as f64 / 7.0)
            .write(&ws.input, &format!("trial_{i}.csv"));
    }
    let run = ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();
    let built = &run.outcomes[0].profile;
    let loaded = profile_of(&ws, Analyte::No2);

    assert_eq!(loaded.saturation, built.saturation);
    assert_eq!(loaded.movement, built.movement);
    assert_eq!(loaded.direction, built.direction);
    assert_eq!(loaded.humid_temp, built.humid_temp);
    for (a, b) in loaded.variation.iter().zip(built.variation.iter()) {
        assert_eq!(a.mean_baseline.to_bits(), b.mean_baseline.to_bits());
        assert_eq!(a.std_baseline.to_bits(), b.std_baseline.to_bits());
        assert_eq!(a.mean_exposure.to_bits(), b.mean_exposure.to_bits());
    }
}

#[test]
fn test_schema_report_records_violations() {
    let ws = Workspace::new();
    TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, "a_good.csv");
    TrialCsv::responding("no2", 0..3, 0.95)
        .with_sensor(2, 3, None)
        .write(&ws.input, "b_null.csv");
    TrialCsv::responding("no2", 0..3, 0.95)
        .with_label(4, Some("open_recovery"))
        .write(&ws.input, "c_label.csv");
    TrialCsv::standard("argon").write(&ws.input, "d_unknown.csv");

    let summary = ws.pipeline().validate_schema(&ws.input, &ws.schema).unwrap();
    assert_eq!(summary.stats.passed, 1);
    assert_eq!(summary.stats.failed, 2);
    assert_eq!(summary.stats.errored, 1);

    let report = summary.report.unwrap();
    let name = report.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("schema_check_"));

    let lines = report_lines(&report);
    assert_eq!(lines[0], "a_good.csv Schema check: PASS");
    assert_eq!(lines[1], "b_null.csv  ---ERROR--- s4 has NAN values");
    assert!(lines[2].starts_with("c_label.csv  ---ERROR--- Trial_state column contains different values"));
    assert!(lines[3].starts_with("d_unknown.csv  ---ERROR--- analyte label not found"));
}

#[test]
fn test_scoring_without_profile_aborts() {
    let ws = Workspace::new();
    TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, "trial.csv");

    let err = ws
        .pipeline()
        .score(&ws.input, &ws.analytics, &ws.quality)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ProfileMissing {
            analyte: Analyte::No2,
            ..
        }
    ));
}

#[test]
fn test_scoring_records_unparseable_trials_as_zero() {
    let ws = Workspace::new();
    for i in 0..2 {
        TrialCsv::responding("no2", 0..3, 0.95).write(&ws.input, &format!("trial_{i}.csv"));
    }
    ws.pipeline().analyze(&ws.input, &ws.analytics).unwrap();

    let new = ws.folder("new");
    TrialCsv::responding("no2", 0..3, 0.95)
        .with_sensor(0, 0, Some(0))
        .with_sensor(1, 0, Some(0))
        .with_sensor(2, 0, Some(0))
        .with_sensor(3, 0, Some(0))
        .write(&new, "zero_baseline.csv");

    let summary = ws.pipeline().score(&new, &ws.analytics, &ws.quality).unwrap();
    assert_eq!(summary.stats.errored, 1);
    let lines = report_lines(summary.report.as_ref().unwrap());
    assert_eq!(lines, vec!["zero_baseline.csv Data quality score: 0".to_string()]);
}
