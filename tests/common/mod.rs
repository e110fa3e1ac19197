//! Synthetic trial files for the integration tests.

#![allow(dead_code)]

use std::ops::Range;
use std::path::{Path, PathBuf};

pub const SENSORS: usize = 32;
pub const SESSION_ID: &str = "3f2b8c4e-9a1d-4e6f-8b7a-2c5d9e0f1a3b";
pub const CEILING: i64 = 1_000_000;

/// A trial recording written as CSV.
#[derive(Debug, Clone)]
pub struct TrialCsv {
    pub run_name: String,
    pub dataset: String,
    pub interval: i64,
    pub labels: Vec<Option<String>>,
    pub humidity: Vec<f64>,
    pub temperature: Vec<f64>,
    pub sensors: Vec<[Option<i64>; SENSORS]>,
}

fn base_value(channel: usize) -> i64 {
    10_000 + 100 * channel as i64
}

impl TrialCsv {
    /// A trial of `analyte` with the given phases, each `(label, rows)`.
    /// Every channel sits near its base value with a small alternating
    /// wiggle.
    pub fn new(analyte: &str, phases: &[(&str, usize)]) -> Self {
        let labels: Vec<Option<String>> = phases
            .iter()
            .flat_map(|(label, n)| std::iter::repeat(Some(label.to_string())).take(*n))
            .collect();
        let rows = labels.len();
        let sensors = (0..rows)
            .map(|r| std::array::from_fn(|c| Some(base_value(c) + (r as i64 % 2) * 2)))
            .collect();

        Self {
            run_name: format!("IAS_2106_100083_PROJ_{analyte}_a"),
            dataset: "lab-proj-v1".to_string(),
            interval: 1,
            labels,
            humidity: vec![40.0; rows],
            temperature: vec![25.0; rows],
            sensors,
        }
    }

    /// Standard baseline / exposure / recovery trial.
    pub fn standard(analyte: &str) -> Self {
        Self::new(analyte, &[("baseline", 6), ("exposure", 6), ("recovery", 4)])
    }

    /// Standard trial where `channels` drop or rise by `factor` during
    /// exposure.
    pub fn responding(analyte: &str, channels: Range<usize>, factor: f64) -> Self {
        Self::standard(analyte).respond(channels, factor)
    }

    pub fn rows(&self) -> usize {
        self.labels.len()
    }

    fn rows_labeled(&self, label: &str) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_deref() == Some(label))
            .map(|(i, _)| i)
            .collect()
    }

    /// Scale `channels` by `factor` on every exposure row.
    pub fn respond(mut self, channels: Range<usize>, factor: f64) -> Self {
        for r in self.rows_labeled("exposure") {
            for c in channels.clone() {
                let value = (base_value(c) as f64 * factor).round() as i64 + (r as i64 % 2) * 2;
                self.sensors[r][c] = Some(value);
            }
        }
        self
    }

    /// Pin a channel at the sensor ceiling on every row.
    pub fn saturate(mut self, channel: usize) -> Self {
        for row in &mut self.sensors {
            row[channel] = Some(CEILING);
        }
        self
    }

    pub fn with_humidity(mut self, row: usize, value: f64) -> Self {
        self.humidity[row] = value;
        self
    }

    pub fn with_sensor(mut self, row: usize, channel: usize, value: Option<i64>) -> Self {
        self.sensors[row][channel] = value;
        self
    }

    pub fn with_label(mut self, row: usize, label: Option<&str>) -> Self {
        self.labels[row] = label.map(str::to_string);
        self
    }

    pub fn to_csv(&self) -> String {
        let mut header = vec![
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
        ]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
        header.extend((1..=SENSORS).map(|i| format!("s{i}")));

        let mut out = header.join(",");
        out.push('\n');

        let frequency = 1.0 / self.interval as f64;
        for r in 0..self.rows() {
            let seconds = r as i64 * self.interval;
            let mut cells = vec![
                seconds.to_string(),
                frequency.to_string(),
                self.temperature[r].to_string(),
                self.humidity[r].to_string(),
                (1_600_000_000_000 + seconds * 1000).to_string(),
                "123456_1234_1234567".to_string(),
                self.dataset.clone(),
                self.run_name.clone(),
                "1".to_string(),
                SESSION_ID.to_string(),
                self.labels[r].clone().unwrap_or_default(),
            ];
            cells.extend(
                self.sensors[r]
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, self.to_csv()).unwrap();
        path
    }
}
