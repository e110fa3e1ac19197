//! CSV trial loader.
//!
//! Reads one trial file and coerces every column into its typed form:
//! integers for `seconds` and `s1..s32`, floats for frequency, temperature
//! and humidity, strings for the identifiers and a UTC datetime for
//! `timestamp_ms`.

use crate::error::{Error, Result};
use crate::trial::types::{Trial, TrialRow, SENSOR_COUNT};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Columns the loader cannot do without.
const PARSE_COLUMNS: [&str; 10] = [
    "seconds",
    "frequency",
    "temperature",
    "humidity",
    "timestamp_ms",
    "sensor_module_id",
    "dataset",
    "run_name",
    "session_id",
    "label",
];

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// File name without its directory, used in every per-trial message.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// List the `.csv` files of a folder, sorted by name.
pub fn list_trial_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InputPath {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read only the header row of a trial file.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

/// Load a trial file into typed rows.
pub fn load_trial(path: &Path) -> Result<Trial> {
    let file = file_name_of(path);
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let lookup = |name: &str| -> Result<usize> {
        index.get(name).copied().ok_or_else(|| Error::TrialFormat {
            file: file.clone(),
            message: format!("Column {name} not found in file"),
        })
    };

    let mut idx = HashMap::new();
    for name in PARSE_COLUMNS {
        idx.insert(name, lookup(name)?);
    }
    let sensor_idx: Vec<usize> = (1..=SENSOR_COUNT)
        .map(|i| lookup(&format!("s{i}")))
        .collect::<Result<_>>()?;
    let trial_id_idx = index.get("trial_id").copied();

    let mut rows = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |name: &str| record.get(idx[name]).unwrap_or("").trim();
        let bad = |column: &str, value: &str| Error::TrialFormat {
            file: file.clone(),
            message: format!("row {row_no}: cannot parse {column} value '{value}'"),
        };

        let seconds = parse_int(cell("seconds")).ok_or_else(|| bad("seconds", cell("seconds")))?;
        let frequency = parse_float(cell("frequency"))
            .ok_or_else(|| bad("frequency", cell("frequency")))?;
        let temperature = parse_float(cell("temperature"))
            .ok_or_else(|| bad("temperature", cell("temperature")))?;
        let humidity =
            parse_float(cell("humidity")).ok_or_else(|| bad("humidity", cell("humidity")))?;
        let timestamp = parse_timestamp(cell("timestamp_ms"))
            .ok_or_else(|| bad("timestamp_ms", cell("timestamp_ms")))?;

        let mut sensors = [None; SENSOR_COUNT];
        for (channel, &col) in sensor_idx.iter().enumerate() {
            let raw = record.get(col).unwrap_or("").trim();
            if raw.is_empty() {
                continue;
            }
            sensors[channel] =
                Some(parse_int(raw).ok_or_else(|| bad(&format!("s{}", channel + 1), raw))?);
        }

        let label = match cell("label") {
            "" => None,
            l => Some(l.to_string()),
        };
        let trial_id = trial_id_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        rows.push(TrialRow {
            seconds,
            frequency,
            temperature,
            humidity,
            timestamp,
            sensor_module_id: cell("sensor_module_id").to_string(),
            dataset: cell("dataset").to_string(),
            run_name: cell("run_name").to_string(),
            trial_id,
            session_id: cell("session_id").to_string(),
            label,
            sensors,
        });
    }

    tracing::debug!(file = %file, rows = rows.len(), "file read correctly");

    Ok(Trial {
        file_name: file,
        columns,
        rows,
    })
}

/// Integers may be written as `12` or `12.0`.
fn parse_int(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Accepts epoch milliseconds, RFC 3339, or a naive datetime taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ms) = s.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn header() -> String {
        let mut cols: Vec<String> = PARSE_COLUMNS.iter().map(|c| c.to_string()).collect();
        cols.push("trial_id".to_string());
        cols.extend((1..=SENSOR_COUNT).map(|i| format!("s{i}")));
        cols.join(",")
    }

    fn line(seconds: i64, label: &str, sensor: &str) -> String {
        let mut cells = vec![
            seconds.to_string(),
            "1.0".to_string(),
            "25.5".to_string(),
            "40.0".to_string(),
            format!("2022-06-09 17:29:{:02}", seconds),
            "123456_1234_1234567".to_string(),
            "lab-proj-v1".to_string(),
            "IAS_2106_100083_proj_no2_a".to_string(),
            "9f1c6d8e-3b4a-4c2d-8e7f-1a2b3c4d5e6f".to_string(),
            label.to_string(),
            "t1".to_string(),
        ];
        cells.extend((0..SENSOR_COUNT).map(|_| sensor.to_string()));
        cells.join(",")
    }

    #[test]
    fn test_load_trial_coerces_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trial.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{}", header()).unwrap();
        writeln!(f, "{}", line(0, "baseline", "1000")).unwrap();
        writeln!(f, "{}", line(1, "", "")).unwrap();
        drop(f);

        let trial = load_trial(&path).unwrap();
        assert_eq!(trial.file_name, "trial.csv");
        assert_eq!(trial.len(), 2);
        assert_eq!(trial.rows[0].sensors[0], Some(1000));
        assert_eq!(trial.rows[0].trial_id.as_deref(), Some("t1"));
        assert_eq!(trial.rows[1].label, None);
        assert!(trial.has_null_sensor());
        assert_eq!(
            (trial.rows[1].timestamp - trial.rows[0].timestamp).num_seconds(),
            1
        );
    }

    #[test]
    fn test_missing_column_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "seconds,frequency\n0,1.0\n").unwrap();

        let err = load_trial(&path).unwrap_err();
        assert!(matches!(err, Error::TrialFormat { .. }));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("1654795769000").is_some());
        assert!(parse_timestamp("2022-06-09T17:29:29Z").is_some());
        assert!(parse_timestamp("2022-06-09 17:29:29.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_int_accepts_integral_floats() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("42.0"), Some(42));
        assert_eq!(parse_int("42.5"), None);
    }

    #[test]
    fn test_list_trial_files_missing_dir() {
        let err = list_trial_files(Path::new("/nonexistent/trials")).unwrap_err();
        assert!(matches!(err, Error::InputPath { .. }));
    }
}
