//! Reference profile of an analyte and its persisted form.
//!
//! A profile is stored as five objects under `<analyte>/`:
//!
//! | key                          | format                           |
//! |------------------------------|----------------------------------|
//! | `_saturation_metrics.csv`    | `key,value` rows                 |
//! | `_sensor_variation.csv`      | per-channel variation table      |
//! | `_exposure_movement.bin`     | bincode [`MovementStats`]        |
//! | `_direction_analysis.csv`    | per-channel direction histogram  |
//! | `_humid_temp_variation.bin`  | bincode [`HumidTempStats`]       |
//!
//! Floats are written with Rust's shortest round-trip formatting, so a
//! profile read back is identical to the one written.

use crate::core::analyte::Analyte;
use crate::core::features::DIRECTION_CODES;
use crate::error::{Error, Result};
use crate::storage::BlobStore;
use crate::trial::types::SENSOR_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SATURATION_KEY: &str = "_saturation_metrics.csv";
pub const VARIATION_KEY: &str = "_sensor_variation.csv";
pub const MOVEMENT_KEY: &str = "_exposure_movement.bin";
pub const DIRECTION_KEY: &str = "_direction_analysis.csv";
pub const HUMID_TEMP_KEY: &str = "_humid_temp_variation.bin";

const PROFILE_KEYS: [&str; 5] = [
    SATURATION_KEY,
    VARIATION_KEY,
    MOVEMENT_KEY,
    DIRECTION_KEY,
    HUMID_TEMP_KEY,
];

const VARIATION_COLUMNS: [&str; 6] = [
    "mean_baseline",
    "std_baseline",
    "mean_exposure",
    "std_exposure",
    "mean_recovery",
    "std_recovery",
];

/// Saturated-channel statistics across the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaturationStats {
    pub mean_saturated: f64,
    /// Population std of saturated-channel counts
    pub std_saturated: f64,
    pub max_saturated: f64,
    /// Fraction of trials in which each channel was saturated
    pub per_channel: [f64; SENSOR_COUNT],
}

/// Cross-trial mean and std of the per-trial, per-channel std of
/// normalized values in each period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelVariation {
    pub mean_baseline: f64,
    pub std_baseline: f64,
    pub mean_exposure: f64,
    pub std_exposure: f64,
    pub mean_recovery: f64,
    pub std_recovery: f64,
}

impl ChannelVariation {
    fn values(&self) -> [f64; 6] {
        [
            self.mean_baseline,
            self.std_baseline,
            self.mean_exposure,
            self.std_exposure,
            self.mean_recovery,
            self.std_recovery,
        ]
    }

    fn from_values(v: [f64; 6]) -> Self {
        Self {
            mean_baseline: v[0],
            std_baseline: v[1],
            mean_exposure: v[2],
            std_exposure: v[3],
            mean_recovery: v[4],
            std_recovery: v[5],
        }
    }
}

/// Exposure movement statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementStats {
    /// Per channel: fraction of trials where it rose during exposure
    pub increasing_percentage: Vec<f64>,
    /// Per channel: fraction of trials where it fell during exposure
    pub decreasing_percentage: Vec<f64>,
    pub increasing_mean: f64,
    pub increasing_std: f64,
    pub decreasing_mean: f64,
    pub decreasing_std: f64,
}

/// Humidity and temperature variability across the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HumidTempStats {
    pub humidity_mean: f64,
    pub humidity_std: f64,
    pub temperature_mean: f64,
    pub temperature_std: f64,
}

/// Corpus-level statistics for one analyte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub analyte: Analyte,
    pub saturation: SaturationStats,
    pub variation: [ChannelVariation; SENSOR_COUNT],
    pub movement: MovementStats,
    /// Per channel: relative frequency of direction codes -2..2
    pub direction: [[f64; 5]; SENSOR_COUNT],
    pub humid_temp: HumidTempStats,
}

impl ReferenceProfile {
    /// Upper bound on a channel's baseline-window std: mean + k*std.
    pub fn baseline_std_limit(&self, channel: usize, sigmas: f64) -> f64 {
        let v = &self.variation[channel];
        v.mean_baseline + sigmas * v.std_baseline
    }

    /// Upper bound on the saturated-channel count: mean + k*std.
    pub fn saturation_limit(&self, sigmas: f64) -> f64 {
        self.saturation.mean_saturated + sigmas * self.saturation.std_saturated
    }
}

/// Reads and writes reference profiles through a [`BlobStore`].
#[derive(Debug, Clone)]
pub struct ProfileStore<S> {
    store: S,
}

impl<S: BlobStore> ProfileStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(analyte: Analyte, name: &str) -> String {
        format!("{analyte}/{name}")
    }

    fn staging_key(analyte: Analyte, name: &str) -> String {
        format!(".staging/{analyte}/{name}")
    }

    /// Whether every object of the analyte's profile is present.
    pub fn exists(&self, analyte: Analyte) -> bool {
        PROFILE_KEYS
            .iter()
            .all(|name| self.store.exists(&Self::key(analyte, name)))
    }

    /// Analytes with a complete stored profile.
    pub fn analytes(&self) -> Vec<Analyte> {
        Analyte::DETECTION_ORDER
            .into_iter()
            .filter(|a| self.exists(*a))
            .collect()
    }

    /// Persist a profile, replacing any previous one for the analyte.
    ///
    /// Objects are staged first and renamed into place once all five are
    /// written.
    pub fn save(&self, profile: &ReferenceProfile) -> Result<()> {
        let analyte = profile.analyte;
        let objects: [(&str, Vec<u8>); 5] = [
            (SATURATION_KEY, encode_saturation(&profile.saturation)?),
            (VARIATION_KEY, encode_variation(&profile.variation)?),
            (MOVEMENT_KEY, bincode::serialize(&profile.movement)?),
            (DIRECTION_KEY, encode_direction(&profile.direction)?),
            (HUMID_TEMP_KEY, bincode::serialize(&profile.humid_temp)?),
        ];

        for (name, bytes) in &objects {
            self.store.write(&Self::staging_key(analyte, name), bytes)?;
        }
        for (name, _) in &objects {
            self.store
                .rename(&Self::staging_key(analyte, name), &Self::key(analyte, name))?;
        }

        tracing::info!(%analyte, location = %self.store.location(), "reference profile saved");
        Ok(())
    }

    /// Load the analyte's profile.
    pub fn load(&self, analyte: Analyte) -> Result<ReferenceProfile> {
        if !self.exists(analyte) {
            return Err(Error::ProfileMissing {
                analyte,
                location: self.store.location(),
            });
        }

        let read = |name: &str| self.store.read(&Self::key(analyte, name));

        let saturation = decode_saturation(&Self::key(analyte, SATURATION_KEY), &read(SATURATION_KEY)?)?;
        let variation = decode_variation(&Self::key(analyte, VARIATION_KEY), &read(VARIATION_KEY)?)?;
        let movement: MovementStats = bincode::deserialize(&read(MOVEMENT_KEY)?)?;
        let direction = decode_direction(&Self::key(analyte, DIRECTION_KEY), &read(DIRECTION_KEY)?)?;
        let humid_temp: HumidTempStats = bincode::deserialize(&read(HUMID_TEMP_KEY)?)?;

        if movement.increasing_percentage.len() != SENSOR_COUNT
            || movement.decreasing_percentage.len() != SENSOR_COUNT
        {
            return Err(Error::ProfileFormat {
                key: Self::key(analyte, MOVEMENT_KEY),
                message: "movement percentages do not cover every channel".to_string(),
            });
        }

        Ok(ReferenceProfile {
            analyte,
            saturation,
            variation,
            movement,
            direction,
            humid_temp,
        })
    }
}

fn fmt_f64(v: f64) -> String {
    format!("{v}")
}

fn parse_f64(key: &str, s: &str) -> Result<f64> {
    s.trim().parse::<f64>().map_err(|_| Error::ProfileFormat {
        key: key.to_string(),
        message: format!("'{s}' is not a number"),
    })
}

fn channel_index(key: &str, name: &str) -> Result<usize> {
    name.strip_prefix('s')
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=SENSOR_COUNT).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| Error::ProfileFormat {
            key: key.to_string(),
            message: format!("unknown sensor '{name}'"),
        })
}

fn missing(key: &str, what: &str) -> Error {
    Error::ProfileFormat {
        key: key.to_string(),
        message: format!("missing {what}"),
    }
}

fn encode_saturation(stats: &SaturationStats) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["mean_saturated", &fmt_f64(stats.mean_saturated)])?;
    writer.write_record(["std_saturated", &fmt_f64(stats.std_saturated)])?;
    writer.write_record(["max_saturated", &fmt_f64(stats.max_saturated)])?;
    for (i, v) in stats.per_channel.iter().enumerate() {
        writer.write_record([format!("s{}", i + 1), fmt_f64(*v)])?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn decode_saturation(key: &str, bytes: &[u8]) -> Result<SaturationStats> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes);
    let mut values: HashMap<String, f64> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let name = record.get(0).unwrap_or("").trim().to_string();
        let value = parse_f64(key, record.get(1).unwrap_or(""))?;
        values.insert(name, value);
    }

    let get = |name: &str| values.get(name).copied().ok_or_else(|| missing(key, name));
    let mut per_channel = [0.0; SENSOR_COUNT];
    for (i, slot) in per_channel.iter_mut().enumerate() {
        *slot = get(&format!("s{}", i + 1))?;
    }

    Ok(SaturationStats {
        mean_saturated: get("mean_saturated")?,
        std_saturated: get("std_saturated")?,
        max_saturated: get("max_saturated")?,
        per_channel,
    })
}

fn encode_variation(variation: &[ChannelVariation; SENSOR_COUNT]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["sensor"];
    header.extend(VARIATION_COLUMNS);
    writer.write_record(&header)?;
    for (i, channel) in variation.iter().enumerate() {
        let mut record = vec![format!("s{}", i + 1)];
        record.extend(channel.values().iter().map(|v| fmt_f64(*v)));
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn decode_variation(key: &str, bytes: &[u8]) -> Result<[ChannelVariation; SENSOR_COUNT]> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let columns: Vec<usize> = VARIATION_COLUMNS
        .iter()
        .map(|c| {
            headers
                .iter()
                .position(|h| h.trim() == *c)
                .ok_or_else(|| missing(key, c))
        })
        .collect::<Result<_>>()?;

    let mut variation = [ChannelVariation::default(); SENSOR_COUNT];
    let mut seen = [false; SENSOR_COUNT];
    for record in reader.records() {
        let record = record?;
        let channel = channel_index(key, record.get(0).unwrap_or("").trim())?;
        let mut values = [0.0; 6];
        for (slot, &col) in values.iter_mut().zip(&columns) {
            *slot = parse_f64(key, record.get(col).unwrap_or(""))?;
        }
        variation[channel] = ChannelVariation::from_values(values);
        seen[channel] = true;
    }

    if let Some(i) = seen.iter().position(|s| !s) {
        return Err(missing(key, &format!("s{}", i + 1)));
    }
    Ok(variation)
}

fn encode_direction(direction: &[[f64; 5]; SENSOR_COUNT]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["sensor".to_string()];
    header.extend(DIRECTION_CODES.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;
    for (i, bins) in direction.iter().enumerate() {
        let mut record = vec![format!("s{}", i + 1)];
        record.extend(bins.iter().map(|v| fmt_f64(*v)));
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn decode_direction(key: &str, bytes: &[u8]) -> Result<[[f64; 5]; SENSOR_COUNT]> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();
    let columns: Vec<usize> = DIRECTION_CODES
        .iter()
        .map(|code| {
            let name = code.to_string();
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| missing(key, &name))
        })
        .collect::<Result<_>>()?;

    let mut direction = [[0.0; 5]; SENSOR_COUNT];
    let mut seen = [false; SENSOR_COUNT];
    for record in reader.records() {
        let record = record?;
        let channel = channel_index(key, record.get(0).unwrap_or("").trim())?;
        for (slot, &col) in direction[channel].iter_mut().zip(&columns) {
            *slot = parse_f64(key, record.get(col).unwrap_or(""))?;
        }
        seen[channel] = true;
    }

    if let Some(i) = seen.iter().position(|s| !s) {
        return Err(missing(key, &format!("s{}", i + 1)));
    }
    Ok(direction)
}
