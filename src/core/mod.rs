//! Core per-trial processing.
//!
//! This module contains:
//! - The analyte lookup table (phase vocabulary, thresholds)
//! - Phase windows (baseline / exposure / recovery masks)
//! - The trial normalizer producing baseline-relative series
//! - Per-trial statistics consumed by the aggregator

pub mod analyte;
pub mod features;
pub mod normalize;
pub mod stats;
pub mod windowing;

// Re-export commonly used types
pub use analyte::{Analyte, AnalyteProfile, FailWhen, Predicate, ResponseRule};
pub use features::{TrialFeatures, DIRECTION_CODES};
pub use normalize::{
    NormalizedTrial, TrialNormalizer, EXTENDED_SENSOR_CEILING, STANDARD_SENSOR_CEILING,
};
pub use windowing::{Period, PeriodMasks, DEFAULT_BASELINE_WINDOW};
