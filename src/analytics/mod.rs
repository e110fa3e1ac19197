//! Corpus-level analytics.
//!
//! The aggregator reduces a corpus of trials to a reference profile, and the
//! profile store persists it per analyte.

pub mod aggregator;
pub mod profile;

// Re-export commonly used types
pub use aggregator::{
    partition_by_analyte, AggregationOutcome, Aggregator, AnalytePartition, CorpusFold,
    TrialAccumulator,
};
pub use profile::{
    ChannelVariation, HumidTempStats, MovementStats, ProfileStore, ReferenceProfile,
    SaturationStats,
};
