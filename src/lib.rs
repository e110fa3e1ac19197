//! Analyte Quality - statistical data-quality pipeline for gas-sensor
//! analyte exposure trials.
//!
//! This library parses trial recordings of a 32-channel sensor array,
//! learns per-analyte reference statistics from a corpus of trials, and
//! scores new trials against them.
//!
//! # Stages
//!
//! - **Schema validation**: structural checks on every trial file
//! - **Analytics**: one reference profile per analyte, built from the corpus
//! - **Quality scoring**: a 0 / 100 score per trial against its profile
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Analyte Quality                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │   Loader    │──▶│ Normalizer  │──▶│ Aggregator  │         │
//! │  │   (csv)     │   │ (baseline)  │   │  (corpus)   │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                 │                 │                 │
//! │         ▼                 ▼                 ▼                 │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │   Schema    │   │   Scorer    │◀──│  Profile    │         │
//! │  │  Validator  │   │  (4 checks) │   │   Store     │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use analyte_quality::{Config, Pipeline};
//! use std::path::Path;
//!
//! let pipeline = Pipeline::new(Config::default());
//! let run = pipeline
//!     .analyze(Path::new("./input_files"), Path::new("./statistical_analysis"))
//!     .expect("analytics failed");
//! println!("{}", run.summary.summary);
//! ```

pub mod analytics;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod schema;
pub mod storage;
pub mod trial;

// Re-export key types at crate root for convenience
pub use analytics::{Aggregator, ProfileStore, ReferenceProfile, TrialAccumulator};
pub use config::{Config, ConfigError};
pub use core::{Analyte, NormalizedTrial, Period, TrialNormalizer};
pub use error::{Error, QualityCheckFailure, Result, SchemaViolation};
pub use pipeline::{Pipeline, StageSummary};
pub use quality::{QualityScorer, QualityVerdict};
pub use report::{RunReport, RunStats};
pub use schema::SchemaValidator;
pub use storage::{BlobStore, LocalBlobStore};
pub use trial::{Trial, TrialRow};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
