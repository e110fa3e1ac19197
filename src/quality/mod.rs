//! Quality scoring of new trials against a reference profile.

pub mod scorer;

// Re-export commonly used types
pub use scorer::{QualityScorer, QualityVerdict, FAIL_SCORE, PASS_SCORE};
