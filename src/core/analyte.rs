//! Analyte lookup table.
//!
//! Every analyte-specific constant (phase vocabulary, humidity limit,
//! response thresholds) lives in one static table keyed by [`Analyte`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of analytes a trial can expose the sensor array to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyte {
    Butanal,
    No2,
    No,
    Nh3,
    Ch2o,
    Ethanol,
    Nicotine,
}

impl Analyte {
    /// Order in which `run_name` tokens are matched. The first analyte of
    /// this list present as a token wins.
    pub const DETECTION_ORDER: [Analyte; 7] = [
        Analyte::Butanal,
        Analyte::No2,
        Analyte::No,
        Analyte::Nh3,
        Analyte::Ch2o,
        Analyte::Ethanol,
        Analyte::Nicotine,
    ];

    /// Lowercase name as it appears in run names and profile keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Analyte::Butanal => "butanal",
            Analyte::No2 => "no2",
            Analyte::No => "no",
            Analyte::Nh3 => "nh3",
            Analyte::Ch2o => "ch2o",
            Analyte::Ethanol => "ethanol",
            Analyte::Nicotine => "nicotine",
        }
    }

    /// Identify the analyte from an underscore-delimited run name.
    pub fn detect(run_name: &str) -> Option<Analyte> {
        let tokens: Vec<&str> = run_name.split('_').collect();
        Self::DETECTION_ORDER
            .into_iter()
            .find(|analyte| tokens.contains(&analyte.as_str()))
    }

    /// The fixed behaviour table entry for this analyte.
    pub fn profile(&self) -> &'static AnalyteProfile {
        match self {
            Analyte::Butanal => &BUTANAL,
            Analyte::No2 => &NO2,
            Analyte::No => &NO,
            Analyte::Nh3 => &NH3,
            Analyte::Ch2o => &CH2O,
            Analyte::Ethanol => &ETHANOL,
            Analyte::Nicotine => &NICOTINE,
        }
    }
}

impl fmt::Display for Analyte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Analyte {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::DETECTION_ORDER
            .into_iter()
            .find(|analyte| analyte.as_str() == lowered)
            .ok_or_else(|| format!("unknown analyte '{s}'"))
    }
}

/// Per-row predicate applied to a normalized exposure value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    AbsAbove(f64),
    Above(f64),
    Below(f64),
    AbsBelow(f64),
}

impl Predicate {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Predicate::AbsAbove(t) => value.abs() > t,
            Predicate::Above(t) => value > t,
            Predicate::Below(t) => value < t,
            Predicate::AbsBelow(t) => value.abs() < t,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::AbsAbove(t) => write!(f, "abs(v) > {t}"),
            Predicate::Above(t) => write!(f, "v > {t}"),
            Predicate::Below(t) => write!(f, "v < {t}"),
            Predicate::AbsBelow(t) => write!(f, "abs(v) < {t}"),
        }
    }
}

/// How a channel count is compared with a rule's bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailWhen {
    FewerThan,
    MoreThan,
    AtLeast,
}

/// One row of the response/exposure threshold table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseRule {
    pub predicate: Predicate,
    pub bound: usize,
    pub fail_when: FailWhen,
}

impl ResponseRule {
    pub fn fails(&self, count: usize) -> bool {
        match self.fail_when {
            FailWhen::FewerThan => count < self.bound,
            FailWhen::MoreThan => count > self.bound,
            FailWhen::AtLeast => count >= self.bound,
        }
    }

    /// Human readable fail condition, e.g. `count < 3`.
    pub fn fail_condition(&self) -> String {
        let op = match self.fail_when {
            FailWhen::FewerThan => "<",
            FailWhen::MoreThan => ">",
            FailWhen::AtLeast => ">=",
        };
        format!("count {op} {}", self.bound)
    }
}

/// Fixed phase vocabulary and check parameters for one analyte.
#[derive(Debug)]
pub struct AnalyteProfile {
    pub analyte: Analyte,
    /// Every valid `label` value, in trial order
    pub phases: &'static [&'static str],
    pub baseline_labels: &'static [&'static str],
    pub exposure_labels: &'static [&'static str],
    pub recovery_labels: &'static [&'static str],
    /// Maximum humidity swing inside the baseline or exposure window
    pub humidity_limit: Option<f64>,
    pub response_rules: &'static [ResponseRule],
}

impl AnalyteProfile {
    pub fn is_known_phase(&self, label: &str) -> bool {
        self.phases.contains(&label)
    }
}

const BASELINE: &[&str] = &["baseline"];
const EXPOSURE: &[&str] = &["exposure"];
const RECOVERY: &[&str] = &["recovery"];
const STANDARD_PHASES: &[&str] = &["baseline", "exposure", "recovery"];

const NO_RULES: &[ResponseRule] = &[
    ResponseRule {
        predicate: Predicate::AbsAbove(0.02),
        bound: 3,
        fail_when: FailWhen::FewerThan,
    },
    ResponseRule {
        predicate: Predicate::Above(0.01),
        bound: 4,
        fail_when: FailWhen::MoreThan,
    },
];

static BUTANAL: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::Butanal,
    phases: STANDARD_PHASES,
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: RECOVERY,
    humidity_limit: Some(4.0),
    response_rules: &[ResponseRule {
        predicate: Predicate::AbsAbove(0.02),
        bound: 4,
        fail_when: FailWhen::FewerThan,
    }],
};

static NO2: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::No2,
    phases: STANDARD_PHASES,
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: RECOVERY,
    humidity_limit: Some(3.0),
    response_rules: NO_RULES,
};

static NO: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::No,
    phases: STANDARD_PHASES,
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: RECOVERY,
    humidity_limit: Some(3.0),
    response_rules: NO_RULES,
};

static NH3: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::Nh3,
    phases: &[
        "baseline",
        "exposure",
        "open_recovery",
        "tape_recovery",
        "withouttape_close_recovery",
        "recovery",
    ],
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: &["open_recovery"],
    humidity_limit: None,
    response_rules: &[
        ResponseRule {
            predicate: Predicate::Below(0.005),
            bound: 2,
            fail_when: FailWhen::AtLeast,
        },
        ResponseRule {
            predicate: Predicate::AbsBelow(0.01),
            bound: 13,
            fail_when: FailWhen::AtLeast,
        },
    ],
};

static CH2O: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::Ch2o,
    phases: STANDARD_PHASES,
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: RECOVERY,
    humidity_limit: None,
    response_rules: &[],
};

static ETHANOL: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::Ethanol,
    phases: &["baseline", "low", "med", "high", "recovery"],
    baseline_labels: BASELINE,
    exposure_labels: &["low", "med", "high"],
    recovery_labels: RECOVERY,
    humidity_limit: None,
    response_rules: &[ResponseRule {
        predicate: Predicate::AbsAbove(0.05),
        bound: 3,
        fail_when: FailWhen::FewerThan,
    }],
};

static NICOTINE: AnalyteProfile = AnalyteProfile {
    analyte: Analyte::Nicotine,
    phases: STANDARD_PHASES,
    baseline_labels: BASELINE,
    exposure_labels: EXPOSURE,
    recovery_labels: RECOVERY,
    humidity_limit: None,
    response_rules: &[],
};
