//! Dated run reports.
//!
//! Each stage run appends one line per trial to a report file named after
//! the moment the run started, and keeps pass / fail / error counters for
//! the summary printed at the end.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Timestamp format used in report and log file names.
pub const FILE_DATE_FORMAT: &str = "%Y_%m_%d_%H_%M_%S_%p";

/// `<prefix>_<date>.<extension>` for the given moment.
pub fn dated_file_name(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{prefix}_{}.{extension}", at.format(FILE_DATE_FORMAT))
}

/// Which stage a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Schema,
    Analytics,
    Quality,
}

impl ReportKind {
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportKind::Schema => "schema_check",
            ReportKind::Analytics => "analytics",
            ReportKind::Quality => "data_quality_check",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ReportKind::Schema => "Schema validation",
            ReportKind::Analytics => "Corpus aggregation",
            ReportKind::Quality => "Data quality scoring",
        }
    }

    fn pass_line(&self, file: &str) -> String {
        match self {
            ReportKind::Schema => format!("{file} Schema check: PASS"),
            ReportKind::Analytics => format!("{file} included"),
            ReportKind::Quality => format!("{file} Data quality score: 100"),
        }
    }

    fn fail_line(&self, file: &str, reason: &str) -> String {
        match self {
            ReportKind::Schema => format!("{file}  ---ERROR--- {reason}"),
            ReportKind::Analytics => format!("{file} excluded: {reason}"),
            ReportKind::Quality => format!("{file} Data quality score: 0"),
        }
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Trials that passed every check
    pub passed: u64,
    /// Trials rejected by a check
    pub failed: u64,
    /// Trials that could not be processed at all
    pub errored: u64,
}

impl RunStats {
    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.errored
    }
}

/// Report of one stage run.
#[derive(Debug)]
pub struct RunReport {
    kind: ReportKind,
    stats: RunStats,
    started: DateTime<Utc>,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl RunReport {
    /// A report that only counts, without a backing file.
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            stats: RunStats::default(),
            started: Utc::now(),
            path: None,
            writer: None,
        }
    }

    /// A report appending to a new dated file under `dir`.
    pub fn create(kind: ReportKind, dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let started = Utc::now();
        let name = dated_file_name(kind.file_prefix(), "csv", started.with_timezone(&Local));
        let path = dir.join(name);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        tracing::debug!(path = %path.display(), "report file opened");

        Ok(Self {
            kind,
            stats: RunStats::default(),
            started,
            path: Some(path),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    /// Record a trial that passed.
    pub fn record_pass(&mut self, file: &str) -> io::Result<()> {
        self.stats.passed += 1;
        let line = self.kind.pass_line(file);
        self.write_line(&line)
    }

    /// Record a trial rejected by a check.
    pub fn record_fail(&mut self, file: &str, reason: &str) -> io::Result<()> {
        self.stats.failed += 1;
        let line = self.kind.fail_line(file, reason);
        self.write_line(&line)
    }

    /// Record a trial that could not be processed.
    pub fn record_error(&mut self, file: &str, error: &str) -> io::Result<()> {
        self.stats.errored += 1;
        let line = self.kind.fail_line(file, error);
        self.write_line(&line)
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats;
        let elapsed = (Utc::now() - self.started).num_milliseconds().max(0) as f64 / 1000.0;
        let mut summary = format!(
            "{} summary:\n\
             - Trials processed: {}\n\
             - Passed: {}\n\
             - Failed: {}\n\
             - Errored: {}\n\
             - Duration: {elapsed:.1} seconds",
            self.kind.title(),
            stats.total(),
            stats.passed,
            stats.failed,
            stats.errored,
        );
        if let Some(path) = &self.path {
            summary.push_str(&format!("\n- Report: {}", path.display()));
        }
        summary
    }

    /// Flush the backing file and return the final counters.
    pub fn finish(mut self) -> io::Result<RunStats> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(self.stats)
    }
}
