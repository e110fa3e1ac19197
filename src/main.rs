//! Analyte Quality CLI
//!
//! Schema validation, corpus analytics and quality scoring of gas-sensor
//! trial recordings.

use analyte_quality::{
    config::Config,
    pipeline::{Pipeline, StageSummary},
    report::dated_file_name,
    VERSION,
};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "analyte-quality")]
#[command(version = VERSION)]
#[command(about = "Data-quality pipeline for analyte exposure trials", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every trial file against the fixed schema
    ValidateSchema {
        /// Folder of trial files
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Folder for the schema report
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Build the reference profile of every analyte found
    Analyze {
        /// Folder of trial files
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Folder for the reference profiles
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Score trial files against the stored reference profiles
    Score {
        /// Folder of trial files
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Folder of the reference profiles
        #[arg(long, short)]
        analytics: Option<PathBuf>,

        /// Folder for the quality report
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Schema validation, analytics and scoring in one go
    Run {
        /// Folder of trial files
        #[arg(long, short)]
        input: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    if let Commands::Config { init } = cli.command {
        return cmd_config(&config_path, init);
    }

    let config = Config::load_from(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    init_logging(&config);

    println!("Analyte Quality v{VERSION}");
    println!();

    let pipeline = Pipeline::new(config);
    let config = pipeline.config();

    match cli.command {
        Commands::ValidateSchema { input, output } => {
            let input = input.unwrap_or_else(|| config.samples_path.clone());
            let output = output.unwrap_or_else(|| config.schema_results_path.clone());
            println!("Initiating schema validation...");
            let summary = pipeline
                .validate_schema(&input, &output)
                .context("schema validation aborted")?;
            print_summary(&summary);
        }
        Commands::Analyze { input, output } => {
            let input = input.unwrap_or_else(|| config.samples_path.clone());
            let output = output.unwrap_or_else(|| config.analytics_path.clone());
            println!("Analysing data...");
            let run = pipeline
                .analyze(&input, &output)
                .context("analytics aborted")?;
            for outcome in &run.outcomes {
                println!(
                    "  {}: {} trials included, {} excluded",
                    outcome.profile.analyte,
                    outcome.included.len(),
                    outcome.excluded.len()
                );
            }
            for analyte in &run.empty {
                println!("  {analyte}: no usable trials, no profile built");
            }
            println!("Statistical files generated in {}", output.display());
            print_summary(&run.summary);
        }
        Commands::Score {
            input,
            analytics,
            output,
        } => {
            let input = input.unwrap_or_else(|| config.samples_path.clone());
            let analytics = analytics.unwrap_or_else(|| config.analytics_path.clone());
            let output = output.unwrap_or_else(|| config.quality_results_path.clone());
            println!("Initiating data quality checks...");
            let summary = pipeline
                .score(&input, &analytics, &output)
                .context("quality scoring aborted")?;
            print_summary(&summary);
        }
        Commands::Run { input } => {
            let summaries = pipeline
                .run(input.as_deref())
                .context("pipeline run aborted")?;
            for summary in &summaries {
                print_summary(summary);
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Console logging plus a dated log file under the logs folder. RUST_LOG
/// takes precedence over the configured filter.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match open_log_file(&config.logs_path) {
        Ok(file) => BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            BoxMakeWriter::new(std::io::stdout)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
}

fn open_log_file(dir: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(dir)?;
    let name = dated_file_name("pipeline_log", "log", Local::now());
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
}

fn print_summary(summary: &StageSummary) {
    println!();
    println!("{}", summary.summary);
}

fn cmd_config(path: &Path, init: bool) -> Result<()> {
    if init {
        let config = Config::default();
        config
            .save_to(path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = Config::load_from(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("serializing configuration")?
    );
    Ok(())
}
