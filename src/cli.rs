//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// AdScope - weekly competitor video-ad analysis
///
/// Analyzes the week's top-ranked competitor video creatives with a
/// multimodal model, synthesizes a strategic summary, and tracks rank
/// movement against the previous week's archived snapshot.
///
/// Examples:
///   adscope --input weekly_videos.json
///   adscope --input weekly_videos.json --date 2026-10-19 --format json
///   adscope --input weekly_videos.json --mock
///   adscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file with this week's ranked video items
    ///
    /// Either an array of items or the channel-grouped fetcher export.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Run date of the snapshot (YYYY-MM-DD)
    ///
    /// Defaults to today's local date.
    #[arg(short, long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Directory holding archived weekly snapshots
    #[arg(long, value_name = "DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Output file path for the run digest
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Maximum number of videos analyzed at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Wall-clock limit for one video's analysis, including retries
    #[arg(long, value_name = "SECS")]
    pub task_timeout: Option<u64>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Inference API endpoint URL
    #[arg(long, value_name = "URL", env = "ADSCOPE_ENDPOINT")]
    pub model_endpoint: Option<String>,

    /// Use canned analyses instead of calling the inference service
    #[arg(long)]
    pub mock: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .adscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 if any video could not be analyzed
    #[arg(long)]
    pub fail_on_degraded: bool,

    /// Generate a default .adscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the run digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match &self.input {
            None => return Err("An input file is required (--input)".to_string()),
            Some(path) if !path.is_file() => {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
            Some(_) => {}
        }

        if let Some(endpoint) = &self.model_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Model endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.task_timeout == Some(0) {
            return Err("Task timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The snapshot date: `--date` or today.
    pub fn run_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
