//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.adscope.toml` files. API keys are never read from here.

use crate::inference::GeminiConfig;
use crate::retry::RetryPolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".adscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Inference service settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry settings shared by extraction and synthesis.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Archive and cache locations.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default digest output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Maximum number of concurrent video analyses.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock limit per video task, retries included.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: u64,

    /// Maximum number of items accepted per run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
            task_timeout_seconds: default_task_timeout(),
            max_items: default_max_items(),
        }
    }
}

fn default_output() -> String {
    "weekly_digest.md".to_string()
}

fn default_concurrency() -> usize {
    crate::analysis::dispatcher::DEFAULT_WORKERS
}

fn default_task_timeout() -> u64 {
    300
}

fn default_max_items() -> usize {
    crate::source::DEFAULT_MAX_ITEMS
}

/// Inference service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Models tried in order for per-video extraction.
    #[serde(default = "default_extraction_models")]
    pub extraction_models: Vec<String>,

    /// Models tried in order for the strategic summary.
    #[serde(default = "default_synthesis_models")]
    pub synthesis_models: Vec<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            extraction_models: default_extraction_models(),
            synthesis_models: default_synthesis_models(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    GeminiConfig::default().endpoint
}

fn default_extraction_models() -> Vec<String> {
    GeminiConfig::default().extraction_models
}

fn default_synthesis_models() -> Vec<String> {
    GeminiConfig::default().synthesis_models
}

fn default_request_timeout() -> u64 {
    120
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2000
}

fn default_max_backoff() -> u64 {
    60_000
}

/// Archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory of dated snapshot files.
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    /// Analysis cache file name, relative to `dir` unless absolute.
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            cache_file: default_cache_file(),
        }
    }
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archive")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("analysis_cache.json")
}

impl ArchiveConfig {
    /// Resolved location of the analysis cache.
    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(&self.cache_file)
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via their
    /// environment variable) replace file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.task_timeout {
            self.general.task_timeout_seconds = timeout;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref endpoint) = args.model_endpoint {
            self.model.endpoint = endpoint.clone();
        }
        if let Some(ref dir) = args.archive_dir {
            self.archive.dir = dir.clone();
        }
    }

    /// Reject settings the run cannot work with, wherever they came from.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            bail!("Concurrency must be at least 1");
        }
        if self.general.task_timeout_seconds == 0 {
            bail!("Task timeout must be at least 1 second");
        }
        Ok(())
    }

    /// Retry policy described by the `[retry]` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            backoff_base: Duration::from_millis(self.retry.backoff_base_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
        }
    }

    /// Client settings for the Gemini API.
    pub fn gemini_config(&self, api_key: String) -> GeminiConfig {
        GeminiConfig {
            endpoint: self.model.endpoint.clone(),
            api_key,
            extraction_models: self.model.extraction_models.clone(),
            synthesis_models: self.model.synthesis_models.clone(),
            timeout_seconds: self.model.request_timeout_seconds,
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.general.task_timeout_seconds)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, OutputFormat};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.concurrency, 15);
        assert_eq!(config.general.task_timeout_seconds, 300);
        assert_eq!(config.general.max_items, 60);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.archive.cache_path(),
            PathBuf::from("archive/analysis_cache.json")
        );
        assert!(!config.model.extraction_models.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
concurrency = 5
output = "digest.md"

[model]
endpoint = "http://localhost:8080"
extraction_models = ["gemini-2.5-flash"]

[retry]
max_attempts = 5
backoff_base_ms = 500

[archive]
dir = "/var/lib/adscope"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.concurrency, 5);
        assert_eq!(config.general.output, "digest.md");
        assert_eq!(config.general.task_timeout_seconds, 300);
        assert_eq!(config.model.endpoint, "http://localhost:8080");
        assert_eq!(config.model.extraction_models, vec!["gemini-2.5-flash"]);
        assert_eq!(config.model.synthesis_models, default_synthesis_models());

        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.backoff_base, Duration::from_millis(500));
        assert_eq!(retry.max_backoff, Duration::from_secs(60));
        assert_eq!(
            config.archive.cache_path(),
            PathBuf::from("/var/lib/adscope/analysis_cache.json")
        );
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config: Config = toml::from_str("[general]\nconcurrency = 5\n").unwrap();
        let args = Args {
            input: None,
            date: None,
            archive_dir: Some(PathBuf::from("runs")),
            output: None,
            format: OutputFormat::Markdown,
            concurrency: None,
            task_timeout: Some(60),
            api_key: None,
            model_endpoint: None,
            mock: false,
            config: None,
            verbose: false,
            quiet: false,
            fail_on_degraded: false,
            init_config: false,
        };
        config.merge_with_args(&args);

        assert_eq!(config.general.concurrency, 5);
        assert_eq!(config.task_timeout(), Duration::from_secs(60));
        assert_eq!(config.archive.dir, PathBuf::from("runs"));
        assert_eq!(config.general.output, "weekly_digest.md");
    }

    #[test]
    fn test_zero_limits_from_file_rejected() {
        let config: Config = toml::from_str("[general]\ntask_timeout_seconds = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Task timeout must be at least 1"));

        let config: Config = toml::from_str("[general]\nconcurrency = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Concurrency must be at least 1"));

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_gemini_config_carries_key() {
        let gemini = Config::default().gemini_config("secret".to_string());
        assert_eq!(gemini.api_key, "secret");
        assert_eq!(gemini.timeout_seconds, 120);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[archive]"));
        assert!(!toml_str.contains("api_key"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.general.concurrency, 15);
    }
}
