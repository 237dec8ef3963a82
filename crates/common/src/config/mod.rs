//! Configuration management for Snowball
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Scholarly metadata API configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Expansion round tuning
    #[serde(default)]
    pub snowball: SnowballConfig,

    /// Input/output artifact locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Title -> PaperId lookup step
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Client implementation: semantic-scholar, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key, sent as `x-api-key` when present
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Page size for the paginated references/citations endpoints
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Total time budget for retrying a transient failure
    #[serde(default = "default_max_retry_elapsed")]
    pub max_retry_elapsed_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnowballConfig {
    /// Cap on neighbor ids kept per direction per paper
    #[serde(default = "default_max_results_per_direction")]
    pub max_results_per_direction: usize,

    /// Ids per metadata hydration request
    #[serde(default = "default_metadata_batch_size")]
    pub metadata_batch_size: usize,

    /// Flush + checkpoint every N expanded papers
    #[serde(default = "default_save_every")]
    pub save_every: usize,

    /// Pause after each expanded paper, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Source ids listed per output row
    #[serde(default = "default_max_source_papers")]
    pub max_source_papers: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Seed dataset (CSV with a PaperId column)
    #[serde(default = "default_input_path")]
    pub input: PathBuf,

    /// Final discovery dataset
    #[serde(default = "default_output_path")]
    pub output: PathBuf,

    /// Resume snapshot
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint: PathBuf,

    /// Incrementally appended rows; derived from `output` when unset
    pub partial: Option<PathBuf>,

    /// Summary counts; derived from `output` when unset
    pub stats: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupConfig {
    /// Titles to resolve (CSV with Title and optional Publication Year)
    #[serde(default = "default_lookup_input")]
    pub input: PathBuf,

    /// Resolved ids, usable as `paths.input`
    #[serde(default = "default_input_path")]
    pub output: PathBuf,

    /// Pause between search requests, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Normalized title -> known-good identifiers
    #[serde(default = "default_overrides")]
    pub overrides: HashMap<String, ManualOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManualOverride {
    pub doi: String,
    pub paper_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_provider() -> String { "semantic-scholar".to_string() }
fn default_base_url() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 10 }
fn default_page_limit() -> usize { 1000 }
fn default_max_retry_elapsed() -> u64 { 60 }
fn default_max_results_per_direction() -> usize { 2000 }
fn default_metadata_batch_size() -> usize { 200 }
fn default_save_every() -> usize { 200 }
fn default_request_delay_ms() -> u64 { 1000 }
fn default_max_source_papers() -> usize { 5 }
fn default_input_path() -> PathBuf { PathBuf::from("papers_with_ids.csv") }
fn default_output_path() -> PathBuf { PathBuf::from("snowball_output.csv") }
fn default_checkpoint_path() -> PathBuf { PathBuf::from("snowball_checkpoint.json") }
fn default_lookup_input() -> PathBuf { PathBuf::from("ForSnowballing.csv") }
fn default_log_level() -> String { "info".to_string() }

/// Titles whose search hit is known to be the wrong paper
fn default_overrides() -> HashMap<String, ManualOverride> {
    HashMap::from([(
        "assigning change requests to software developers".to_string(),
        ManualOverride {
            doi: "10.1002/smr.530".to_string(),
            paper_id: "7f9082e47fbb0829426b4c91c7bcc9f0c09718b8".to_string(),
        },
    )])
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            page_limit: default_page_limit(),
            max_retry_elapsed_secs: default_max_retry_elapsed(),
        }
    }
}

impl Default for SnowballConfig {
    fn default() -> Self {
        Self {
            max_results_per_direction: default_max_results_per_direction(),
            metadata_batch_size: default_metadata_batch_size(),
            save_every: default_save_every(),
            request_delay_ms: default_request_delay_ms(),
            max_source_papers: default_max_source_papers(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input_path(),
            output: default_output_path(),
            checkpoint: default_checkpoint_path(),
            partial: None,
            stats: None,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            input: default_lookup_input(),
            output: default_input_path(),
            request_delay_ms: default_request_delay_ms(),
            overrides: default_overrides(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SNOWBALL__SAVE_EVERY=50
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ScholarConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn max_retry_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_retry_elapsed_secs)
    }
}

impl SnowballConfig {
    /// Pacing delay applied after each expanded paper
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl PathsConfig {
    /// Partial dataset path (`<output stem>.partial.csv` unless configured)
    pub fn partial_path(&self) -> PathBuf {
        self.partial
            .clone()
            .unwrap_or_else(|| sibling_with_suffix(&self.output, ".partial.csv"))
    }

    /// Stats artifact path (`<output stem>_stats.txt` unless configured)
    pub fn stats_path(&self) -> PathBuf {
        self.stats
            .clone()
            .unwrap_or_else(|| sibling_with_suffix(&self.output, "_stats.txt"))
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "snowball_output".to_string());
    path.with_file_name(format!("{}{}", stem, suffix))
}
