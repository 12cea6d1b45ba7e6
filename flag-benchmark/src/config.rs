//! Configuration management for the flag benchmark
//!
//! Loads backend, benchmark and output settings from TOML files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::openai::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
use crate::providers::DEFAULT_TEMPERATURE;
use crate::runner::ExecutorConfig;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Completion backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-call timeout; absent means wait indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Benchmark execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Model identities to evaluate, in reporting order
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Attempts per pair before giving up; 0 retries without bound
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Evaluate all models of a record concurrently
    #[serde(default)]
    pub parallel_models: bool,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_failures_file")]
    pub failures_file: String,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
    /// Also write every pair's outcome to `outcomes.json`
    #[serde(default)]
    pub save_outcomes: bool,
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_api_key_env() -> String { DEFAULT_API_KEY_ENV.to_string() }
fn default_models() -> Vec<String> { vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()] }
fn default_temperature() -> f32 { DEFAULT_TEMPERATURE }
fn default_max_attempts() -> u32 { 10 }
fn default_output_dir() -> String { "results".to_string() }
fn default_failures_file() -> String { "failed_requests.json".to_string() }
fn default_summary_file() -> String { "summary.json".to_string() }

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_ms: None,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            models: default_models(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            parallel_models: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            failures_file: default_failures_file(),
            summary_file: default_summary_file(),
            save_outcomes: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = ["config/benchmark.toml", "../config/benchmark.toml"];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Executor settings derived from the benchmark and backend sections
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            temperature: self.benchmark.temperature,
            max_attempts: (self.benchmark.max_attempts > 0).then_some(self.benchmark.max_attempts),
            timeout_ms: self.backend.timeout_ms,
            parallel_models: self.benchmark.parallel_models,
        }
    }

    pub fn failures_path(&self) -> PathBuf {
        Path::new(&self.output.output_dir).join(&self.output.failures_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        Path::new(&self.output.output_dir).join(&self.output.summary_file)
    }

    pub fn outcomes_path(&self) -> PathBuf {
        Path::new(&self.output.output_dir).join("outcomes.json")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
