//! Configuration management for flipbench
//!
//! Loads provider, run and path settings from TOML files and provides
//! runtime access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend kind registered in the provider registry (e.g. "openai_chat")
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Shard run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// HTTP request timeout; the only timeout applied to a request
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Count retry causes separately (does not change retry behaviour)
    #[serde(default)]
    pub diagnostics: bool,
}

/// Filesystem layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_missing_dir")]
    pub missing_dir: PathBuf,
    #[serde(default = "default_stats_dir")]
    pub stats_dir: PathBuf,
    #[serde(default = "default_flip_dir")]
    pub flip_dir: PathBuf,
}

// Default value functions
fn default_true() -> bool { true }
fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 8192 }
fn default_max_retries() -> u32 { 5 }
fn default_timeout_ms() -> u64 { 300_000 }
fn default_dataset() -> PathBuf { PathBuf::from("data/mmlu_test.jsonl") }
fn default_temp_dir() -> PathBuf { PathBuf::from("temp") }
fn default_log_dir() -> PathBuf { PathBuf::from("log") }
fn default_output_dir() -> PathBuf { PathBuf::from("output") }
fn default_missing_dir() -> PathBuf { PathBuf::from("log/missing_lists") }
fn default_stats_dir() -> PathBuf { PathBuf::from("output/stats") }
fn default_flip_dir() -> PathBuf { PathBuf::from("output/flips") }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            diagnostics: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            temp_dir: default_temp_dir(),
            log_dir: default_log_dir(),
            output_dir: default_output_dir(),
            missing_dir: default_missing_dir(),
            stats_dir: default_stats_dir(),
            flip_dir: default_flip_dir(),
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
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = ["config/flipbench.toml", "../config/flipbench.toml"];

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
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get enabled provider names
    pub fn enabled_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Get a specific provider config
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = BTreeMap::new();

        providers.insert(
            "together".to_string(),
            ProviderConfig {
                kind: "openai_chat".to_string(),
                enabled: true,
                base_url: "https://api.together.xyz/v1".to_string(),
                api_key_env: "TOGETHER_API_KEY".to_string(),
                default_model: "Qwen/Qwen3-235B-A22B-fp8-tput".to_string(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        );

        providers.insert(
            "nvidia".to_string(),
            ProviderConfig {
                kind: "openai_chat".to_string(),
                enabled: true,
                base_url: "https://integrate.api.nvidia.com/v1".to_string(),
                api_key_env: "NVIDIA_API_KEY".to_string(),
                default_model: "deepseek-ai/deepseek-r1".to_string(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        );

        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                kind: "openai_chat".to_string(),
                enabled: true,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                default_model: "gpt-4o-mini".to_string(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        );

        providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                kind: "gemini".to_string(),
                enabled: true,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                default_model: "gemini-2.0-flash".to_string(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        );

        Self {
            providers,
            run: RunConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.providers.contains_key("together"));
        assert!(config.providers.contains_key("gemini"));
        assert_eq!(config.run.max_retries, 5);
        assert!(!config.run.diagnostics);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[providers.local]
kind = "openai_chat"
base_url = "http://localhost:8000/v1"
api_key_env = "LOCAL_KEY"
default_model = "llama-3"

[run]
max_retries = 2

[paths]
output_dir = "results"
"#;
        let config = Config::from_toml(toml).unwrap();
        let local = config.get_provider("local").unwrap();
        assert_eq!(local.default_model, "llama-3");
        assert!(local.enabled);
        assert_eq!(local.max_tokens, 8192);
        assert_eq!(config.run.max_retries, 2);
        assert_eq!(config.run.timeout_ms, 300_000);
        assert_eq!(config.paths.output_dir, PathBuf::from("results"));
        assert_eq!(config.paths.temp_dir, PathBuf::from("temp"));
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.enabled_providers(), config.enabled_providers());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_toml("[run\nmax_retries = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
