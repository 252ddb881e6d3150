//! Configuration loading, validation, and management for frontdesk.
//!
//! Loads configuration from `~/.frontdesk/config.toml` with `.env` and
//! environment variable overrides. Validates all settings at startup.
//! API credentials are never embedded in code and never printed: the
//! `Debug` impl redacts them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.frontdesk/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// The chat model to use
    #[serde(default = "default_model")]
    pub chat_model: String,

    /// Sampling temperature for dialogue turns
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retry policy for the gateway and the grader's re-ask budget
    #[serde(default)]
    pub retry: RetryConfig,

    /// Dispatcher failure-handling policy
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_base_url() -> String {
    "https://open.bigmodel.cn/api/paas/v4".into()
}
fn default_model() -> String {
    "glm-4-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Bounded retry with exponential backoff for gateway calls.
///
/// The defaults mirror the endpoint's documented guidance: 3 attempts,
/// delays of 4s then 8s, capped at 10s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> u64 {
    4
}
fn default_max_delay_secs() -> u64 {
    10
}
fn default_multiplier() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            multiplier: default_multiplier(),
        }
    }
}

/// What the dispatcher and the session driver do when a turn fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Restore the pre-turn history snapshot when a turn fails mid-flight,
    /// so the same user input can be retried without duplicate entries.
    #[serde(default = "default_true")]
    pub rollback_history_on_failure: bool,

    /// Return the session to the main state after a driver-caught error.
    /// Off by default: the active sub-dialogue stays resumable.
    #[serde(default)]
    pub reset_state_on_error: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rollback_history_on_failure: true,
            reset_state_on_error: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.frontdesk/config.toml).
    ///
    /// Loads `.env` from the working directory first, then checks
    /// environment variables for overrides:
    /// - `FRONTDESK_API_KEY` / `OPENAI_API_KEY` (key, in priority order)
    /// - `FRONTDESK_BASE_URL` / `BASE_URL`
    /// - `FRONTDESK_MODEL` / `CHAT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        // Pick up a local .env before reading the environment.
        dotenvy::dotenv().ok();

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FRONTDESK_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("FRONTDESK_BASE_URL").or_else(|_| std::env::var("BASE_URL"))
        {
            config.base_url = url;
        }

        if let Ok(model) =
            std::env::var("FRONTDESK_MODEL").or_else(|_| std::env::var("CHAT_MODEL"))
        {
            config.chat_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".frontdesk")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError("base_url must not be empty".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            retry: RetryConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat_model, "glm-4-flash");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.policy.rollback_history_on_failure);
        assert!(!config.policy.reset_state_on_error);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.base_url, config.base_url);
        assert_eq!(parsed.retry.base_delay_secs, config.retry.base_delay_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let config = AppConfig {
            retry: RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().chat_model, "glm-4-flash");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
base_url = "http://localhost:8080/v1"
chat_model = "local-model"

[retry]
max_attempts = 5

[policy]
reset_state_on_error = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.chat_model, "local-model");
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.policy.reset_state_on_error);
        // Untouched sections keep their defaults
        assert!(config.policy.rollback_history_on_failure);
        assert_eq!(config.retry.base_delay_secs, 4);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
