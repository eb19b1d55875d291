//! Configuration management for stagehand
//!
//! Settings are loaded once from environment variables with sensible defaults,
//! validated, and then passed by reference to everything that needs them. No
//! stage reads the environment on its own.
//!
//! # Environment Variables
//!
//! - `STAGEHAND_PROVIDER`: ollama|openai|anthropic|gemini|groq|xai|deepseek|kimi - default: "ollama"
//! - `STAGEHAND_MODEL`: model name - default: provider-specific
//! - `STAGEHAND_API_BASE_URL`: custom endpoint for the provider
//! - `STAGEHAND_REQUEST_TIMEOUT`: seconds per reasoning call - default: "60"
//! - `STAGEHAND_TEMPERATURE`: sampling temperature - default: "0.7"
//! - `STAGEHAND_MAX_TOKENS`: max tokens per reply - default: "4000"
//! - `STAGEHAND_MAX_ATTEMPTS`: reasoning attempts before fallback - default: "1"
//! - `STAGEHAND_MODE`: linear|iterative - default: "linear"
//! - `STAGEHAND_HISTORY_TURNS`: prior turns sent as context - default: "5"
//! - `STAGEHAND_SESSION_FILE`: session history path - default: data dir + "stagehand/session_history.json"
//! - `STAGEHAND_SANDBOX_DIR`: code sandbox directory - default: temp dir + "stagehand-sandbox"
//! - `STAGEHAND_SANDBOX_TIMEOUT`: sandbox wall-clock limit in seconds - default: "30"
//! - `STAGEHAND_PYTHON`: interpreter used by the sandbox - default: "python3"
//! - `STAGEHAND_EXCHANGE_LOG`: optional JSONL log of every reasoning exchange
//! - `STAGEHAND_LOG_LEVEL`: logging level - default: "info"
//!
//! Provider credentials are read by genai from the usual variables
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, `KIMI_API_KEY`, ...).

use crate::llm::{provider_spec, supported_keys};
use crate::pipeline::{PipelineConfig, PipelineMode};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PROVIDER: &str = "ollama";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_MAX_ATTEMPTS: u32 = 1;
const DEFAULT_HISTORY_TURNS: usize = 5;
const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PYTHON: &str = "python3";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid provider name
    #[error("Invalid provider: {0}. Valid options: {1}")]
    InvalidProvider(String, String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct StagehandConfig {
    /// Provider factory key
    pub provider: String,

    /// Model override; `None` uses the provider default
    pub model: Option<String>,

    /// Custom endpoint for the provider
    pub api_base_url: Option<String>,

    pub request_timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Attempts per reasoning call before a stage substitutes its fallback
    pub max_attempts: u32,

    pub mode: PipelineMode,

    /// Number of prior session turns passed to the reasoning service
    pub history_turns: usize,

    pub session_file: PathBuf,
    pub sandbox_dir: PathBuf,
    pub sandbox_timeout_secs: u64,
    pub python: String,

    /// JSONL exchange log; disabled when `None`
    pub exchange_log: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for StagehandConfig {
    /// Loads from `STAGEHAND_*` environment variables, falling back to
    /// [`StagehandConfig::builtin`] for anything missing or unparsable.
    fn default() -> Self {
        let builtin = Self::builtin();

        Self {
            provider: env::var("STAGEHAND_PROVIDER")
                .map(|v| v.trim().to_lowercase())
                .unwrap_or(builtin.provider),
            model: env::var("STAGEHAND_MODEL").ok().filter(|v| !v.is_empty()),
            api_base_url: env::var("STAGEHAND_API_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            request_timeout_secs: parse_env("STAGEHAND_REQUEST_TIMEOUT")
                .unwrap_or(builtin.request_timeout_secs),
            temperature: parse_env("STAGEHAND_TEMPERATURE").unwrap_or(builtin.temperature),
            max_tokens: parse_env("STAGEHAND_MAX_TOKENS").unwrap_or(builtin.max_tokens),
            max_attempts: parse_env("STAGEHAND_MAX_ATTEMPTS").unwrap_or(builtin.max_attempts),
            mode: parse_env("STAGEHAND_MODE").unwrap_or(builtin.mode),
            history_turns: parse_env("STAGEHAND_HISTORY_TURNS").unwrap_or(builtin.history_turns),
            session_file: env::var("STAGEHAND_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(builtin.session_file),
            sandbox_dir: env::var("STAGEHAND_SANDBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or(builtin.sandbox_dir),
            sandbox_timeout_secs: parse_env("STAGEHAND_SANDBOX_TIMEOUT")
                .unwrap_or(builtin.sandbox_timeout_secs),
            python: env::var("STAGEHAND_PYTHON").unwrap_or(builtin.python),
            exchange_log: env::var("STAGEHAND_EXCHANGE_LOG")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_level: env::var("STAGEHAND_LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(builtin.log_level),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl StagehandConfig {
    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        let session_file = dirs::data_dir()
            .unwrap_or_else(env::temp_dir)
            .join("stagehand")
            .join("session_history.json");

        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: None,
            api_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mode: PipelineMode::Linear,
            history_turns: DEFAULT_HISTORY_TURNS,
            session_file,
            sandbox_dir: env::temp_dir().join("stagehand-sandbox"),
            sandbox_timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
            python: DEFAULT_PYTHON.to_string(),
            exchange_log: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown provider or any value outside its
    /// accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if provider_spec(&self.provider).is_none() {
            return Err(ConfigError::InvalidProvider(
                self.provider.clone(),
                supported_keys().join(", "),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if !(100..=32_000).contains(&self.max_tokens) {
            return Err(ConfigError::ValidationFailed(format!(
                "Max tokens must be between 100 and 32000, got {}",
                self.max_tokens
            )));
        }

        if !(1..=10).contains(&self.max_attempts) {
            return Err(ConfigError::ValidationFailed(format!(
                "Max attempts must be between 1 and 10, got {}",
                self.max_attempts
            )));
        }

        if self.sandbox_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Sandbox timeout must be at least 1 second".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Stage-level settings derived from this configuration
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_mode(self.mode)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_max_attempts(self.max_attempts)
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_timeout_secs)
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert("provider".to_string(), self.provider.clone());
        map.insert(
            "model".to_string(),
            self.model.clone().unwrap_or_else(|| {
                provider_spec(&self.provider)
                    .map(|spec| spec.default_model.to_string())
                    .unwrap_or_default()
            }),
        );
        if let Some(ref url) = self.api_base_url {
            map.insert("api_base_url".to_string(), url.clone());
        }
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert("temperature".to_string(), self.temperature.to_string());
        map.insert("max_tokens".to_string(), self.max_tokens.to_string());
        map.insert("max_attempts".to_string(), self.max_attempts.to_string());
        map.insert("mode".to_string(), self.mode.to_string());
        map.insert("history_turns".to_string(), self.history_turns.to_string());
        map.insert(
            "session_file".to_string(),
            self.session_file.display().to_string(),
        );
        map.insert(
            "sandbox_dir".to_string(),
            self.sandbox_dir.display().to_string(),
        );
        map.insert(
            "sandbox_timeout_secs".to_string(),
            self.sandbox_timeout_secs.to_string(),
        );
        map.insert("python".to_string(), self.python.clone());
        if let Some(ref path) = self.exchange_log {
            map.insert("exchange_log".to_string(), path.display().to_string());
        }
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for StagehandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stagehand Configuration:")?;
        for (key, value) in self.to_display_map() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("STAGEHAND_PROVIDER"),
            EnvGuard::unset("STAGEHAND_MODEL"),
            EnvGuard::unset("STAGEHAND_MAX_ATTEMPTS"),
            EnvGuard::unset("STAGEHAND_MODE"),
            EnvGuard::unset("STAGEHAND_REQUEST_TIMEOUT"),
            EnvGuard::set("STAGEHAND_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = StagehandConfig::default();

        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert!(config.model.is_none());
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.mode, PipelineMode::Linear);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("STAGEHAND_PROVIDER", "Claude"),
            EnvGuard::set("STAGEHAND_MODEL", "custom-model"),
            EnvGuard::set("STAGEHAND_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("STAGEHAND_MAX_ATTEMPTS", "3"),
            EnvGuard::set("STAGEHAND_MODE", "iterative"),
            EnvGuard::set("STAGEHAND_TEMPERATURE", "0.2"),
            EnvGuard::set("STAGEHAND_EXCHANGE_LOG", "/tmp/exchanges.jsonl"),
        ];

        let config = StagehandConfig::default();

        assert_eq!(config.provider, "claude");
        assert_eq!(config.model.as_deref(), Some("custom-model"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.mode, PipelineMode::Iterative);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(
            config.exchange_log,
            Some(PathBuf::from("/tmp/exchanges.jsonl"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back() {
        let _guards = vec![
            EnvGuard::set("STAGEHAND_MAX_TOKENS", "lots"),
            EnvGuard::set("STAGEHAND_MODE", "sideways"),
        ];

        let config = StagehandConfig::default();

        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.mode, PipelineMode::Linear);
    }

    #[test]
    fn test_validation_rejects_unknown_provider() {
        let config = StagehandConfig {
            provider: "watson".to_string(),
            ..StagehandConfig::builtin()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProvider(ref name, _)) if name == "watson"
        ));
    }

    #[test]
    fn test_validation_ranges() {
        let base = StagehandConfig::builtin();

        let mut config = base.clone();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.max_tokens = 50;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = base;
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_derivation() {
        let config = StagehandConfig {
            max_attempts: 2,
            request_timeout_secs: 15,
            mode: PipelineMode::Iterative,
            ..StagehandConfig::builtin()
        };

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_attempts, 2);
        assert_eq!(pipeline.request_timeout, Duration::from_secs(15));
        assert_eq!(pipeline.mode, PipelineMode::Iterative);
        assert_eq!(pipeline.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_config_display() {
        let config = StagehandConfig::builtin();
        let display = format!("{}", config);
        assert!(display.contains("Stagehand Configuration:"));
        assert!(display.contains("provider: ollama"));
        assert!(display.contains("model: qwen2.5:7b"));
    }
}
