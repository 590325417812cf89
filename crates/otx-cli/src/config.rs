//! Configuration file management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use otx_aggregator::PollPolicy;

/// Complete CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Aggregator endpoint.
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    /// Inclusion proof polling.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Trust anchors.
    #[serde(default)]
    pub trust: TrustConfig,
    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Aggregator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// JSON-RPC endpoint URL.
    #[serde(default = "default_aggregator_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Overall budget in seconds. 0 = attempts only.
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

/// Trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    /// JSON trust base file. Empty = none configured.
    #[serde(default)]
    pub trust_base_path: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_aggregator_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    8_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_deadline() -> u64 {
    60
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            url: default_aggregator_url(),
            request_timeout_secs: default_request_timeout(),
            api_key: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            deadline_secs: default_deadline(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl PollingConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.backoff_multiplier,
            deadline: (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs)),
        }
    }
}

impl CliConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file falls back to defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Configured trust base file, if any.
    pub fn trust_base_path(&self) -> Option<PathBuf> {
        (!self.trust.trust_base_path.is_empty()).then(|| PathBuf::from(&self.trust.trust_base_path))
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// `$OTX_HOME`, else `~/.otx`.
    fn home_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("OTX_HOME") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".otx"))
            .unwrap_or_else(|_| PathBuf::from(".otx"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.aggregator.request_timeout_secs, 30);
        assert!(config.aggregator.api_key.is_none());
        assert_eq!(config.polling.max_attempts, 10);
        assert!(config.trust_base_path().is_none());
        assert_eq!(config.polling.policy(), PollPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
            [aggregator]
            url = "https://aggregator.example/rpc"

            [polling]
            max_attempts = 3
            deadline_secs = 0

            [trust]
            trust_base_path = "/etc/otx/trust-base.json"
            "#,
        )
        .expect("parse");
        assert_eq!(config.aggregator.url, "https://aggregator.example/rpc");
        assert_eq!(config.aggregator.request_timeout_secs, 30);
        let policy = config.polling.policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.deadline, None);
        assert_eq!(
            config.trust_base_path(),
            Some(PathBuf::from("/etc/otx/trust-base.json"))
        );
        assert_eq!(config.logging.log_level, "warn");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlog_level = \"debug\"\n").expect("write");
        let config = CliConfig::load(Some(&path)).expect("load");
        assert_eq!(config.logging.log_level, "debug");

        assert!(CliConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = CliConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: CliConfig = toml::from_str(&toml_str).expect("parse");
    }
}
