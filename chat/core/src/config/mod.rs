//! TOML Configuration File Support
//!
//! Configuration for a chat session, read from
//! `$XDG_CONFIG_HOME/companion-chat/chat.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The bearer credential is never read from here; callers pass it to the
//! session directly.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "http://localhost:8000"
//! stream_path = "/api/v1/chat/stream"
//! connect_timeout_ms = 10000
//!
//! [reconnect]
//! initial_backoff_ms = 500
//! max_backoff_ms = 30000
//! jitter_ms = 0
//!
//! [auth]
//! timeout_ms = 10000
//! require_ack = false
//!
//! [queue]
//! capacity = 50
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{ConnectionConfig, ReconnectPolicy};
use crate::error::ChatError;
use crate::transport::endpoint::{Endpoint, DEFAULT_STREAM_PATH};

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// HTTP(S) base URL of the backend
    pub base_url: Option<String>,

    /// Path of the chat stream below the base URL
    pub stream_path: Option<String>,

    /// Transport connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Reconnect section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectToml {
    /// First reconnect delay in milliseconds
    pub initial_backoff_ms: Option<u64>,

    /// Reconnect delay cap in milliseconds
    pub max_backoff_ms: Option<u64>,

    /// Random extra delay in milliseconds
    pub jitter_ms: Option<u64>,
}

/// Auth section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthToml {
    /// Authentication acknowledgement timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// Whether to wait for a first server frame before going open
    pub require_ack: Option<bool>,
}

/// Queue section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueToml {
    /// Outbound queue capacity
    pub capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Server section
    pub server: ServerToml,

    /// Reconnect section
    pub reconnect: ReconnectToml,

    /// Auth section
    pub auth: AuthToml,

    /// Queue section
    pub queue: QueueToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved chat configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// HTTP(S) base URL of the backend
    pub base_url: String,

    /// Path of the chat stream below the base URL
    pub stream_path: String,

    /// Connection manager tuning
    pub connection: ConnectionConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            connection: ConnectionConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Derive the stream endpoint from the base URL and path
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidEndpoint` for unsupported URL schemes.
    pub fn endpoint(&self) -> Result<Endpoint, ChatError> {
        Endpoint::from_base_url(&self.base_url, &self.stream_path)
    }

    /// Check values that would make the session misbehave
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.connection.reconnect;
        if policy.initial_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconnect.initial_backoff_ms must be greater than 0".to_string(),
            ));
        }
        if policy.max_delay < policy.initial_delay {
            return Err(ConfigError::ValidationError(
                "reconnect.max_backoff_ms must be at least initial_backoff_ms".to_string(),
            ));
        }
        if self.connection.auth_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "auth.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.connection.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "server.connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.connection.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue.capacity must be greater than 0".to_string(),
            ));
        }
        self.endpoint()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/companion-chat/chat.toml` or
/// `~/.config/companion-chat/chat.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("companion-chat").join("chat.toml"))
}

/// Load configuration from the default path plus environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting configuration is invalid. A missing file is not an error.
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_config(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn load_file(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded configuration from file");
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    if let Some(ref url) = toml.server.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(ref path) = toml.server.stream_path {
        config.stream_path.clone_from(path);
    }
    if let Some(ms) = toml.server.connect_timeout_ms {
        config.connection.connect_timeout = Duration::from_millis(ms);
    }

    let policy: &mut ReconnectPolicy = &mut config.connection.reconnect;
    if let Some(ms) = toml.reconnect.initial_backoff_ms {
        policy.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.reconnect.max_backoff_ms {
        policy.max_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.reconnect.jitter_ms {
        policy.jitter = Duration::from_millis(ms);
    }

    if let Some(ms) = toml.auth.timeout_ms {
        config.connection.auth_timeout = Duration::from_millis(ms);
    }
    if let Some(require) = toml.auth.require_ack {
        config.connection.require_ack = require;
    }

    if let Some(capacity) = toml.queue.capacity {
        config.connection.queue_capacity = capacity;
    }
}

/// Boolean environment value; `None` for anything unrecognised
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment overrides using `lookup` to read variables
fn apply_env_config<F>(config: &mut ChatConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let millis = |key: &str| {
        lookup(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
    };

    if let Some(url) = lookup("CHAT_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("CHAT_STREAM_PATH") {
        config.stream_path = path;
        config.source = ConfigSource::Env;
    }
    if let Some(delay) = millis("CHAT_INITIAL_BACKOFF_MS") {
        config.connection.reconnect.initial_delay = delay;
        config.source = ConfigSource::Env;
    }
    if let Some(delay) = millis("CHAT_MAX_BACKOFF_MS") {
        config.connection.reconnect.max_delay = delay;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = millis("CHAT_AUTH_TIMEOUT_MS") {
        config.connection.auth_timeout = timeout;
        config.source = ConfigSource::Env;
    }
    if let Some(require) = lookup("CHAT_REQUIRE_ACK").and_then(|v| parse_flag(&v)) {
        config.connection.require_ack = require;
        config.source = ConfigSource::Env;
    }
    if let Some(capacity) = lookup("CHAT_QUEUE_CAPACITY").and_then(|v| v.parse::<usize>().ok()) {
        config.connection.queue_capacity = capacity;
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// Require-ack override
    pub require_ack: Option<bool>,

    /// Queue capacity override
    pub queue_capacity: Option<usize>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set require-ack override
    #[must_use]
    pub fn with_require_ack(mut self, require: bool) -> Self {
        self.require_ack = Some(require);
        self
    }

    /// Set queue capacity override
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Apply overrides to a configuration, then re-validate it
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if an override makes the
    /// configuration invalid.
    pub fn apply(&self, config: &mut ChatConfig) -> Result<(), ConfigError> {
        if self.base_url.is_some() || self.require_ack.is_some() || self.queue_capacity.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url.clone_from(url);
        }
        if let Some(require) = self.require_ack {
            config.connection.require_ack = require;
        }
        if let Some(capacity) = self.queue_capacity {
            config.connection.queue_capacity = capacity;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();

        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.stream_path, "/api/v1/chat/stream");
        assert_eq!(config.connection.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(config.connection.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(config.connection.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.connection.queue_capacity, 50);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_endpoint() {
        let endpoint = ChatConfig::default().endpoint().unwrap();
        assert_eq!(endpoint.as_str(), "ws://localhost:8000/api/v1/chat/stream");
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("companion-chat"));
            assert!(p.to_string_lossy().ends_with("chat.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = write_toml(
            r#"
[server]
base_url = "https://chat.example.com/"
connect_timeout_ms = 2500

[reconnect]
initial_backoff_ms = 250
max_backoff_ms = 8000
jitter_ms = 100

[auth]
timeout_ms = 3000
require_ack = true

[queue]
capacity = 10
"#,
        );

        let config = load_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.base_url, "https://chat.example.com/");
        assert_eq!(config.connection.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.connection.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.connection.reconnect.max_delay, Duration::from_secs(8));
        assert_eq!(config.connection.reconnect.jitter, Duration::from_millis(100));
        assert_eq!(config.connection.auth_timeout, Duration::from_secs(3));
        assert!(config.connection.require_ack);
        assert_eq!(config.connection.queue_capacity, 10);
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://chat.example.com/api/v1/chat/stream"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let file = write_toml("[queue]\ncapacity = 5\n");
        let config = load_file(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.connection.queue_capacity, 5);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.connection.auth_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_toml("[queue\ncapacity = ");
        let result = load_file(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_file(Some(PathBuf::from("/nonexistent/companion-chat/chat.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_toml("[server]\nbase_url = \"http://from-file:8000\"\n");
        let mut config = load_file(Some(file.path().to_path_buf())).unwrap();

        apply_env_config(
            &mut config,
            env_of(&[
                ("CHAT_BASE_URL", "http://from-env:9000"),
                ("CHAT_INITIAL_BACKOFF_MS", "100"),
                ("CHAT_REQUIRE_ACK", "true"),
                ("CHAT_QUEUE_CAPACITY", "not-a-number"),
            ]),
        );

        assert_eq!(config.source(), ConfigSource::Env);
        assert_eq!(config.base_url, "http://from-env:9000");
        assert_eq!(config.connection.reconnect.initial_delay, Duration::from_millis(100));
        assert!(config.connection.require_ack);
        // Unparseable values are ignored
        assert_eq!(config.connection.queue_capacity, 50);
    }

    #[test]
    fn test_require_ack_env_false_values() {
        for value in ["0", "false", "FALSE", "no", "off", " Off "] {
            let mut config = ChatConfig::default();
            config.connection.require_ack = true;
            apply_env_config(&mut config, env_of(&[("CHAT_REQUIRE_ACK", value)]));
            assert!(!config.connection.require_ack, "value {value}");
        }
    }

    #[test]
    fn test_require_ack_env_unrecognised_is_ignored() {
        for value in ["maybe", "", "2"] {
            let mut config = ChatConfig::default();
            apply_env_config(&mut config, env_of(&[("CHAT_REQUIRE_ACK", value)]));
            assert!(!config.connection.require_ack, "value {value:?}");
            assert_eq!(config.source(), ConfigSource::Default);
        }

        let mut config = ChatConfig::default();
        apply_env_config(&mut config, env_of(&[("CHAT_REQUIRE_ACK", "yes")]));
        assert!(config.connection.require_ack);
    }

    #[test]
    fn test_validation_rules() {
        let mut config = ChatConfig::default();
        config.connection.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = ChatConfig::default();
        config.connection.reconnect.max_delay = Duration::from_millis(100);
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.connection.reconnect.initial_delay = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.connection.auth_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = ChatConfig::default();
        apply_env_config(&mut config, env_of(&[("CHAT_BASE_URL", "http://env:1")]));

        ConfigOverrides::new()
            .with_base_url("http://cli:2".to_string())
            .with_queue_capacity(3)
            .with_require_ack(true)
            .apply(&mut config)
            .unwrap();

        assert_eq!(config.source(), ConfigSource::Cli);
        assert_eq!(config.base_url, "http://cli:2");
        assert_eq!(config.connection.queue_capacity, 3);
        assert!(config.connection.require_ack);
    }

    #[test]
    fn test_cli_override_validated() {
        let mut config = ChatConfig::default();
        let result = ConfigOverrides::new().with_queue_capacity(0).apply(&mut config);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = ChatConfig::default();
        ConfigOverrides::new().apply(&mut config).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }
}
