//! Configuration management for Chatgate.
//!
//! Configuration lives in a single optional JSON file at
//! `~/.chatgate/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `CHATGATE_HOST` → server.host
//! - `CHATGATE_PORT` → server.port
//! - `CHATGATE_STATIC_DIR` → server.static_dir
//! - `OLLAMA_BASE_URL` → inference.endpoint
//! - `CHATGATE_MODEL` → inference.model
//! - `CHATGATE_LOG_LEVEL` → observability.log_level
//! - `CHATGATE_LOG_FORMAT` → observability.log_format

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".chatgate"),
        |dirs| dirs.home_dir().join(".chatgate"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static browser UI assets.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4470
}

fn default_static_dir() -> String {
    "public".into()
}

// ============================================================================
// Inference Configuration
// ============================================================================

/// Local inference service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the Ollama-compatible inference server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with every generate request.
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "llama3".into()
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is swept, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between background sweep passes, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    600
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Top-level Configuration
// ============================================================================

/// Unified configuration for the Chatgate gateway.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("failed to read {}: {e}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.inference.endpoint = config.inference.endpoint.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CHATGATE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CHATGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(dir) = std::env::var("CHATGATE_STATIC_DIR") {
            self.server.static_dir = dir;
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            self.inference.endpoint = url;
        }
        if let Ok(model) = std::env::var("CHATGATE_MODEL") {
            self.inference.model = model;
        }
        if let Ok(level) = std::env::var("CHATGATE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("CHATGATE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}
