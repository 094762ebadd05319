//! Configuration management for the Pang session broker.
//!
//! The broker reads an optional JSON file at `~/.pang/config.json` (or the path
//! named by `PANG_CONFIG`), then applies environment overrides.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PORT` → server.port
//! - `PANG_BIND_ADDRESS` → server.host
//! - `POLLINATIONS_TEXT_API_URL` → backend.api_url
//! - `POLLINATIONS_API_KEY` → backend.api_key
//! - `DEFAULT_MODEL` → backend.default_model
//! - `PANG_CONNECTION_TTL_MS` → sessions.ttl_ms
//! - `SELF_PING_URL` → keepalive.url
//! - `PANG_LOG_LEVEL` → observability.log_level
//! - `PANG_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".pang"),
        |dirs| dirs.home_dir().join(".pang"),
    )
}

/// Get the configuration file path.
///
/// `PANG_CONFIG` takes precedence over the default location.
pub fn config_path() -> PathBuf {
    std::env::var("PANG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request bodies above this size are rejected before parsing
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    1_000_000
}

// ============================================================================
// Backend
// ============================================================================

/// Remote text-generation backend and image URL settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token sent with every backend call
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model assigned to new connections
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Backend request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefix for generated image URLs; the encoded prompt is appended
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
            image_base_url: default_image_base_url(),
            image_model: default_image_model(),
        }
    }
}

fn default_api_url() -> String {
    "https://text.pollinations.ai/openai".into()
}

fn default_model() -> String {
    "llama-3.1-8b-instruct-fast".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_image_base_url() -> String {
    "https://image.pollinations.ai/prompt/".into()
}

fn default_image_model() -> String {
    "lyriel-1.5-clean".into()
}

// ============================================================================
// Sessions
// ============================================================================

/// Connection lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a connection is dropped
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    60_000
}

// ============================================================================
// Keepalive
// ============================================================================

/// Periodic self-ping, used on hosts that idle out quiet services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// URL to ping; disabled when unset
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_ping_interval_secs")]
    pub interval_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_ping_interval_secs() -> u64 {
    300
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Aliases: "level" for backward compatibility with existing config files
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    /// Aliases: "format" for backward compatibility with existing config files
    #[serde(default = "default_log_format", alias = "format")]
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
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply process environment overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("PANG_BIND_ADDRESS") {
            self.server.host = host;
        }

        if let Some(url) = lookup("POLLINATIONS_TEXT_API_URL") {
            self.backend.api_url = url;
        }
        if let Some(key) = lookup("POLLINATIONS_API_KEY") {
            self.backend.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            self.backend.default_model = model;
        }

        if let Some(ttl) = lookup("PANG_CONNECTION_TTL_MS").and_then(|t| t.parse().ok()) {
            self.sessions.ttl_ms = ttl;
        }

        if let Some(url) = lookup("SELF_PING_URL") {
            self.keepalive.url = Some(url).filter(|u| !u.is_empty());
        }

        if let Some(level) = lookup("PANG_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("PANG_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Reject settings the broker cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sessions.ttl_ms == 0 {
            return Err(Error::Config("sessions.ttl_ms must be greater than zero".into()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(Error::Config(
                "server.max_body_bytes must be greater than zero".into(),
            ));
        }
        if self.backend.default_model.trim().is_empty() {
            return Err(Error::Config("backend.default_model must not be empty".into()));
        }
        Ok(())
    }

    /// Address string for the HTTP listener. IPv6 hosts are bracketed.
    pub fn listen_addr(&self) -> String {
        let host = self.server.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.server.port)
        } else {
            format!("{}:{}", host, self.server.port)
        }
    }
}
