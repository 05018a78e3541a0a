// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Settings are read from `config.toml` in the user config directory
//! (`~/.config/eventwire/` on Linux) or from the path in `EVENTWIRE_CONFIG`.
//! Every field has a default, so an absent or empty file is valid:
//!
//! ```toml
//! endpoint = "/tmp/eventwire-alice.sock"
//!
//! [transport]
//! reconnect_delay_ms = 1000
//! max_buffer_size = 10485760
//!
//! [shaper]
//! max_events_per_second = 10
//! ignore_patterns = ["**/node_modules/**", "*.log"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::env;
use crate::error::ConfigError;

/// Upper bound on the wait between reconnect attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

const APP_DIR_NAME: &str = "eventwire";
const CONFIG_FILE_NAME: &str = "config.toml";
const BUFFER_DIR_NAME: &str = "buffer";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Service address; defaults to the per-user socket or pipe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Directory for offline buffer files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_dir: Option<PathBuf>,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub shaper: ShaperConfig,
}

/// Connection and buffering settings from the `[transport]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Reconnect automatically after a lost connection or failed attempt.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Base reconnect delay; attempt N waits `N.min(5)` times this.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Silence after which a connection is considered dead. 0 disables.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Write events to disk while disconnected.
    #[serde(default = "default_true")]
    pub buffering_enabled: bool,
    /// Size at which the active buffer file is rotated.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: u64,
    /// Client name sent in the handshake.
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        TransportSettings {
            auto_reconnect: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            buffering_enabled: true,
            max_buffer_size: default_max_buffer_size(),
            client_name: default_client_name(),
        }
    }
}

/// Runtime transport configuration with resolved paths and durations.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub endpoint: Endpoint,
    pub buffer_dir: PathBuf,
    pub auto_reconnect: bool,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// `None` disables staleness detection.
    pub heartbeat_timeout: Option<Duration>,
    pub buffering_enabled: bool,
    pub max_buffer_size: u64,
    pub client_name: String,
}

impl TransportConfig {
    /// Builds a config from settings, resolving the endpoint and buffer
    /// directory through environment overrides and platform defaults.
    pub fn from_settings(settings: &Settings) -> Self {
        let endpoint = env::endpoint()
            .or_else(|| settings.endpoint.clone())
            .map(|address| Endpoint::parse(&address))
            .unwrap_or_else(Endpoint::for_user);
        let buffer_dir = env::buffer_dir()
            .or_else(|| settings.buffer_dir.clone())
            .unwrap_or_else(default_buffer_dir);
        Self::with_paths(&settings.transport, endpoint, buffer_dir)
    }

    /// Builds a config with explicit endpoint and buffer directory.
    pub fn with_paths(settings: &TransportSettings, endpoint: Endpoint, buffer_dir: PathBuf) -> Self {
        TransportConfig {
            endpoint,
            buffer_dir,
            auto_reconnect: settings.auto_reconnect,
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            heartbeat_timeout: match settings.heartbeat_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            buffering_enabled: settings.buffering_enabled,
            max_buffer_size: settings.max_buffer_size,
            client_name: settings.client_name.clone(),
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), never longer than
    /// [`MAX_RECONNECT_DELAY`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_delay
            .saturating_mul(attempt.clamp(1, 5))
            .min(MAX_RECONNECT_DELAY)
    }
}

/// Traffic shaping settings from the `[shaper]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaperConfig {
    #[serde(default = "default_true")]
    pub ignore_enabled: bool,
    /// Glob patterns matched against `resource_id`.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_max_events_per_second")]
    pub max_events_per_second: u32,
    #[serde(default = "default_true")]
    pub debounce_enabled: bool,
    #[serde(default = "default_debounce_delay_ms")]
    pub debounce_delay_ms: u64,
    #[serde(default = "default_true")]
    pub dedupe_enabled: bool,
    #[serde(default = "default_dedupe_window_ms")]
    pub dedupe_window_ms: u64,
    #[serde(default = "default_true")]
    pub batch_enabled: bool,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        ShaperConfig {
            ignore_enabled: true,
            ignore_patterns: default_ignore_patterns(),
            rate_limit_enabled: true,
            max_events_per_second: default_max_events_per_second(),
            debounce_enabled: true,
            debounce_delay_ms: default_debounce_delay_ms(),
            dedupe_enabled: true,
            dedupe_window_ms: default_dedupe_window_ms(),
            batch_enabled: true,
            max_batch_size: default_max_batch_size(),
            batch_window_ms: default_batch_window_ms(),
        }
    }
}

impl ShaperConfig {
    /// A config with every stage switched off; events pass straight through.
    pub fn passthrough() -> Self {
        ShaperConfig {
            ignore_enabled: false,
            rate_limit_enabled: false,
            debounce_enabled: false,
            dedupe_enabled: false,
            batch_enabled: false,
            ..ShaperConfig::default()
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses and validates TOML settings.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads from `EVENTWIRE_CONFIG` or the default location, falling back
    /// to defaults when no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        match env::config_path().or_else(default_config_path) {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Settings::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shaper.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "shaper.max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.transport.max_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "transport.max_buffer_size must be at least 1".to_string(),
            ));
        }
        if self.transport.client_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "transport.client_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file path: `{config_dir}/eventwire/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Default buffer directory: `{data_local_dir}/eventwire/buffer`.
pub fn default_buffer_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(BUFFER_DIR_NAME)
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    30_000
}

fn default_max_buffer_size() -> u64 {
    10 * 1024 * 1024
}

fn default_client_name() -> String {
    "eventwire".to_string()
}

fn default_ignore_patterns() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/.git/**",
        "**/target/**",
        "**/dist/**",
        "**/__pycache__/**",
        "*.log",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_max_events_per_second() -> u32 {
    10
}

fn default_debounce_delay_ms() -> u64 {
    500
}

fn default_dedupe_window_ms() -> u64 {
    1_000
}

fn default_max_batch_size() -> usize {
    50
}

fn default_batch_window_ms() -> u64 {
    100
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
