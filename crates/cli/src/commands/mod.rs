// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod buffers;
pub mod drain;
pub mod ping;
pub mod send;
pub mod status;

use std::path::{Path, PathBuf};

use ew_core::config::default_config_path;
use ew_core::{Settings, Transport, TransportConfig};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{Error, Result};

/// Settings and output options shared by every command.
pub struct Context {
    pub settings: Settings,
    pub transport: TransportConfig,
    /// File the settings came from, or where they would have.
    pub config_path: Option<PathBuf>,
    pub output: OutputFormat,
}

impl Context {
    /// Load settings from `config`, or from the default location.
    pub fn load(config: Option<&Path>, output: OutputFormat) -> Result<Self> {
        let (settings, config_path) = match config {
            Some(path) => (Settings::load(path)?, Some(path.to_path_buf())),
            None => (
                Settings::load_default()?,
                ew_core::env::config_path().or_else(default_config_path),
            ),
        };
        Ok(Self::from_settings(settings, config_path, output))
    }

    pub fn from_settings(
        settings: Settings,
        config_path: Option<PathBuf>,
        output: OutputFormat,
    ) -> Self {
        let transport = TransportConfig::from_settings(&settings);
        Context {
            settings,
            transport,
            config_path,
            output,
        }
    }

    /// A transport that gives up after the first failed attempt.
    pub fn one_shot_transport(&self) -> Transport {
        Transport::new(TransportConfig {
            auto_reconnect: false,
            ..self.transport.clone()
        })
    }

    /// Connect, naming the endpoint on failure.
    pub async fn connect(&self, transport: &Transport) -> Result<()> {
        transport
            .connect()
            .await
            .map_err(|source| Error::Unreachable {
                endpoint: self.transport.endpoint.to_string(),
                source,
            })
    }

    pub fn is_json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
