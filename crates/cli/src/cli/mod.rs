// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for command results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "ewire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ship editor and terminal activity to the local activity service")]
#[command(
    long_about = "Ship editor and terminal activity to the local activity service.\n\n\
    Events are shaped (ignored paths, rate limit, debounce, dedupe, batching) and\n\
    delivered over a local socket. While the service is down they are buffered on\n\
    disk and replayed once it is back."
)]
pub struct Cli {
    /// Read settings from this file instead of the default location
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "path")]
    pub log_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Shape and forward activity events read from stdin
    #[command(after_help = "\
Input is one JSON event per line:
  {\"kind\":\"file_edit\",\"resource_id\":\"src/main.rs\",\"payload\":{\"content\":\"...\"}}

Events that cannot be delivered are buffered on disk.")]
    Send {
        /// Let shaping timers run this long after end of input before flushing
        #[arg(long, value_name = "ms", default_value_t = 0)]
        wait_ms: u64,
    },

    /// Check that the service answers and report the round trip
    Ping,

    /// Replay buffer files left by other sessions
    Drain,

    /// List offline buffer files
    Buffers,

    /// Show endpoint, buffer and reachability
    Status,

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  ewire completion bash > ~/.local/share/bash-completion/completions/ewire
  ewire completion zsh > ~/.zfunc/_ewire")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
