// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ewire - command-line client for the eventwire activity pipeline.
//!
//! Wraps [`ew_core`] so scripts and editor hooks can pipe activity events to
//! the local service, check on it, and manage the offline buffer.
//!
//! # Commands
//!
//! - `send` - shape and forward NDJSON events from stdin
//! - `ping` - round-trip a ping to the service
//! - `drain` - replay buffer files left by other sessions
//! - `buffers` - list offline buffer files
//! - `status` - endpoint, buffer and reachability summary

mod cli;
mod commands;
mod env;
pub mod error;
pub mod logging;

pub use cli::{Cli, Command, OutputFormat};
pub use error::{Error, Result};

use clap::CommandFactory;
use clap_complete::generate;

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        output,
        command,
        ..
    } = cli;

    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ewire", &mut std::io::stdout());
            Ok(())
        }
        command => {
            let ctx = commands::Context::load(config.as_deref(), output)?;
            match command {
                Command::Send { wait_ms } => commands::send::run(&ctx, wait_ms).await,
                Command::Ping => commands::ping::run(&ctx).await,
                Command::Drain => commands::drain::run(&ctx).await,
                Command::Buffers => commands::buffers::run(&ctx),
                Command::Status => commands::status::run(&ctx).await,
                Command::Completion { .. } => Ok(()),
            }
        }
    }
}
