// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use ewire::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    ewire::logging::setup_logging(cli.verbose, cli.log_file.as_deref());
    if let Err(e) = ewire::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
