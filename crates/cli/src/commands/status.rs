// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Summarize where the client points and what it holds.
//!
//! Reachability is probed with a bare socket connect, so checking status
//! never replays buffered events.

use std::path::PathBuf;

use ew_core::transport::{list_files, Connector, LocalSocketConnector};
use serde::Serialize;

use super::{format_size, print_json, Context};
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct Status {
    pub endpoint: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub buffer_dir: PathBuf,
    pub buffered_files: usize,
    pub buffered_bytes: u64,
    pub config_path: Option<PathBuf>,
    pub config_found: bool,
}

pub async fn run(ctx: &Context) -> Result<()> {
    let status = collect(ctx).await?;
    if ctx.is_json() {
        print_json(&status)
    } else {
        print!("{}", format_status(&status));
        Ok(())
    }
}

pub async fn collect(ctx: &Context) -> Result<Status> {
    let endpoint = ctx.transport.endpoint.clone();
    let connector = LocalSocketConnector::new(endpoint.clone());
    let error = match tokio::time::timeout(ctx.transport.connect_timeout, connector.connect()).await
    {
        Ok(Ok(_link)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!(
            "timed out after {} ms",
            ctx.transport.connect_timeout.as_millis()
        )),
    };

    let files = list_files(&ctx.transport.buffer_dir)?;
    Ok(Status {
        endpoint: endpoint.to_string(),
        reachable: error.is_none(),
        error,
        buffer_dir: ctx.transport.buffer_dir.clone(),
        buffered_files: files.len(),
        buffered_bytes: files.iter().map(|f| f.size).sum(),
        config_found: ctx.config_path.as_ref().is_some_and(|p| p.exists()),
        config_path: ctx.config_path.clone(),
    })
}

pub fn format_status(status: &Status) -> String {
    let reachability = match &status.error {
        None => "reachable".to_string(),
        Some(e) => format!("unreachable: {}", e),
    };
    let config = match &status.config_path {
        Some(path) if status.config_found => path.display().to_string(),
        Some(path) => format!("{} (not found, using defaults)", path.display()),
        None => "defaults".to_string(),
    };
    format!(
        "endpoint:   {} ({})\nbuffer dir: {}\nbuffered:   {} files, {}\nconfig:     {}\n",
        status.endpoint,
        reachability,
        status.buffer_dir.display(),
        status.buffered_files,
        format_size(status.buffered_bytes),
        config
    )
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
