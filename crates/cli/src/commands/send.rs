// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Forward activity events from stdin.

use std::time::Duration;

use ew_core::{ActivityEvent, ForwardStats, Pipeline, ShaperStats, TrafficShaper, Transport};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{print_json, Context};
use crate::error::Result;

/// What a `send` run did.
#[derive(Debug, Default, Serialize)]
pub struct SendSummary {
    /// Lines that parsed as events.
    pub read: u64,
    /// Lines that did not.
    pub invalid: u64,
    pub shaper: ShaperStats,
    pub forwarded: ForwardStats,
}

pub async fn run(ctx: &Context, wait_ms: u64) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let summary = forward(ctx, stdin, Duration::from_millis(wait_ms)).await?;
    if ctx.is_json() {
        print_json(&summary)
    } else {
        println!("{}", format_summary(&summary));
        Ok(())
    }
}

/// Shape and forward every event in `input`, then flush and disconnect.
pub async fn forward<R>(ctx: &Context, input: R, wait: Duration) -> Result<SendSummary>
where
    R: AsyncBufRead + Unpin,
{
    let transport = Transport::new(ctx.transport.clone());
    if let Err(e) = transport.connect().await {
        warn!(
            endpoint = %ctx.transport.endpoint,
            error = %e,
            "service unreachable, buffering events"
        );
    }

    let (shaper, outputs) = TrafficShaper::new(ctx.settings.shaper.clone())?;
    let pipeline = Pipeline::spawn(outputs, transport.clone());

    let mut summary = SendSummary::default();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_event(&line) {
            Ok(event) => {
                summary.read += 1;
                shaper.submit(event);
            }
            Err(e) => {
                warn!(error = %e, "skipping invalid event");
                summary.invalid += 1;
            }
        }
    }

    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
    shaper.destroy();
    summary.shaper = shaper.stats();
    summary.forwarded = pipeline.join().await;
    transport.disconnect().await?;

    info!(
        read = summary.read,
        sent = summary.forwarded.sent,
        buffered = summary.forwarded.buffered,
        "send finished"
    );
    Ok(summary)
}

/// Parse one NDJSON input line.
pub fn parse_event(line: &str) -> serde_json::Result<ActivityEvent> {
    serde_json::from_str(line)
}

pub fn format_summary(summary: &SendSummary) -> String {
    let shaper = &summary.shaper;
    let forwarded = &summary.forwarded;
    let mut out = format!("read {} events", summary.read);
    if summary.invalid > 0 {
        out.push_str(&format!(" ({} invalid)", summary.invalid));
    }
    out.push_str(&format!(
        "\nshaped: {} filtered, {} rate limited, {} debounced, {} deduplicated",
        shaper.filtered, shaper.rate_limited, shaper.debounced, shaper.deduplicated
    ));
    out.push_str(&format!(
        "\nforwarded {} events in {} messages: {} sent, {} buffered, {} failed",
        forwarded.events,
        forwarded.sent + forwarded.buffered + forwarded.failed,
        forwarded.sent,
        forwarded.buffered,
        forwarded.failed
    ));
    out
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
