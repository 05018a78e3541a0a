// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay buffers left behind by other sessions.
//!
//! Connecting already drains whatever is on disk; the explicit drain that
//! follows picks up files written in the meantime. Both show up as
//! `Drained` events, which are summed for the report.

use ew_core::{DrainReport, TransportEvent};

use super::{print_json, Context};
use crate::error::Result;

pub async fn run(ctx: &Context) -> Result<()> {
    let transport = ctx.one_shot_transport();
    let mut events = transport.subscribe();
    ctx.connect(&transport).await?;
    let drained = transport.drain_orphaned_buffers().await;
    transport.disconnect().await?;
    drained?;

    let mut report = DrainReport::default();
    while let Ok(event) = events.try_recv() {
        if let TransportEvent::Drained(drained) = event {
            report.merge(drained);
        }
    }

    if ctx.is_json() {
        print_json(&report)
    } else {
        println!("{}", format_report(&report));
        Ok(())
    }
}

pub fn format_report(report: &DrainReport) -> String {
    if report.files == 0 && report.skipped == 0 {
        return "nothing to drain".to_string();
    }
    let mut out = format!(
        "drained {} events from {} files ({} sessions)",
        report.sent, report.files, report.sessions
    );
    if report.skipped > 0 {
        out.push_str(&format!(", skipped {} malformed lines", report.skipped));
    }
    out
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
