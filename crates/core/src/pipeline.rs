// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Glue between the traffic shaper and the transport.
//!
//! A forwarding task drains the shaper's output channel and hands each flush
//! to [`Transport::send_event`] in order. It ends when the shaper is
//! destroyed or dropped, which closes the channel.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::ShapedOutput;
use crate::transport::{Delivery, Transport};

/// Counts of forwarded flushes by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForwardStats {
    /// Written to the live connection.
    pub sent: u64,
    /// Appended to the offline buffer.
    pub buffered: u64,
    /// Dropped because neither was possible.
    pub failed: u64,
    /// Activity events carried by all forwarded flushes, batches expanded.
    pub events: u64,
}

pub struct Pipeline;

impl Pipeline {
    /// Forward every shaped output to `transport` until the channel closes.
    pub fn spawn(
        mut outputs: mpsc::UnboundedReceiver<ShapedOutput>,
        transport: Transport,
    ) -> PipelineHandle {
        let task = tokio::spawn(async move {
            let mut stats = ForwardStats::default();
            while let Some(output) = outputs.recv().await {
                let count = output.len() as u64;
                match transport.send_event(output.to_message()).await {
                    Ok(Delivery::Sent) => stats.sent += 1,
                    Ok(Delivery::Buffered) => stats.buffered += 1,
                    Err(e) => {
                        warn!(error = %e, events = count, "dropping shaped output");
                        stats.failed += 1;
                        continue;
                    }
                }
                stats.events += count;
            }
            debug!(
                sent = stats.sent,
                buffered = stats.buffered,
                failed = stats.failed,
                "shaper output closed"
            );
            stats
        });
        PipelineHandle { task }
    }
}

/// Handle to a running forwarding task.
pub struct PipelineHandle {
    task: JoinHandle<ForwardStats>,
}

impl PipelineHandle {
    /// Wait for the shaper's output to close and return the final counts.
    pub async fn join(self) -> ForwardStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "forwarding task failed");
                ForwardStats::default()
            }
        }
    }

    /// Stop forwarding without waiting for the channel to close.
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
