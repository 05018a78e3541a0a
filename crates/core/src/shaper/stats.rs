// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

/// Shaper counters since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShaperStats {
    /// Every call to `submit`.
    pub received: u64,
    /// Dropped by an ignore pattern.
    pub filtered: u64,
    /// Dropped by the rate limiter.
    pub rate_limited: u64,
    /// Folded into a pending debounced event.
    pub debounced: u64,
    /// Dropped as a duplicate.
    pub deduplicated: u64,
    /// Admitted to the batch stage or emitted directly.
    pub passed: u64,
    pub emitted_events: u64,
    pub emitted_batches: u64,
    /// Debounced events waiting for their timer.
    pub pending_debounce: usize,
    /// Events waiting in the batch queue.
    pub queued: usize,
}
