// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);

/// Fixed-window token bucket.
///
/// The window opens at the first acquisition and refills to capacity once a
/// full second has elapsed since it opened.
#[derive(Debug, Clone)]
pub struct RateBucket {
    capacity: u32,
    tokens: u32,
    window_start: Option<Instant>,
}

impl RateBucket {
    pub fn new(capacity: u32) -> Self {
        RateBucket {
            capacity,
            tokens: capacity,
            window_start: None,
        }
    }

    /// Takes one token, returning false when the current window is spent.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let expired = match self.window_start {
            Some(start) => now.duration_since(start) >= WINDOW,
            None => true,
        };
        if expired {
            self.window_start = Some(now);
            self.tokens = self.capacity;
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    pub fn reset(&mut self) {
        self.tokens = self.capacity;
        self.window_start = None;
    }
}

#[cfg(test)]
#[path = "rate_tests.rs"]
mod tests;
