// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use ew_protocol::EventKind;
use tokio::time::Instant;

use crate::event::ActivityEvent;

/// Cache size past which expired keys are swept.
pub const PRUNE_THRESHOLD: usize = 1000;

/// Remembers recently seen events by key and rejects repeats within a window.
#[derive(Debug, Clone)]
pub struct DedupeCache {
    window: Duration,
    seen: HashMap<String, Instant>,
}

impl DedupeCache {
    pub fn new(window: Duration) -> Self {
        DedupeCache {
            window,
            seen: HashMap::new(),
        }
    }

    /// Returns true if `key` was marked within the window. Otherwise marks it
    /// at `now` and returns false.
    pub fn check_and_mark(&mut self, key: String, now: Instant) -> bool {
        if let Some(&marked) = self.seen.get(&key) {
            if now.duration_since(marked) < self.window {
                return true;
            }
        }
        self.seen.insert(key, now);
        if self.seen.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }
        false
    }

    /// Drops every key older than the window.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, marked| now.duration_since(*marked) < window);
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Payload fields that distinguish one event of a kind from another.
pub fn identity_fields(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Terminal => &["cmd", "code"],
        EventKind::Focus => &["line", "column"],
        EventKind::FileEdit => &["content"],
        _ => &[],
    }
}

/// Whether events of `kind` go through deduplication.
///
/// Edits released by the debouncer are already coalesced and skip it.
pub fn applies_to(kind: EventKind, debounced: bool) -> bool {
    match kind {
        EventKind::FileCreate | EventKind::FileDelete | EventKind::Terminal | EventKind::Focus => {
            true
        }
        EventKind::FileEdit => !debounced,
        EventKind::Selection | EventKind::Diagnostic => false,
    }
}

/// Builds the dedupe key from kind, resource and identity fields.
pub fn dedupe_key(event: &ActivityEvent) -> String {
    let mut key = format!(
        "{}|{}",
        event.kind,
        event.resource_id.as_deref().unwrap_or_default()
    );
    for field in identity_fields(event.kind) {
        key.push('|');
        if let Some(value) = event.payload.get(field) {
            key.push_str(&value.to_string());
        }
    }
    key
}

#[cfg(test)]
#[path = "dedupe_tests.rs"]
mod tests;
