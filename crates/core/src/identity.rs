// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user and per-session identifiers.
//!
//! The user identifier scopes the service endpoint; the session identifier
//! scopes the offline buffer files of one client process.

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns the current user's login name, reduced to characters safe in
/// socket and pipe names.
///
/// Resolution order: `USER`, `LOGNAME`, `USERNAME`, then "default".
pub fn user_id() -> String {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|name| sanitize(&name))
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Generates a session ID: 16 hex chars of SHA256(pid, wall clock, counter).
///
/// Distinct calls within one process always differ, so several transports
/// in the same process never share buffer files.
pub fn new_session_id() -> String {
    let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let input = format!("{}:{}:{}", std::process::id(), nanos, seq);
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}
