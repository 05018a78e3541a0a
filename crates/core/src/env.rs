// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.

use std::path::PathBuf;

/// Environment variable names.
pub mod vars {
    pub const EVENTWIRE_ENDPOINT: &str = "EVENTWIRE_ENDPOINT";
    pub const EVENTWIRE_BUFFER_DIR: &str = "EVENTWIRE_BUFFER_DIR";
    pub const EVENTWIRE_CONFIG: &str = "EVENTWIRE_CONFIG";
}

/// Returns the value of `EVENTWIRE_ENDPOINT` if set and non-empty.
pub fn endpoint() -> Option<String> {
    std::env::var(vars::EVENTWIRE_ENDPOINT)
        .ok()
        .filter(|v| !v.is_empty())
}

/// Returns the value of `EVENTWIRE_BUFFER_DIR` if set and non-empty.
pub fn buffer_dir() -> Option<PathBuf> {
    std::env::var(vars::EVENTWIRE_BUFFER_DIR)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the value of `EVENTWIRE_CONFIG` if set and non-empty.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(vars::EVENTWIRE_CONFIG)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
