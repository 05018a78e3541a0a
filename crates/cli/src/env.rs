// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variables read by the CLI itself.
//!
//! Client settings overrides (`EVENTWIRE_ENDPOINT` and friends) live in
//! `ew_core::env`. The name constants here are generated by `build.rs`.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `EVENTWIRE_LOG_FILE` if set and non-empty.
pub fn log_file() -> Option<PathBuf> {
    std::env::var(vars::EVENTWIRE_LOG_FILE)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns true if `RUST_LOG` is set.
pub fn rust_log_set() -> bool {
    std::env::var(vars::RUST_LOG).is_ok()
}
