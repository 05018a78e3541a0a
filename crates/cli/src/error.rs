// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use ew_core::{BufferError, ConfigError, TransportError};

/// Errors reported by `ewire` commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Buffer(#[from] BufferError),

    #[error("service unreachable at {endpoint}: {source}\n  hint: is the activity service running?")]
    Unreachable {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
