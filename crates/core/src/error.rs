// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ew-core operations.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the transport.
///
/// Connection failures drive state transitions and are reported through
/// [`TransportEvent`](crate::transport::TransportEvent)s; they only appear as
/// return values of `connect` and `request`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("not connected to the service")]
    NotConnected,

    #[error("disconnected while waiting for a response")]
    Disconnected,

    #[error("request {id} timed out after {after:?}")]
    RequestTimeout { id: String, after: Duration },

    #[error("not connected and offline buffering is disabled")]
    BufferingDisabled,

    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ew_protocol::ProtocolError),

    #[error("transport worker has stopped")]
    Closed,
}

/// Errors from the on-disk offline buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] ew_protocol::ProtocolError),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid ignore pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
