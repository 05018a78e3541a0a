// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection states and the notifications published by the transport.

use std::fmt;
use std::time::Duration;

use ew_protocol::Envelope;
use serde::Serialize;
use serde_json::Value;

use super::buffer::DrainReport;

/// Lifecycle of the connection to the local service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for the next reconnect attempt.
    Reconnecting,
    /// Connected and replaying buffered events.
    Draining,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Draining => "draining",
        }
    }

    /// True while a live socket exists.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Draining)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notifications delivered through [`Transport::subscribe`](super::Transport::subscribe).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The service's periodic liveness signal.
    Heartbeat(Value),
    /// An inbound envelope that answered no outstanding request.
    Message(Envelope),
    /// An inbound line that could not be decoded. The connection continues.
    ProtocolError(String),
    /// An event could not be written to the offline buffer and was dropped.
    BufferFailed(String),
    /// Buffered events were replayed to the service.
    Drained(DrainReport),
    /// A reconnect attempt is scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect attempts ran out; the transport stays disconnected until
    /// `connect` is called again.
    ReconnectExhausted { attempts: u32 },
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
