// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed view of an envelope's `type` and `data` fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProtocolError, Result};

/// Kind of editor or terminal activity reported to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Buffer contents changed.
    FileEdit,
    /// File created on disk.
    FileCreate,
    /// File removed from disk.
    FileDelete,
    /// Cursor selection moved.
    Selection,
    /// Compiler or linter diagnostics changed.
    Diagnostic,
    /// A terminal command finished.
    Terminal,
    /// Editor focus moved to another file or location.
    Focus,
}

impl EventKind {
    /// All kinds, in wire-name order.
    pub const ALL: [EventKind; 7] = [
        EventKind::FileEdit,
        EventKind::FileCreate,
        EventKind::FileDelete,
        EventKind::Selection,
        EventKind::Diagnostic,
        EventKind::Terminal,
        EventKind::Focus,
    ];

    /// Returns the wire name used as the envelope `type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FileEdit => "file_edit",
            EventKind::FileCreate => "file_create",
            EventKind::FileDelete => "file_delete",
            EventKind::Selection => "selection",
            EventKind::Diagnostic => "diagnostic",
            EventKind::Terminal => "terminal",
            EventKind::Focus => "focus",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string is not a known [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid event kind: '{}'", self.0)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for EventKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> std::result::Result<Self, ParseKindError> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// Identifies the client when a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Client name, e.g. the editor integration.
    pub client: String,
    /// Client version string.
    pub version: String,
    /// Protocol version the client speaks.
    pub protocol_version: u32,
    /// Session identifier, stable for the lifetime of the client process.
    pub session_id: String,
    /// Client process ID.
    pub pid: u32,
}

/// One shaped activity event inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Epoch milliseconds at which the event was produced.
    pub ts: i64,
    /// Number of submissions folded into this event by debouncing.
    #[serde(default = "default_coalesced", skip_serializing_if = "is_single")]
    pub coalesced: u32,
}

fn default_coalesced() -> u32 {
    1
}

fn is_single(n: &u32) -> bool {
    *n <= 1
}

/// Several activity events delivered as one envelope, in submission order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Batch {
    pub events: Vec<BatchItem>,
}

/// Closed set of envelope types.
///
/// Control messages carry typed payloads where the client depends on their
/// shape; service-defined payloads stay as JSON values.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Sent by the client immediately after connecting.
    Handshake(Handshake),
    /// Liveness probe; the service answers with [`Message::Pong`].
    Ping,
    Pong(Value),
    /// Periodic liveness signal emitted by the service. Never correlated.
    Heartbeat(Value),
    Ack(Value),
    Response(Value),
    /// A single activity event.
    Activity { kind: EventKind, data: Value },
    Batch(Batch),
    /// A type this client does not know. Round-trips unchanged.
    Unknown { kind: String, data: Value },
}

impl Message {
    /// Creates an activity message.
    pub fn activity(kind: EventKind, data: Value) -> Self {
        Message::Activity { kind, data }
    }

    /// Returns the wire `type` string.
    pub fn kind(&self) -> &str {
        match self {
            Message::Handshake(_) => "handshake",
            Message::Ping => "ping",
            Message::Pong(_) => "pong",
            Message::Heartbeat(_) => "heartbeat",
            Message::Ack(_) => "ack",
            Message::Response(_) => "response",
            Message::Activity { kind, .. } => kind.as_str(),
            Message::Batch(_) => "batch",
            Message::Unknown { kind, .. } => kind,
        }
    }

    /// Returns true for protocol-level messages that are not activity.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Message::Handshake(_)
                | Message::Ping
                | Message::Pong(_)
                | Message::Heartbeat(_)
                | Message::Ack(_)
                | Message::Response(_)
        )
    }

    /// Converts the payload into the JSON value stored in the `data` field.
    pub fn to_data(&self) -> Result<Value> {
        let data = match self {
            Message::Handshake(handshake) => serde_json::to_value(handshake)?,
            Message::Ping => json!({}),
            Message::Pong(data)
            | Message::Heartbeat(data)
            | Message::Ack(data)
            | Message::Response(data)
            | Message::Activity { data, .. }
            | Message::Unknown { data, .. } => data.clone(),
            Message::Batch(batch) => serde_json::to_value(batch)?,
        };
        Ok(data)
    }

    /// Builds a message from a wire `type` and its `data`.
    ///
    /// Unknown types are preserved as [`Message::Unknown`]; only a malformed
    /// payload for a type with a typed shape is an error.
    pub fn from_parts(kind: &str, data: Value) -> Result<Self> {
        let message = match kind {
            "handshake" => Message::Handshake(typed(kind, data)?),
            "ping" => Message::Ping,
            "pong" => Message::Pong(data),
            "heartbeat" => Message::Heartbeat(data),
            "ack" => Message::Ack(data),
            "response" => Message::Response(data),
            "batch" => Message::Batch(typed(kind, data)?),
            other => match other.parse::<EventKind>() {
                Ok(kind) => Message::Activity { kind, data },
                Err(_) => Message::Unknown {
                    kind: other.to_string(),
                    data,
                },
            },
        };
        Ok(message)
    }
}

fn typed<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
