// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The envelope wrapping every message on the wire.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Protocol version written into the `v` field.
pub const PROTOCOL_VERSION: u32 = 1;

/// One line of the NDJSON stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct Envelope {
    /// Protocol version of the sender.
    pub version: u32,
    /// Correlation ID. Present only on requests and their responses.
    pub id: Option<String>,
    /// Epoch milliseconds at which the envelope was created.
    pub timestamp: i64,
    pub message: Message,
    /// Success flag on service responses.
    pub ok: Option<bool>,
    /// Error description on failed service responses.
    pub error: Option<String>,
}

/// Flat serde shape of an envelope.
#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    #[serde(default = "default_version")]
    v: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    ts: i64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn default_version() -> u32 {
    PROTOCOL_VERSION
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        Ok(Envelope {
            version: raw.v,
            id: raw.id,
            timestamp: raw.ts,
            message: Message::from_parts(&raw.kind, raw.data)?,
            ok: raw.ok,
            error: raw.error,
        })
    }
}

impl From<Envelope> for RawEnvelope {
    fn from(envelope: Envelope) -> Self {
        RawEnvelope {
            v: envelope.version,
            id: envelope.id,
            kind: envelope.message.kind().to_string(),
            ts: envelope.timestamp,
            // Typed payloads are plain derived structs, which always serialize.
            data: envelope.message.to_data().unwrap_or_default(),
            ok: envelope.ok,
            error: envelope.error,
        }
    }
}

impl Envelope {
    /// Creates an uncorrelated envelope stamped with the current time.
    pub fn new(message: Message) -> Self {
        Envelope {
            version: PROTOCOL_VERSION,
            id: None,
            timestamp: Utc::now().timestamp_millis(),
            message,
            ok: None,
            error: None,
        }
    }

    /// Creates a correlated request envelope.
    pub fn request(id: impl Into<String>, message: Message) -> Self {
        Envelope {
            id: Some(id.into()),
            ..Envelope::new(message)
        }
    }

    /// Creates a successful response echoing this envelope's ID.
    pub fn reply(&self, message: Message) -> Self {
        Envelope {
            id: self.id.clone(),
            ok: Some(true),
            ..Envelope::new(message)
        }
    }

    /// Creates a failed response echoing this envelope's ID.
    pub fn reply_error(&self, message: Message, error: impl Into<String>) -> Self {
        Envelope {
            id: self.id.clone(),
            ok: Some(false),
            error: Some(error.into()),
            ..Envelope::new(message)
        }
    }

    /// Overrides the timestamp.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns false when the service flagged this response as failed.
    pub fn is_success(&self) -> bool {
        self.ok != Some(false) && self.error.is_none()
    }

    /// Encodes the envelope as one NDJSON line, including the trailing `\n`.
    ///
    /// JSON string escaping guarantees the body holds no raw line terminator.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one NDJSON line. A trailing `\n` or `\r\n` is ignored.
    pub fn from_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return Err(ProtocolError::EmptyLine);
        }
        if line.len() > crate::framing::MAX_LINE_BYTES {
            return Err(ProtocolError::LineTooLong {
                max: crate::framing::MAX_LINE_BYTES,
            });
        }
        Ok(serde_json::from_str(line)?)
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
