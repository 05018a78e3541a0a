// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Raw activity events as produced by editor hooks, file watchers and
//! terminal integrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ew_protocol::{BatchItem, EventKind, Message};

/// One unit of editor or terminal activity.
///
/// The payload is opaque to the pipeline: shaping only looks at the kind,
/// the resource and a few dedupe fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: EventKind,
    /// File path or other resource the event refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    /// Creates an event stamped with the current time.
    pub fn new(kind: EventKind, resource_id: Option<String>, payload: Value) -> Self {
        ActivityEvent {
            kind,
            resource_id,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Creates an event for a resource.
    pub fn for_resource(kind: EventKind, resource_id: impl Into<String>, payload: Value) -> Self {
        Self::new(kind, Some(resource_id.into()), payload)
    }
}

/// An event that made it through shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedEvent {
    pub event: ActivityEvent,
    /// How many submissions debouncing folded into this one (1 if none).
    pub coalesced: u32,
}

impl ShapedEvent {
    pub fn single(event: ActivityEvent) -> Self {
        ShapedEvent {
            event,
            coalesced: 1,
        }
    }

    /// Converts to a batch entry.
    pub fn to_batch_item(&self) -> BatchItem {
        BatchItem {
            kind: self.event.kind,
            resource_id: self.event.resource_id.clone(),
            data: self.event.payload.clone(),
            ts: self.event.timestamp.timestamp_millis(),
            coalesced: self.coalesced,
        }
    }

    /// Converts to a standalone activity message.
    ///
    /// The resource and coalesced count are folded into the payload object
    /// under `resource_id` and `coalesced` so the service sees them without
    /// a wrapper. Non-object payloads are wrapped as `{"value": ...}`.
    pub fn to_message(&self) -> Message {
        let mut data = match &self.event.payload {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        if let Some(resource) = &self.event.resource_id {
            data.entry("resource_id")
                .or_insert_with(|| Value::String(resource.clone()));
        }
        if self.coalesced > 1 {
            data.insert("coalesced".to_string(), Value::from(self.coalesced));
        }
        Message::activity(self.event.kind, Value::Object(data))
    }
}

/// What the shaper hands downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapedOutput {
    /// A flush that held exactly one event.
    Event(ShapedEvent),
    /// A flush that held several events, in queue order.
    Batch(Vec<ShapedEvent>),
}

impl ShapedOutput {
    /// Number of events carried.
    pub fn len(&self) -> usize {
        match self {
            ShapedOutput::Event(_) => 1,
            ShapedOutput::Batch(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts to the wire message sent to the service.
    pub fn to_message(&self) -> Message {
        match self {
            ShapedOutput::Event(event) => event.to_message(),
            ShapedOutput::Batch(events) => Message::Batch(ew_protocol::Batch {
                events: events.iter().map(ShapedEvent::to_batch_item).collect(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
