// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol shared by the eventwire client and the local activity service.
//!
//! Every message is a single JSON object on its own line (NDJSON):
//!
//! ```text
//! {"v":1,"id":"a1b2-7","type":"ping","ts":1718000000000,"data":{}}
//! {"v":1,"id":"a1b2-7","type":"pong","ts":1718000000004,"ok":true}
//! {"v":1,"type":"heartbeat","ts":1718000005000,"data":{"uptime":12}}
//! ```
//!
//! The `type` field selects a [`Message`] variant. Unrecognized types decode
//! to [`Message::Unknown`] so newer services can talk to older clients.

mod error;

pub mod envelope;
pub mod framing;
pub mod message;

pub use envelope::{Envelope, PROTOCOL_VERSION};
pub use error::{ProtocolError, Result};
pub use message::{Batch, BatchItem, EventKind, Handshake, Message, ParseKindError};
