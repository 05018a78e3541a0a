// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Resilient connection to the local service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  commands   ┌─────────────┐   NDJSON    ┌─────────────┐
//! │  Transport  │────────────►│   Worker    │────────────►│   Service   │
//! │  (handles)  │◄────────────│   (actor)   │◄────────────│  (socket)   │
//! └─────────────┘ state/events└─────────────┘   reader    └─────────────┘
//!                                    │
//!                                    ▼
//!                             ┌─────────────┐
//!                             │   Buffer    │  (offline envelopes)
//!                             │  (NDJSON)   │
//!                             └─────────────┘
//! ```
//!
//! # Features
//!
//! - Handshake on every connection
//! - Automatic reconnect with linear backoff, capped attempts
//! - Request/response correlation by envelope id
//! - Heartbeat tracking with staleness detection
//! - Durable offline buffer with rotation, drained on reconnect
//! - Injectable connector for testing

mod buffer;
mod connector;
mod state;
mod worker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ew_protocol::{Envelope, Message};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::identity::new_session_id;

pub use buffer::{list_files, sessions, BufferFile, DrainReport, DurableBuffer, SessionFiles};
pub use connector::{BoxedReader, BoxedWriter, Connector, Link, LocalSocketConnector};
pub use state::{ConnectionState, TransportEvent};

use worker::Command;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Outcome of [`Transport::send_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Written to the live socket.
    Sent,
    /// Appended to the offline buffer for a later drain.
    Buffered,
}

/// Handle to a transport worker.
///
/// Cloning yields another handle to the same connection. The worker shuts
/// down, closing the connection, once every handle is dropped.
#[derive(Clone)]
pub struct Transport {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    session_id: Arc<str>,
    request_timeout: Duration,
    next_request: Arc<AtomicU64>,
}

impl Transport {
    /// Create a transport for the configured local endpoint.
    pub fn new(config: TransportConfig) -> Self {
        let connector = LocalSocketConnector::new(config.endpoint.clone());
        Self::with_connector(config, connector)
    }

    /// Create a transport using a custom connector.
    pub fn with_connector<C: Connector>(config: TransportConfig, connector: C) -> Self {
        Self::with_session(config, connector, new_session_id())
    }

    /// Create a transport with an explicit session id.
    ///
    /// The session id names this transport's buffer files; two live
    /// transports must not share one.
    pub fn with_session<C: Connector>(
        config: TransportConfig,
        connector: C,
        session_id: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let request_timeout = config.request_timeout;

        worker::spawn(
            config,
            Arc::new(connector),
            session_id.clone(),
            state_tx,
            events.clone(),
            command_rx,
        );

        Transport {
            commands: command_tx,
            state: state_rx,
            events,
            session_id: session_id.into(),
            request_timeout,
            next_request: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Connect to the service.
    ///
    /// Resolves once the first attempt succeeds or fails. Does nothing when
    /// already connected; waits for the in-flight attempt when connecting.
    /// After a failure the transport keeps retrying in the background if
    /// auto-reconnect is enabled.
    pub async fn connect(&self) -> TransportResult<()> {
        self.call(|reply| Command::Connect { reply }).await?
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Outstanding requests fail with [`TransportError::Disconnected`].
    pub async fn disconnect(&self) -> TransportResult<()> {
        self.call(|reply| Command::Disconnect { reply }).await
    }

    /// Send an uncorrelated message, buffering it on disk while disconnected.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::BufferingDisabled`] when offline with
    /// buffering off, or [`TransportError::Buffer`] when the buffer write
    /// fails. Either way the message is dropped.
    pub async fn send_event(&self, message: Message) -> TransportResult<Delivery> {
        let envelope = Envelope::new(message);
        self.call(|reply| Command::Send { envelope, reply }).await?
    }

    /// Send a message and wait for the response carrying the same id.
    ///
    /// Returns the response even when the service flagged it as failed; see
    /// [`Envelope::is_success`].
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when offline,
    /// [`TransportError::RequestTimeout`] when no response arrives in time,
    /// and [`TransportError::Disconnected`] when the connection drops first.
    pub async fn request(&self, message: Message) -> TransportResult<Envelope> {
        let id = self.next_request_id();
        let envelope = Envelope::request(id.clone(), message);
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Request {
                id: id.clone(),
                envelope,
                reply,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        match tokio::time::timeout(self.request_timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                debug!(%id, "request timed out");
                let _ = self.commands.send(Command::CancelRequest { id: id.clone() }).await;
                Err(TransportError::RequestTimeout {
                    id,
                    after: self.request_timeout,
                })
            }
        }
    }

    /// Round-trip a `ping` and return the elapsed time.
    pub async fn ping(&self) -> TransportResult<Duration> {
        let start = Instant::now();
        self.request(Message::Ping).await?;
        Ok(start.elapsed())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the transport reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> TransportResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| TransportError::Closed)
    }

    /// Subscribe to transport notifications from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// True if any buffer file in the buffer directory holds data, whether
    /// from this session or an orphaned one.
    pub async fn has_buffered_events(&self) -> TransportResult<bool> {
        self.call(|reply| Command::HasBuffered { reply }).await?
    }

    /// Replay other sessions' leftover buffer files over the live connection.
    pub async fn drain_orphaned_buffers(&self) -> TransportResult<DrainReport> {
        self.call(|reply| Command::DrainOrphans { reply }).await?
    }

    fn next_request_id(&self) -> String {
        let n = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.session_id, n)
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> TransportResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| TransportError::Closed)?;
        response.await.map_err(|_| TransportError::Closed)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
