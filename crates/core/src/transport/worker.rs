// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The transport actor.
//!
//! One task owns the connection, the pending request map and the offline
//! buffer. It serializes every state change by handling commands from
//! [`Transport`](super::Transport) handles, reports from connect and reader
//! tasks, and its reconnect and heartbeat timers in a single `select!` loop.

use std::collections::HashMap;
use std::sync::Arc;

use ew_protocol::framing::MAX_LINE_BYTES;
use ew_protocol::{Envelope, Handshake, Message, PROTOCOL_VERSION};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::buffer::{self, DrainReport, DurableBuffer, SessionFiles};
use super::connector::{BoxedReader, BoxedWriter, Connector, Link};
use super::state::{ConnectionState, TransportEvent};
use super::Delivery;
use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};

/// Requests from transport handles.
pub(super) enum Command {
    Connect {
        reply: oneshot::Sender<TransportResult<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        envelope: Envelope,
        reply: oneshot::Sender<TransportResult<Delivery>>,
    },
    Request {
        id: String,
        envelope: Envelope,
        reply: oneshot::Sender<TransportResult<Envelope>>,
    },
    /// The caller stopped waiting for a response.
    CancelRequest { id: String },
    DrainOrphans {
        reply: oneshot::Sender<TransportResult<DrainReport>>,
    },
    HasBuffered {
        reply: oneshot::Sender<TransportResult<bool>>,
    },
}

/// Reports from tasks spawned by the worker, tagged with the connection
/// generation they belong to.
enum Internal {
    Connected { generation: u64, link: Link },
    ConnectFailed { generation: u64, error: TransportError },
    Line { generation: u64, line: String },
    Oversized { generation: u64 },
    Closed { generation: u64, reason: String },
}

pub(super) struct Worker {
    config: TransportConfig,
    session_id: String,
    connector: Arc<dyn Connector>,
    buffer: DurableBuffer,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    internal: mpsc::UnboundedSender<Internal>,
    shutdown: CancellationToken,
    /// Bumped on every connect attempt and teardown; reports from older
    /// generations are ignored.
    generation: u64,
    connecting: Option<CancellationToken>,
    writer: Option<BoxedWriter>,
    reader: Option<JoinHandle<()>>,
    /// Reconnect attempts since the last successful connection.
    attempt: u32,
    reconnect_at: Option<Instant>,
    /// Last inbound line of any kind.
    last_seen: Instant,
    pending: HashMap<String, oneshot::Sender<TransportResult<Envelope>>>,
    connect_waiters: Vec<oneshot::Sender<TransportResult<()>>>,
}

/// Start the worker task.
pub(super) fn spawn(
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    session_id: String,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    commands: mpsc::Receiver<Command>,
) {
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let buffer = DurableBuffer::new(
        config.buffer_dir.clone(),
        session_id.clone(),
        config.max_buffer_size,
    );
    let worker = Worker {
        config,
        session_id,
        connector,
        buffer,
        state,
        events,
        internal: internal_tx,
        shutdown: CancellationToken::new(),
        generation: 0,
        connecting: None,
        writer: None,
        reader: None,
        attempt: 0,
        reconnect_at: None,
        last_seen: Instant::now(),
        pending: HashMap::new(),
        connect_waiters: Vec::new(),
    };
    tokio::spawn(worker.run(commands, internal_rx));
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        debug!(session = %self.session_id, "transport worker started");
        loop {
            let stale_at = self.stale_deadline();
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // Every handle is gone.
                    None => break,
                },

                Some(report) = internal.recv() => self.handle_internal(report).await,

                _ = sleep_until(reconnect_at) => {
                    self.reconnect_at = None;
                    self.start_connect();
                }

                _ = sleep_until(stale_at) => {
                    warn!(
                        timeout_ms = self.config.heartbeat_timeout.map(|t| t.as_millis() as u64),
                        "no traffic from service"
                    );
                    self.connection_lost("heartbeat timeout");
                }
            }
        }

        self.close().await;
        self.shutdown.cancel();
        debug!(session = %self.session_id, "transport worker stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => self.connect(reply),
            Command::Disconnect { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            Command::Send { envelope, reply } => {
                let result = self.send(&envelope).await;
                let _ = reply.send(result);
            }
            Command::Request {
                id,
                envelope,
                reply,
            } => self.request(id, &envelope, reply).await,
            Command::CancelRequest { id } => {
                if self.pending.remove(&id).is_some() {
                    debug!(%id, "request abandoned");
                }
            }
            Command::DrainOrphans { reply } => {
                let result = self.drain(false).await;
                let _ = reply.send(result);
            }
            Command::HasBuffered { reply } => {
                let _ = reply.send(self.buffer.has_pending().map_err(Into::into));
            }
        }
    }

    async fn handle_internal(&mut self, report: Internal) {
        match report {
            Internal::Connected { generation, link } if generation == self.generation => {
                self.on_connected(link).await;
            }
            Internal::ConnectFailed { generation, error } if generation == self.generation => {
                self.on_connect_failed(error);
            }
            Internal::Line { generation, line } if generation == self.generation => {
                self.on_line(&line);
            }
            Internal::Oversized { generation } if generation == self.generation => {
                self.last_seen = Instant::now();
                warn!(max = MAX_LINE_BYTES, "discarding oversized line from service");
                self.publish(TransportEvent::ProtocolError(format!(
                    "line exceeds {} bytes",
                    MAX_LINE_BYTES
                )));
            }
            Internal::Closed { generation, reason } if generation == self.generation => {
                self.connection_lost(&reason);
            }
            _ => trace!("ignoring report from a stale connection"),
        }
    }

    fn connect(&mut self, reply: oneshot::Sender<TransportResult<()>>) {
        match self.current_state() {
            ConnectionState::Connected | ConnectionState::Draining => {
                let _ = reply.send(Ok(()));
            }
            ConnectionState::Connecting => self.connect_waiters.push(reply),
            ConnectionState::Disconnected | ConnectionState::Reconnecting => {
                self.connect_waiters.push(reply);
                self.attempt = 0;
                self.reconnect_at = None;
                self.start_connect();
            }
        }
    }

    fn start_connect(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        self.set_state(ConnectionState::Connecting);
        debug!(endpoint = %self.connector.describe(), generation, "connecting");

        let token = self.shutdown.child_token();
        self.connecting = Some(token.clone());
        let connector = Arc::clone(&self.connector);
        let internal = self.internal.clone();
        let limit = self.config.connect_timeout;

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = tokio::time::timeout(limit, connector.connect()) => result,
            };
            let report = match result {
                Ok(Ok(link)) => Internal::Connected { generation, link },
                Ok(Err(e)) => Internal::ConnectFailed {
                    generation,
                    error: TransportError::ConnectFailed(e.to_string()),
                },
                Err(_) => Internal::ConnectFailed {
                    generation,
                    error: TransportError::ConnectTimeout(limit),
                },
            };
            let _ = internal.send(report);
        });
    }

    async fn on_connected(&mut self, link: Link) {
        self.connecting = None;
        let Link { reader, writer } = link;
        self.writer = Some(writer);
        self.reader = Some(spawn_reader(reader, self.generation, self.internal.clone()));
        self.attempt = 0;
        self.last_seen = Instant::now();
        self.set_state(ConnectionState::Connected);
        info!(
            endpoint = %self.connector.describe(),
            session = %self.session_id,
            "connected to service"
        );

        let handshake = Envelope::new(Message::Handshake(self.handshake()));
        if let Err(e) = self.write_envelope(&handshake).await {
            warn!(error = %e, "failed to send handshake");
            self.fail_connect_waiters(&e);
            self.connection_lost("handshake failed");
            return;
        }
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }

        match self.buffer.has_pending() {
            Ok(true) => {
                // Failures are logged and published by drain.
                let _ = self.drain(true).await;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "cannot inspect offline buffer"),
        }
    }

    fn on_connect_failed(&mut self, error: TransportError) {
        self.connecting = None;
        warn!(
            endpoint = %self.connector.describe(),
            attempt = self.attempt,
            error = %error,
            "connection attempt failed"
        );
        self.fail_connect_waiters(&error);
        self.schedule_reconnect();
    }

    fn on_line(&mut self, line: &str) {
        self.last_seen = Instant::now();
        if line.trim().is_empty() {
            return;
        }
        let envelope = match Envelope::from_line(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "discarding malformed line from service");
                self.publish(TransportEvent::ProtocolError(e.to_string()));
                return;
            }
        };

        if let Message::Heartbeat(data) = &envelope.message {
            trace!("heartbeat");
            self.publish(TransportEvent::Heartbeat(data.clone()));
            return;
        }
        if let Some(id) = envelope.id.as_deref() {
            if let Some(waiter) = self.pending.remove(id) {
                let _ = waiter.send(Ok(envelope));
                return;
            }
        }
        self.publish(TransportEvent::Message(envelope));
    }

    /// Write to the socket when connected, otherwise append to the buffer.
    async fn send(&mut self, envelope: &Envelope) -> TransportResult<Delivery> {
        if self.writer.is_some() {
            match self.write_envelope(envelope).await {
                Ok(()) => return Ok(Delivery::Sent),
                Err(TransportError::Io(e)) => {
                    warn!(error = %e, "write failed, buffering event");
                    self.connection_lost("write failed");
                }
                Err(e) => return Err(e),
            }
        }

        if !self.config.buffering_enabled {
            return Err(TransportError::BufferingDisabled);
        }
        match self.buffer.append(envelope) {
            Ok(()) => {
                debug!(kind = envelope.message.kind(), "buffered event");
                Ok(Delivery::Buffered)
            }
            Err(e) => {
                warn!(error = %e, "failed to buffer event, dropping it");
                self.publish(TransportEvent::BufferFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn request(
        &mut self,
        id: String,
        envelope: &Envelope,
        reply: oneshot::Sender<TransportResult<Envelope>>,
    ) {
        if self.writer.is_none() {
            let _ = reply.send(Err(TransportError::NotConnected));
            return;
        }
        match self.write_envelope(envelope).await {
            Ok(()) => {
                self.pending.insert(id, reply);
            }
            Err(e) => {
                if matches!(e, TransportError::Io(_)) {
                    self.connection_lost("write failed");
                }
                let _ = reply.send(Err(e));
            }
        }
    }

    /// Replay buffered files to the service.
    ///
    /// Orphaned sessions go first, oldest first; `include_current` adds this
    /// session's own files after them.
    async fn drain(&mut self, include_current: bool) -> TransportResult<DrainReport> {
        if self.writer.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.set_state(ConnectionState::Draining);

        let mut report = DrainReport::default();
        match self.replay(include_current, &mut report).await {
            Ok(()) => {
                info!(
                    sessions = report.sessions,
                    files = report.files,
                    sent = report.sent,
                    skipped = report.skipped,
                    "drained offline buffer"
                );
                self.set_state(ConnectionState::Connected);
                self.publish(TransportEvent::Drained(report));
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, sent = report.sent, "drain interrupted");
                if matches!(e, TransportError::Io(_)) {
                    self.connection_lost("write failed during drain");
                } else {
                    self.set_state(ConnectionState::Connected);
                }
                Err(e)
            }
        }
    }

    async fn replay(
        &mut self,
        include_current: bool,
        report: &mut DrainReport,
    ) -> TransportResult<()> {
        let mut sessions = self.buffer.orphans()?;
        if include_current {
            sessions.extend(self.buffer.current()?);
        }
        for session in &sessions {
            self.replay_session(session, report).await?;
        }
        Ok(())
    }

    async fn replay_session(
        &mut self,
        session: &SessionFiles,
        report: &mut DrainReport,
    ) -> TransportResult<()> {
        debug!(session = %session.session_id, files = session.files.len(), "draining session");
        report.sessions += 1;
        for file in &session.files {
            let contents = buffer::read_lines(&file.path)?;
            report.skipped += contents.invalid;
            let lines = contents.lines;
            for (index, line) in lines.iter().enumerate() {
                if let Err(e) = Envelope::from_line(line) {
                    warn!(file = %file.path.display(), error = %e, "skipping malformed buffered line");
                    report.skipped += 1;
                    continue;
                }
                if let Err(e) = self.write_line(line).await {
                    // Keep the unsent tail, including the line that failed.
                    buffer::rewrite_lines(&file.path, &lines[index..])?;
                    return Err(e);
                }
                report.sent += 1;
            }
            buffer::remove_file(&file.path)?;
            report.files += 1;
        }
        Ok(())
    }

    fn schedule_reconnect(&mut self) {
        if !self.config.auto_reconnect {
            self.set_state(ConnectionState::Disconnected);
            return;
        }
        if self.attempt >= self.config.max_reconnect_attempts {
            let attempts = self.attempt;
            warn!(attempts, "giving up on reconnecting");
            self.attempt = 0;
            self.set_state(ConnectionState::Disconnected);
            self.publish(TransportEvent::ReconnectExhausted { attempts });
            return;
        }
        self.attempt += 1;
        let delay = self.config.backoff(self.attempt);
        self.reconnect_at = Some(Instant::now() + delay);
        self.set_state(ConnectionState::Reconnecting);
        info!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.publish(TransportEvent::Reconnecting {
            attempt: self.attempt,
            delay,
        });
    }

    fn connection_lost(&mut self, reason: &str) {
        info!(%reason, "connection lost");
        self.teardown();
        self.schedule_reconnect();
    }

    /// Drop the live connection and reject everything waiting on it.
    fn teardown(&mut self) {
        self.generation += 1;
        self.writer = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(token) = self.connecting.take() {
            token.cancel();
        }
        for (_, waiter) in self.pending.drain() {
            let _ = waiter.send(Err(TransportError::Disconnected));
        }
    }

    /// Disconnect on request: no reconnect follows.
    async fn close(&mut self) {
        self.reconnect_at = None;
        self.attempt = 0;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.teardown();
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(TransportError::Disconnected));
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn fail_connect_waiters(&mut self, error: &TransportError) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(duplicate(error)));
        }
    }

    async fn write_envelope(&mut self, envelope: &Envelope) -> TransportResult<()> {
        let line = envelope.to_line()?;
        self.write_bytes(line.as_bytes(), None).await
    }

    async fn write_line(&mut self, line: &str) -> TransportResult<()> {
        self.write_bytes(line.as_bytes(), Some(b"\n".as_slice())).await
    }

    async fn write_bytes(&mut self, bytes: &[u8], terminator: Option<&[u8]>) -> TransportResult<()> {
        let limit = self.config.request_timeout;
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        let write = async {
            writer.write_all(bytes).await?;
            if let Some(terminator) = terminator {
                writer.write_all(terminator).await?;
            }
            writer.flush().await
        };
        match tokio::time::timeout(limit, write).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "service stopped reading",
            ))),
        }
    }

    fn handshake(&self) -> Handshake {
        Handshake {
            client: self.config.client_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            session_id: self.session_id.clone(),
            pid: std::process::id(),
        }
    }

    fn stale_deadline(&self) -> Option<Instant> {
        let timeout = self.config.heartbeat_timeout?;
        (self.current_state() == ConnectionState::Connected).then(|| self.last_seen + timeout)
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.current_state();
        if from == to {
            return;
        }
        self.state.send_replace(to);
        info!(%from, %to, "transport state changed");
        self.publish(TransportEvent::StateChanged { from, to });
    }

    fn publish(&self, event: TransportEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Read lines from the service until the stream ends.
fn spawn_reader(
    reader: BoxedReader,
    generation: u64,
    internal: mpsc::UnboundedSender<Internal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        // After a decode error the stream yields one `None` before resuming.
        let mut recovering = false;
        let reason = loop {
            let report = match lines.next().await {
                Some(Ok(line)) => Internal::Line { generation, line },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    recovering = true;
                    Internal::Oversized { generation }
                }
                Some(Err(LinesCodecError::Io(e))) => break e.to_string(),
                None if recovering => {
                    recovering = false;
                    continue;
                }
                None => break "closed by service".to_string(),
            };
            if internal.send(report).is_err() {
                return;
            }
        };
        let _ = internal.send(Internal::Closed { generation, reason });
    })
}

/// Reproduce a connect error for each waiter.
fn duplicate(error: &TransportError) -> TransportError {
    match error {
        TransportError::ConnectTimeout(after) => TransportError::ConnectTimeout(*after),
        TransportError::ConnectFailed(reason) => TransportError::ConnectFailed(reason.clone()),
        other => TransportError::ConnectFailed(other.to_string()),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
