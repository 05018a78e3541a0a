// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory connector and service for transport tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ew_protocol::{Envelope, Handshake, Message};
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};

use super::{Connector, Link};
use crate::config::{TransportConfig, TransportSettings};
use crate::endpoint::Endpoint;

const WAIT: Duration = Duration::from_secs(5);

/// Fast-retrying transport config with buffering in `dir`.
pub fn test_config(dir: &Path) -> TransportConfig {
    let settings = TransportSettings {
        reconnect_delay_ms: 10,
        connect_timeout_ms: 200,
        request_timeout_ms: 500,
        heartbeat_timeout_ms: 0,
        ..TransportSettings::default()
    };
    TransportConfig::with_paths(&settings, Endpoint::parse("/unused.sock"), dir.to_path_buf())
}

struct MockState {
    up: bool,
    hang: bool,
    attempts: u32,
    accepted: mpsc::UnboundedSender<DuplexStream>,
}

/// Connector handing out in-memory pipes.
///
/// The service side of each successful connection is delivered to the
/// paired [`MockServices`].
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> (Self, MockServices) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = MockConnector {
            state: Arc::new(Mutex::new(MockState {
                up: true,
                hang: false,
                attempts: 0,
                accepted: tx,
            })),
        };
        (connector, MockServices { accepted: rx })
    }

    /// Refuse connections while down.
    pub fn set_up(&self, up: bool) {
        self.state.lock().unwrap().up = up;
    }

    /// Never complete connection attempts.
    pub fn set_hang(&self, hang: bool) {
        self.state.lock().unwrap().hang = hang;
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().unwrap().attempts
    }
}

impl Connector for MockConnector {
    fn connect(&self) -> Pin<Box<dyn Future<Output = io::Result<Link>> + Send + '_>> {
        Box::pin(async move {
            let (up, hang) = {
                let mut state = self.state.lock().unwrap();
                state.attempts += 1;
                (state.up, state.hang)
            };
            if hang {
                std::future::pending::<()>().await;
            }
            if !up {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "service down"));
            }
            let (client, server) = tokio::io::duplex(1 << 20);
            let _ = self.state.lock().unwrap().accepted.send(server);
            Ok(Link::new(client))
        })
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Receives the service side of mock connections.
pub struct MockServices {
    accepted: mpsc::UnboundedReceiver<DuplexStream>,
}

impl MockServices {
    pub async fn accept(&mut self) -> FakeService {
        let stream = tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped");
        FakeService::new(stream)
    }

    pub fn try_accept(&mut self) -> Option<FakeService> {
        self.accepted.try_recv().ok().map(FakeService::new)
    }
}

/// Service end of one mock connection.
pub struct FakeService {
    lines: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeService {
    fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        FakeService {
            lines: FramedRead::new(reader, LinesCodec::new()),
            writer,
        }
    }

    pub async fn recv(&mut self) -> Envelope {
        let line = tokio::time::timeout(WAIT, self.lines.next())
            .await
            .expect("timed out waiting for a line")
            .expect("connection closed")
            .expect("invalid line");
        Envelope::from_line(&line).unwrap()
    }

    pub async fn handshake(&mut self) -> Handshake {
        match self.recv().await.message {
            Message::Handshake(handshake) => handshake,
            other => panic!("expected handshake, got {:?}", other),
        }
    }

    /// Receive `n` envelopes and return their `data` fields.
    pub async fn recv_data(&mut self, n: usize) -> Vec<serde_json::Value> {
        let mut data = Vec::with_capacity(n);
        for _ in 0..n {
            data.push(self.recv().await.message.to_data().unwrap());
        }
        data
    }

    pub async fn send(&mut self, envelope: &Envelope) {
        self.send_raw(&envelope.to_line().unwrap()).await;
    }

    pub async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    /// True once the client has closed its end.
    pub async fn is_closed(&mut self) -> bool {
        matches!(
            tokio::time::timeout(WAIT, self.lines.next()).await,
            Ok(None) | Ok(Some(Err(_)))
        )
    }
}
