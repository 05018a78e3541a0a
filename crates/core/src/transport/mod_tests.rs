// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the transport actor against an in-memory service.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::test_helpers::{test_config, MockConnector};
use super::*;
use ew_protocol::{EventKind, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::tempdir;

fn edit(n: u32) -> Message {
    Message::activity(
        EventKind::FileEdit,
        json!({ "resource_id": format!("f{}.rs", n), "n": n }),
    )
}

fn numbers(data: &[Value]) -> Vec<u64> {
    data.iter().map(|d| d["n"].as_u64().unwrap()).collect()
}

async fn next_event<F>(events: &mut broadcast::Receiver<TransportEvent>, mut matches: F) -> TransportEvent
where
    F: FnMut(&TransportEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .unwrap();
        if matches(&event) {
            return event;
        }
    }
}

async fn wait_state(transport: &Transport, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), transport.wait_for_state(state))
        .await
        .expect("timed out waiting for state")
        .unwrap();
}

#[tokio::test]
async fn connect_sends_handshake() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    transport.connect().await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Connected);

    let mut service = services.accept().await;
    let handshake = service.handshake().await;
    assert_eq!(handshake.session_id, transport.session_id());
    assert_eq!(handshake.protocol_version, PROTOCOL_VERSION);
    assert_eq!(handshake.client, "eventwire");
    assert_eq!(handshake.pid, std::process::id());
}

#[tokio::test]
async fn connect_when_connected_is_noop() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector.clone());

    transport.connect().await.unwrap();
    let _service = services.accept().await;
    transport.connect().await.unwrap();

    assert_eq!(connector.attempts(), 1);
    assert!(services.try_accept().is_none());
}

#[tokio::test]
async fn transports_get_distinct_sessions() {
    let dir = tempdir().unwrap();
    let (a, _sa) = MockConnector::new();
    let (b, _sb) = MockConnector::new();
    let first = Transport::with_connector(test_config(dir.path()), a);
    let second = Transport::with_connector(test_config(dir.path()), b);
    assert_ne!(first.session_id(), second.session_id());
}

#[tokio::test]
async fn send_event_when_connected_writes_to_socket() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    let delivery = transport.send_event(edit(7)).await.unwrap();
    assert_eq!(delivery, Delivery::Sent);

    let envelope = service.recv().await;
    assert_eq!(envelope.message, edit(7));
    assert_eq!(envelope.id, None);
    assert!(list_files(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn send_event_offline_buffers_to_disk() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);

    assert!(!transport.has_buffered_events().await.unwrap());
    let delivery = transport.send_event(edit(1)).await.unwrap();

    assert_eq!(delivery, Delivery::Buffered);
    assert!(transport.has_buffered_events().await.unwrap());
    let expected = dir
        .path()
        .join(format!("buffer-{}.jsonl", transport.session_id()));
    assert!(expected.exists());
}

#[tokio::test]
async fn offline_events_fail_when_buffering_disabled() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    let config = TransportConfig {
        buffering_enabled: false,
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector);

    let err = transport.send_event(edit(1)).await.unwrap_err();
    assert!(matches!(err, TransportError::BufferingDisabled));
    assert!(list_files(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn buffered_events_drain_in_order_before_new_sends() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    let mut events = transport.subscribe();

    for n in 0..3 {
        transport.send_event(edit(n)).await.unwrap();
    }
    transport.connect().await.unwrap();
    transport.send_event(edit(3)).await.unwrap();

    let mut service = services.accept().await;
    service.handshake().await;
    assert_eq!(numbers(&service.recv_data(4).await), vec![0, 1, 2, 3]);

    next_event(&mut events, |e| {
        matches!(e, TransportEvent::StateChanged { to: ConnectionState::Draining, .. })
    })
    .await;
    let drained = next_event(&mut events, |e| matches!(e, TransportEvent::Drained(_))).await;
    let TransportEvent::Drained(report) = drained else {
        unreachable!()
    };
    assert_eq!(report.sent, 3);
    assert_eq!(report.files, 1);
    assert_eq!(report.sessions, 1);

    assert!(list_files(dir.path()).unwrap().is_empty());
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn orphaned_sessions_drain_before_current_session() {
    let dir = tempdir().unwrap();
    DurableBuffer::new(dir.path(), "orphan", 1 << 20)
        .append(&Envelope::new(edit(100)))
        .unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);

    transport.send_event(edit(1)).await.unwrap();
    transport.connect().await.unwrap();

    let mut service = services.accept().await;
    service.handshake().await;
    assert_eq!(numbers(&service.recv_data(2).await), vec![100, 1]);
}

#[tokio::test]
async fn rotated_backup_drains_before_active_file() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let config = TransportConfig {
        max_buffer_size: 1,
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector);

    for n in 0..3 {
        transport.send_event(edit(n)).await.unwrap();
    }
    // Rotation discarded the oldest event; two files remain.
    assert_eq!(list_files(dir.path()).unwrap().len(), 2);

    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;
    assert_eq!(numbers(&service.recv_data(2).await), vec![1, 2]);
}

#[tokio::test]
async fn malformed_buffer_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let valid = |n| Envelope::new(edit(n)).to_line().unwrap();
    let content = format!("{}not json\n{}", valid(1), valid(2));
    std::fs::write(dir.path().join("buffer-crashed.jsonl"), content).unwrap();

    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    let mut events = transport.subscribe();
    transport.connect().await.unwrap();

    let mut service = services.accept().await;
    service.handshake().await;
    assert_eq!(numbers(&service.recv_data(2).await), vec![1, 2]);

    let drained = next_event(&mut events, |e| matches!(e, TransportEvent::Drained(_))).await;
    let TransportEvent::Drained(report) = drained else {
        unreachable!()
    };
    assert_eq!(report.skipped, 1);
    assert_eq!(report.sent, 2);
    assert!(list_files(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn torn_orphan_does_not_block_drain() {
    let dir = tempdir().unwrap();
    let mut content = Envelope::new(edit(1)).to_line().unwrap().into_bytes();
    let torn = Envelope::new(Message::activity(
        EventKind::FileEdit,
        json!({ "resource_id": "caf\u{e9}.rs" }),
    ))
    .to_line()
    .unwrap()
    .into_bytes();
    let cut = torn.iter().position(|&b| b == 0xC3).unwrap() + 1;
    content.extend_from_slice(&torn[..cut]);
    std::fs::write(dir.path().join("buffer-crashed.jsonl"), content).unwrap();

    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    let mut events = transport.subscribe();
    assert_eq!(
        transport.send_event(edit(2)).await.unwrap(),
        Delivery::Buffered
    );
    transport.connect().await.unwrap();

    let mut service = services.accept().await;
    service.handshake().await;
    assert_eq!(numbers(&service.recv_data(2).await), vec![1, 2]);

    let drained = next_event(&mut events, |e| matches!(e, TransportEvent::Drained(_))).await;
    let TransportEvent::Drained(report) = drained else {
        unreachable!()
    };
    assert_eq!(report.skipped, 1);
    assert_eq!(report.sent, 2);
    assert_eq!(report.sessions, 2);
    assert!(list_files(dir.path()).unwrap().is_empty());
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn drain_orphaned_buffers_on_demand() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    DurableBuffer::new(dir.path(), "late-orphan", 1 << 20)
        .append(&Envelope::new(edit(5)))
        .unwrap();
    let report = transport.drain_orphaned_buffers().await.unwrap();

    assert_eq!(report.sessions, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(numbers(&service.recv_data(1).await), vec![5]);
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn drain_orphaned_buffers_requires_connection() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);

    let err = transport.drain_orphaned_buffers().await.unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
}

#[tokio::test]
async fn request_resolves_matching_response() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    let requester = transport.clone();
    let pending = tokio::spawn(async move {
        requester
            .request(Message::Unknown {
                kind: "query".to_string(),
                data: json!({ "q": 1 }),
            })
            .await
    });

    let request = service.recv().await;
    let id = request.id.clone().unwrap();
    assert_eq!(id, format!("{}-1", transport.session_id()));

    // A heartbeat never resolves a waiter, even with a matching id.
    service
        .send(&Envelope::request(id.clone(), Message::Heartbeat(json!({}))))
        .await;
    service
        .send(&request.reply(Message::Response(json!({ "answer": 42 }))))
        .await;

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.id, Some(id));
    assert_eq!(response.message, Message::Response(json!({ "answer": 42 })));
    assert!(response.is_success());
}

#[tokio::test]
async fn request_ids_are_sequential() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    for expected in 1..=2 {
        let requester = transport.clone();
        let pending = tokio::spawn(async move { requester.request(Message::Ping).await });
        let request = service.recv().await;
        assert_eq!(
            request.id.as_deref(),
            Some(format!("{}-{}", transport.session_id(), expected).as_str())
        );
        service.send(&request.reply(Message::Pong(json!({})))).await;
        pending.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn request_times_out_without_response() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    let err = transport.request(Message::Ping).await.unwrap_err();
    match err {
        TransportError::RequestTimeout { id, after } => {
            assert_eq!(id, format!("{}-1", transport.session_id()));
            assert_eq!(after, Duration::from_millis(500));
        }
        other => panic!("expected timeout, got {:?}", other),
    }

    // Commands are handled in order, so the cancellation has landed once
    // this round trip completes.
    transport.has_buffered_events().await.unwrap();

    // A late response is published as an uncorrelated message.
    let mut events = transport.subscribe();
    let request = service.recv().await;
    service.send(&request.reply(Message::Pong(json!({})))).await;
    next_event(&mut events, |e| matches!(e, TransportEvent::Message(_))).await;
}

#[tokio::test]
async fn request_offline_fails_fast() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);

    let err = transport.request(Message::Ping).await.unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
}

#[tokio::test]
async fn disconnect_rejects_outstanding_requests() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    let requester = transport.clone();
    let pending = tokio::spawn(async move { requester.request(Message::Ping).await });
    service.recv().await;

    transport.disconnect().await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Disconnected));
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(service.is_closed().await);
}

#[tokio::test]
async fn ping_measures_round_trip() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    let pinger = transport.clone();
    let pending = tokio::spawn(async move { pinger.ping().await });
    let ping = service.recv().await;
    assert_eq!(ping.message, Message::Ping);
    service.send(&ping.reply(Message::Pong(json!({})))).await;

    let rtt = pending.await.unwrap().unwrap();
    assert!(rtt < Duration::from_secs(5));
}

#[tokio::test]
async fn inbound_messages_are_published() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    let mut events = transport.subscribe();
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    service
        .send(&Envelope::new(Message::Heartbeat(json!({ "uptime": 3 }))))
        .await;
    let heartbeat = next_event(&mut events, |e| matches!(e, TransportEvent::Heartbeat(_))).await;
    let TransportEvent::Heartbeat(data) = heartbeat else {
        unreachable!()
    };
    assert_eq!(data["uptime"], 3);

    service.send_raw("not json\n").await;
    next_event(&mut events, |e| matches!(e, TransportEvent::ProtocolError(_))).await;

    service.send(&Envelope::new(Message::Ack(json!({})))).await;
    next_event(&mut events, |e| matches!(e, TransportEvent::Message(_))).await;
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn service_close_triggers_reconnect() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector.clone());
    transport.connect().await.unwrap();
    let mut first = services.accept().await;
    first.handshake().await;

    drop(first);

    let mut second = services.accept().await;
    let handshake = second.handshake().await;
    assert_eq!(handshake.session_id, transport.session_id());
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_events_lost_across_outage() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector.clone());
    transport.connect().await.unwrap();
    let mut first = services.accept().await;
    first.handshake().await;

    for n in 0..2 {
        assert_eq!(transport.send_event(edit(n)).await.unwrap(), Delivery::Sent);
    }
    assert_eq!(numbers(&first.recv_data(2).await), vec![0, 1]);

    connector.set_up(false);
    drop(first);
    wait_state(&transport, ConnectionState::Reconnecting).await;

    for n in 2..5 {
        assert_eq!(
            transport.send_event(edit(n)).await.unwrap(),
            Delivery::Buffered
        );
    }

    connector.set_up(true);
    let mut second = services.accept().await;
    second.handshake().await;
    assert_eq!(numbers(&second.recv_data(3).await), vec![2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn reconnect_gives_up_after_max_attempts() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    connector.set_up(false);
    let config = TransportConfig {
        max_reconnect_attempts: 2,
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector.clone());
    let mut events = transport.subscribe();

    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed(_)));

    let reconnecting = next_event(&mut events, |e| matches!(e, TransportEvent::Reconnecting { .. })).await;
    let TransportEvent::Reconnecting { attempt, delay } = reconnecting else {
        unreachable!()
    };
    assert_eq!(attempt, 1);
    assert_eq!(delay, Duration::from_millis(10));

    let exhausted = next_event(&mut events, |e| {
        matches!(e, TransportEvent::ReconnectExhausted { .. })
    })
    .await;
    assert!(matches!(
        exhausted,
        TransportEvent::ReconnectExhausted { attempts: 2 }
    ));
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn connect_attempt_times_out() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    connector.set_hang(true);
    let config = TransportConfig {
        auto_reconnect: false,
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector);

    let err = transport.connect().await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectTimeout(d) if d == Duration::from_millis(200)));
    assert_eq!(transport.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn failed_connect_without_auto_reconnect_stays_disconnected() {
    let dir = tempdir().unwrap();
    let (connector, _services) = MockConnector::new();
    connector.set_up(false);
    let config = TransportConfig {
        auto_reconnect: false,
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector.clone());

    assert!(transport.connect().await.is_err());
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_service_triggers_reconnect() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let config = TransportConfig {
        heartbeat_timeout: Some(Duration::from_millis(100)),
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector.clone());
    transport.connect().await.unwrap();
    let mut first = services.accept().await;
    first.handshake().await;

    // The first service stays open but says nothing.
    let mut second = services.accept().await;
    second.handshake().await;
    assert_eq!(connector.attempts(), 2);
    assert!(first.is_closed().await);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_keep_connection_alive() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let config = TransportConfig {
        heartbeat_timeout: Some(Duration::from_millis(100)),
        ..test_config(dir.path())
    };
    let transport = Transport::with_connector(config, connector.clone());
    let mut events = transport.subscribe();
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        service
            .send(&Envelope::new(Message::Heartbeat(json!({}))))
            .await;
        next_event(&mut events, |e| matches!(e, TransportEvent::Heartbeat(_))).await;
    }

    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn dropping_last_handle_closes_connection() {
    let dir = tempdir().unwrap();
    let (connector, mut services) = MockConnector::new();
    let transport = Transport::with_connector(test_config(dir.path()), connector);
    transport.connect().await.unwrap();
    let mut service = services.accept().await;
    service.handshake().await;

    drop(transport);
    assert!(service.is_closed().await);
}
