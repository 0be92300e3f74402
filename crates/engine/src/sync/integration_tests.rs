// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use std::time::Duration;

use chrono::TimeZone;

use crate::config::SyncConfig;
use crate::events::SyncEvent;
use crate::sync::transport::transport_tests::{MockFactory, MockNet};

use tether_core::{ChangeKind, MessageKind, Priority, StateChange, SyncMessage};

fn ts() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

fn config() -> SyncConfig {
    SyncConfig {
        socket_url: Some("ws://mock/ws".to_string()),
        stream_url: Some("http://mock/events".to_string()),
        reconnect_interval_ms: 1,
        max_reconnect_attempts: 5,
        stats_interval_ms: 3_600_000,
        heartbeat_interval_ms: 3_600_000,
        queue_capacity: 8,
        client_id: "client".to_string(),
        ..SyncConfig::default()
    }
}

async fn wait_connected(handle: &SyncHandle) -> SyncStatus {
    for _ in 0..400 {
        let status = handle.status().await.unwrap();
        if status.status == ConnectionStatus::Connected {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("never connected");
}

#[tokio::test]
async fn degraded_mode_queues_outbound_and_still_receives() {
    let net = MockNet::default();
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let client = SyncClient::with_factory(
        config(),
        MockFactory::new(net.clone(), Some(true), Some(false)),
        tx,
    );
    let handle = spawn(client);

    let status = wait_connected(&handle).await;
    assert_eq!(status.transport, TransportKind::Stream);

    // Outbound messages queue while on the receive-only transport.
    let mut msg = SyncMessage::new(
        MessageKind::StateUpdate,
        serde_json::Value::Null,
        ts(),
        "client",
        Priority::Medium,
    );
    msg.id = "queued-1".to_string();
    handle.send(msg).await.unwrap();

    for _ in 0..400 {
        if handle.status().await.unwrap().stats.messages_queued == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(handle.status().await.unwrap().stats.messages_queued, 1);
    assert!(net.sent_ids().is_empty());

    // Inbound pushes still arrive.
    let change = StateChange::new(
        ChangeKind::Dependency,
        "added",
        "serde",
        serde_json::json!({ "version": "1.0.200", "installed": true }),
        ts(),
        "server",
    );
    net.push_inbound(SyncMessage::state_update(&change, ts(), "server").unwrap());

    let received = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let SyncEvent::RemoteChange(change) = rx.recv().await.unwrap() {
                return change;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(received.target, "serde");

    handle.shutdown().await;
}

#[tokio::test]
async fn force_reconnect_recovers_a_failed_client() {
    let net = MockNet::default();
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);
    let mut cfg = config();
    cfg.max_reconnect_attempts = 2;
    cfg.stream_url = None;
    let client = SyncClient::with_factory(
        cfg,
        MockFactory::new(net.clone(), Some(false), None),
        tx,
    );
    let handle = spawn(client);

    wait_connected(&handle).await;
    handle.disconnect().await.unwrap();
    handle.force_reconnect().await.unwrap();
    let status = wait_connected(&handle).await;
    assert_eq!(status.transport, TransportKind::Socket);

    // Connect events fired for both sessions.
    let mut connected = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, SyncEvent::Connected { .. }) {
            connected += 1;
        }
    }
    assert_eq!(connected, 2);

    handle.shutdown().await;
}
