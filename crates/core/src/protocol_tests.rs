// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use crate::change::{ChangeKind, StateChange};
use chrono::TimeZone;
use yare::parameterized;

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

fn test_change() -> StateChange {
    StateChange::new(
        ChangeKind::File,
        "created",
        "a.ts",
        serde_json::json!({ "size": 10 }),
        now(),
        "watcher",
    )
}

#[parameterized(
    ping = { SyncMessage::ping(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(), "client-1") },
    pong = { SyncMessage::pong("ping-client-1-5", Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(), "client-1") },
    sync_request = { SyncMessage::sync_request(12, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(), "client-1") },
    error = { SyncMessage::error("bad payload", Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(), "server") },
)]
fn message_roundtrip(msg: SyncMessage) {
    let json = msg.to_json().unwrap();
    let parsed = SyncMessage::from_json(&json).unwrap();
    assert_eq!(msg, parsed);
}

#[test]
fn state_update_carries_change() {
    let change = test_change();
    let msg = SyncMessage::state_update(&change, now(), "client-1").unwrap();

    assert_eq!(msg.kind, MessageKind::StateUpdate);
    assert_eq!(msg.priority, Priority::High);
    let decoded = msg.change().unwrap();
    assert_eq!(decoded, change);
}

#[test]
fn message_json_format() {
    let msg = SyncMessage::ping(now(), "client-1");
    let json = msg.to_json().unwrap();
    assert!(json.contains("\"type\":\"ping\""));
    assert!(json.contains("\"priority\":\"critical\""));

    let msg = SyncMessage::sync_request(3, now(), "client-1");
    let json = msg.to_json().unwrap();
    assert!(json.contains("\"type\":\"sync-request\""));
    assert!(json.contains("\"since\":3"));
}

#[test]
fn flags_default_to_false_on_the_wire() {
    let msg = SyncMessage::ping(now(), "client-1");
    let json = msg.to_json().unwrap();
    assert!(!json.contains("requires_ack"));
    assert!(!json.contains("compressed"));

    let parsed = SyncMessage::from_json(&json).unwrap();
    assert!(!parsed.requires_ack);
    assert!(!parsed.compressed);
}

#[test]
fn with_ack_sets_flag() {
    let msg = SyncMessage::ping(now(), "client-1").with_ack();
    assert!(msg.requires_ack);
    let json = msg.to_json().unwrap();
    assert!(json.contains("\"requires_ack\":true"));
}

#[test]
fn pong_ref_resolves() {
    let pong = SyncMessage::pong("ping-abc", now(), "server");
    assert_eq!(pong.pong_ref(), Some("ping-abc"));

    let ping = SyncMessage::ping(now(), "client-1");
    assert_eq!(ping.pong_ref(), None);
}

#[test]
fn ack_ref_reads_payload_field() {
    let mut msg = SyncMessage::error("ok", now(), "server");
    assert_eq!(msg.ack_ref(), None);

    msg.payload = serde_json::json!({ "ack": "update-file-a.ts-5" });
    assert_eq!(msg.ack_ref(), Some("update-file-a.ts-5"));
}

#[parameterized(
    low_vs_medium = { Priority::Low, Priority::Medium },
    medium_vs_high = { Priority::Medium, Priority::High },
    high_vs_critical = { Priority::High, Priority::Critical },
)]
fn priority_total_order(lesser: Priority, greater: Priority) {
    assert!(lesser < greater);
}

#[test]
fn kind_strings_are_kebab_case() {
    assert_eq!(MessageKind::StateUpdate.as_str(), "state-update");
    assert_eq!(
        "sync-request".parse::<MessageKind>().unwrap(),
        MessageKind::SyncRequest
    );
    assert!("stateupdate".parse::<MessageKind>().is_err());
}

#[test]
fn handshake_roundtrip() {
    let hs = Handshake {
        version: "1.0".to_string(),
        client_id: "client-1".to_string(),
        capabilities: vec!["compression".to_string(), "ack".to_string()],
    };
    let msg = hs.clone().into_message(now()).unwrap();
    assert_eq!(msg.priority, Priority::Critical);
    assert_eq!(msg.id, "handshake-client-1");

    let decoded: Handshake = serde_json::from_value(msg.payload).unwrap();
    assert_eq!(decoded, hs);
}
