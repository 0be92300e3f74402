// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

fn populated_state() -> ProjectState {
    let mut state = ProjectState::empty(now());
    state.files.insert(
        "src/lib.rs".to_string(),
        FileState {
            size: 1_024,
            modified: now(),
            hash: Some("abc".to_string()),
            tracked: true,
            last_scan: now(),
        },
    );
    state.dependencies.insert(
        "serde".to_string(),
        DependencyState {
            version: "1.0.200".to_string(),
            kind: tether_core::DependencyKind::Runtime,
            installed: true,
            vulnerabilities: 0,
        },
    );
    state.version = 7;
    state.checksum = tether_core::checksum::compute(&state);
    state
}

#[test]
fn round_trips_state_and_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let state = populated_state();
    let snapshots = vec![
        StateSnapshot::capture(&state, "first", now()),
        StateSnapshot::capture(&state, "second", now()),
    ];

    save(&path, &state, &snapshots, now()).unwrap();
    let (restored, restored_snaps) = load(&path).unwrap().unwrap();

    assert_eq!(restored, state);
    assert_eq!(restored_snaps.len(), 2);
    assert_eq!(restored_snaps[0].reason, "first");
    assert_eq!(restored_snaps[1].state, state);
}

#[test]
fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load(&dir.path().join("absent.json")).unwrap().is_none());
}

#[test]
fn maps_are_flattened_to_pair_lists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    save(&path, &populated_state(), &[], now()).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    // Flattened: an array of [key, value] pairs, not an object.
    assert!(doc["state"]["files"].is_array());
    assert_eq!(doc["state"]["files"][0][0], "src/lib.rs");
    assert!(doc["state"]["dependencies"].is_array());
}

#[test]
fn corrupted_checksum_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut state = populated_state();
    state.checksum = "0000".to_string();

    save(&path, &state, &[], now()).unwrap();
    assert!(load(&path).is_err());
}

#[test]
fn save_replaces_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let state = populated_state();
    save(&path, &state, &[], now()).unwrap();

    let mut newer = state.clone();
    newer.version = 8;
    newer.checksum = tether_core::checksum::compute(&newer);
    save(&path, &newer, &[], now()).unwrap();

    let (restored, _) = load(&path).unwrap().unwrap();
    assert_eq!(restored.version, 8);
    // No temp file left behind.
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn save_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/deeper/state.json");
    save(&path, &populated_state(), &[], now()).unwrap();
    assert!(load(&path).unwrap().is_some());
}
