// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};

fn now() -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

#[test]
fn capture_copies_state_and_version() {
    let state = ProjectState::empty(now());
    let snap = StateSnapshot::capture(&state, "initial", now());

    assert_eq!(snap.version, state.version);
    assert_eq!(snap.checksum, state.checksum);
    assert_eq!(snap.state, state);
    assert_eq!(snap.reason, "initial");
}

#[test]
fn capture_is_independent_of_later_mutation() {
    let mut state = ProjectState::empty(now());
    let snap = StateSnapshot::capture(&state, "before edit", now());

    state.git.branch = "feature".to_string();
    state.version += 1;

    assert_eq!(snap.state.git.branch, "");
    assert_eq!(snap.version, 1);
}

#[test]
fn snapshot_roundtrips_through_json() {
    let state = ProjectState::empty(now());
    let snap = StateSnapshot::capture(&state, "persisted", now());
    let json = serde_json::to_string(&snap).unwrap();
    let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snap, parsed);
}
