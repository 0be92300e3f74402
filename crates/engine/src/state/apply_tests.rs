// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use tether_core::{BuildState, GitState};
use yare::parameterized;

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

fn change(kind: ChangeKind, op: &str, target: &str, metadata: Value) -> StateChange {
    StateChange::new(kind, op, target, metadata, now(), "test")
}

fn state() -> ProjectState {
    ProjectState::empty(now())
}

#[test]
fn file_created_inserts_entry() {
    let mut s = state();
    apply(
        &mut s,
        &change(
            ChangeKind::File,
            "created",
            "a.ts",
            serde_json::json!({ "size": 10, "hash": "abc", "tracked": true }),
        ),
    )
    .unwrap();

    let file = &s.files["a.ts"];
    assert_eq!(file.size, 10);
    assert_eq!(file.hash.as_deref(), Some("abc"));
    assert!(file.tracked);
    assert_eq!(file.modified, now());
}

#[test]
fn file_modified_preserves_unmentioned_fields() {
    let mut s = state();
    apply(
        &mut s,
        &change(
            ChangeKind::File,
            "created",
            "a.ts",
            serde_json::json!({ "size": 10, "hash": "abc" }),
        ),
    )
    .unwrap();
    apply(
        &mut s,
        &change(ChangeKind::File, "modified", "a.ts", serde_json::json!({ "size": 20 })),
    )
    .unwrap();

    let file = &s.files["a.ts"];
    assert_eq!(file.size, 20);
    assert_eq!(file.hash.as_deref(), Some("abc"));
}

#[test]
fn file_deleted_removes_entry() {
    let mut s = state();
    apply(
        &mut s,
        &change(ChangeKind::File, "created", "a.ts", serde_json::json!({ "size": 10 })),
    )
    .unwrap();
    apply(
        &mut s,
        &change(ChangeKind::File, "deleted", "a.ts", Value::Null),
    )
    .unwrap();
    assert!(!s.files.contains_key("a.ts"));
}

#[test]
fn deleting_unknown_file_is_a_noop() {
    let mut s = state();
    apply(
        &mut s,
        &change(ChangeKind::File, "deleted", "ghost.ts", Value::Null),
    )
    .unwrap();
    assert!(s.files.is_empty());
}

#[test]
fn dependency_added_then_removed() {
    let mut s = state();
    apply(
        &mut s,
        &change(
            ChangeKind::Dependency,
            "added",
            "serde",
            serde_json::json!({ "version": "1.0.200", "kind": "runtime", "installed": true }),
        ),
    )
    .unwrap();

    let dep = &s.dependencies["serde"];
    assert_eq!(dep.version, "1.0.200");
    assert_eq!(dep.kind, DependencyKind::Runtime);
    assert!(dep.installed);

    apply(
        &mut s,
        &change(ChangeKind::Dependency, "removed", "serde", Value::Null),
    )
    .unwrap();
    assert!(s.dependencies.is_empty());
}

#[test]
fn dependency_update_merges_vulnerabilities() {
    let mut s = state();
    apply(
        &mut s,
        &change(
            ChangeKind::Dependency,
            "added",
            "leftpad",
            serde_json::json!({ "version": "0.1.0", "kind": "dev" }),
        ),
    )
    .unwrap();
    apply(
        &mut s,
        &change(
            ChangeKind::Dependency,
            "updated",
            "leftpad",
            serde_json::json!({ "vulnerabilities": 3 }),
        ),
    )
    .unwrap();

    let dep = &s.dependencies["leftpad"];
    assert_eq!(dep.version, "0.1.0");
    assert_eq!(dep.kind, DependencyKind::Dev);
    assert_eq!(dep.vulnerabilities, 3);
}

#[test]
fn git_updated_applies_present_fields_only() {
    let mut s = state();
    s.git = GitState {
        branch: "main".to_string(),
        commit: "aaa".to_string(),
        ..GitState::default()
    };

    apply(
        &mut s,
        &change(
            ChangeKind::Git,
            "updated",
            "git",
            serde_json::json!({
                "commit": "bbb",
                "status": "dirty",
                "unstaged": ["src/lib.rs"],
                "ahead": 2
            }),
        ),
    )
    .unwrap();

    assert_eq!(s.git.branch, "main");
    assert_eq!(s.git.commit, "bbb");
    assert_eq!(s.git.status, GitStatus::Dirty);
    assert_eq!(s.git.unstaged, ["src/lib.rs"]);
    assert_eq!(s.git.ahead, 2);
}

#[test]
fn git_conflict_flags_status() {
    let mut s = state();
    apply(&mut s, &change(ChangeKind::Git, "conflict", "git", Value::Null)).unwrap();
    assert_eq!(s.git.status, GitStatus::Conflict);
}

#[test]
fn build_lifecycle() {
    let mut s = state();
    s.build = BuildState {
        errors: vec!["stale".to_string()],
        ..BuildState::default()
    };

    apply(&mut s, &change(ChangeKind::Build, "started", "build", Value::Null)).unwrap();
    assert_eq!(s.build.status, BuildStatus::Building);
    assert_eq!(s.build.started, Some(now()));
    assert!(s.build.errors.is_empty());

    apply(
        &mut s,
        &change(
            ChangeKind::Build,
            "completed",
            "build",
            serde_json::json!({ "artifacts": ["dist/app.js"], "warnings": ["unused import"] }),
        ),
    )
    .unwrap();
    assert_eq!(s.build.status, BuildStatus::Success);
    assert_eq!(s.build.artifacts, ["dist/app.js"]);
    assert_eq!(s.build.warnings, ["unused import"]);
}

#[test]
fn build_failure_records_errors() {
    let mut s = state();
    apply(
        &mut s,
        &change(
            ChangeKind::Build,
            "failed",
            "build",
            serde_json::json!({ "errors": ["type mismatch"] }),
        ),
    )
    .unwrap();
    assert_eq!(s.build.status, BuildStatus::Failed);
    assert_eq!(s.build.errors, ["type mismatch"]);
}

#[test]
fn server_lifecycle_and_stats() {
    let mut s = state();
    apply(
        &mut s,
        &change(ChangeKind::Server, "started", "server", serde_json::json!({ "pid": 4242 })),
    )
    .unwrap();
    assert_eq!(s.server.status, ServerStatus::Running);
    assert_eq!(s.server.pid, Some(4242));

    apply(
        &mut s,
        &change(
            ChangeKind::Server,
            "stats",
            "server",
            serde_json::json!({ "uptime_secs": 120, "requests": 50, "errors": 1 }),
        ),
    )
    .unwrap();
    assert_eq!(s.server.uptime_secs, 120);
    assert_eq!(s.server.requests, 50);

    apply(&mut s, &change(ChangeKind::Server, "stopped", "server", Value::Null)).unwrap();
    assert_eq!(s.server.status, ServerStatus::Stopped);
    assert_eq!(s.server.pid, None);
    assert_eq!(s.server.uptime_secs, 0);
    // Cumulative counters survive a stop.
    assert_eq!(s.server.requests, 50);
}

#[parameterized(
    file = { ChangeKind::File },
    git = { ChangeKind::Git },
    dependency = { ChangeKind::Dependency },
    build = { ChangeKind::Build },
    server = { ChangeKind::Server },
)]
fn unknown_op_is_rejected(kind: ChangeKind) {
    let mut s = state();
    let err = apply(&mut s, &change(kind, "frobnicate", "x", Value::Null)).unwrap_err();
    assert!(matches!(err, Error::UnknownOperation { .. }));
}

#[test]
fn invalid_dependency_kind_is_rejected() {
    let mut s = state();
    let err = apply(
        &mut s,
        &change(
            ChangeKind::Dependency,
            "added",
            "serde",
            serde_json::json!({ "kind": "optional" }),
        ),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
