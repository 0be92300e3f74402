// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tether.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn empty_file_yields_defaults() {
    let (_dir, path) = write_config("");
    let config = Config::load(&path).unwrap();

    assert!(!config.state.persist);
    assert_eq!(config.state.max_snapshots, 10);
    assert!(config.state.validate);
    assert_eq!(config.sync.reconnect_max_delay_ms, 30_000);
    assert_eq!(config.sync.queue_capacity, 100);
    assert_eq!(config.sync.protocol_version, "1.0");
}

#[test]
fn endpoints_and_overrides_parse() {
    let (_dir, path) = write_config(
        r#"
[state]
max_snapshots = 3
source_id = "tab-1"

[sync]
socket_url = "wss://sync.example.com/ws"
stream_url = "https://sync.example.com/events"
max_reconnect_attempts = 4
heartbeat_interval_ms = 500
"#,
    );
    let config = Config::load(&path).unwrap();

    assert_eq!(config.state.max_snapshots, 3);
    assert_eq!(config.state.source_id, "tab-1");
    assert_eq!(config.sync.socket_url.as_deref(), Some("wss://sync.example.com/ws"));
    assert_eq!(config.sync.max_reconnect_attempts, 4);
    assert_eq!(config.sync.heartbeat_interval_ms, 500);
}

#[test]
fn persist_without_path_is_rejected() {
    let (_dir, path) = write_config("[state]\npersist = true\n");
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("persist_path"));
}

#[test]
fn endpoint_url_appends_version_and_project() {
    let config = SyncConfig {
        protocol_version: "2.1".to_string(),
        project_id: "demo".to_string(),
        ..SyncConfig::default()
    };
    assert_eq!(
        config.endpoint_url("wss://host/ws"),
        "wss://host/ws?version=2.1&project=demo"
    );
    assert_eq!(
        config.endpoint_url("wss://host/ws?token=x"),
        "wss://host/ws?token=x&version=2.1&project=demo"
    );
}

#[parameterized(
    no_endpoints = { None, None, true },
    stream_with_fallback_disabled = { None, Some("https://host/events"), false },
)]
fn validate_rejects_unusable_endpoint_sets(
    socket: Option<&str>,
    stream: Option<&str>,
    enable_fallback: bool,
) {
    let config = SyncConfig {
        socket_url: socket.map(str::to_string),
        stream_url: stream.map(str::to_string),
        enable_fallback,
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn stream_only_config_is_valid() {
    let config = SyncConfig {
        stream_url: Some("https://host/events".to_string()),
        ..SyncConfig::default()
    };
    config.validate().unwrap();
}

#[parameterized(
    socket_http = { Some("http://host/ws"), None },
    stream_ws = { Some("wss://host/ws"), Some("wss://host/events") },
)]
fn validate_rejects_bad_schemes(socket: Option<&str>, stream: Option<&str>) {
    let config = SyncConfig {
        socket_url: socket.map(str::to_string),
        stream_url: stream.map(str::to_string),
        ..SyncConfig::default()
    };
    assert!(config.validate().is_err());
}
