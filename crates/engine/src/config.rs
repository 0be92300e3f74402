// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Engine configuration.
//!
//! Configuration is loaded from a TOML file (or built in code) and split
//! along the two subsystems: `[state]` for the state manager and `[sync]`
//! for the sync client. Every field has a default so a minimal file only
//! names the endpoints it cares about.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// State manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Persist state to disk after each commit and on shutdown.
    #[serde(default)]
    pub persist: bool,
    /// Path of the persistence document. Required when `persist` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_path: Option<PathBuf>,
    /// Maximum retained snapshot versions (oldest evicted first).
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    /// Publish committed changes to sibling contexts.
    #[serde(default = "default_true")]
    pub broadcast: bool,
    /// Check structural invariants after each commit.
    #[serde(default = "default_true")]
    pub validate: bool,
    /// Periodic backup interval in milliseconds. 0 = disabled.
    #[serde(default = "default_backup_interval_ms")]
    pub backup_interval_ms: u64,
    /// Identifier of this context, used to tag and filter broadcasts.
    #[serde(default = "default_source_id")]
    pub source_id: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            persist: false,
            persist_path: None,
            max_snapshots: default_max_snapshots(),
            broadcast: true,
            validate: true,
            backup_interval_ms: default_backup_interval_ms(),
            source_id: default_source_id(),
        }
    }
}

fn default_max_snapshots() -> usize {
    10
}

fn default_backup_interval_ms() -> u64 {
    60_000
}

fn default_source_id() -> String {
    "local".to_string()
}

fn default_true() -> bool {
    true
}

/// Sync client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Bidirectional socket endpoint (`ws://` or `wss://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<String>,
    /// Push-only stream endpoint (`http://` or `https://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Fall back to the stream endpoint when the socket fails.
    #[serde(default = "default_true")]
    pub enable_fallback: bool,
    /// Base delay for exponential reconnect backoff (milliseconds).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Cap on the reconnect delay (milliseconds).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Consecutive failed attempts before giving up for good.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Heartbeat ping interval in milliseconds. 0 = disabled.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Outbound queue capacity.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Max time to wait for a transport connect (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Max time to wait for an acknowledgment (milliseconds).
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// Compress payloads above the threshold before sending.
    #[serde(default)]
    pub enable_compression: bool,
    /// Payload size (bytes, serialized) above which compression kicks in.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Protocol version advertised in the handshake and endpoint URLs.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Project identifier, parameterizing the endpoint URLs.
    #[serde(default = "default_project_id")]
    pub project_id: String,
    /// Client identity used as message source and in the handshake.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Interval between periodic stats events (milliseconds). 0 = disabled.
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            socket_url: None,
            stream_url: None,
            enable_fallback: true,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            queue_capacity: default_queue_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            enable_compression: false,
            compression_threshold: default_compression_threshold(),
            protocol_version: default_protocol_version(),
            project_id: default_project_id(),
            client_id: default_client_id(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

fn default_reconnect_interval_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_compression_threshold() -> usize {
    1_024
}

fn default_protocol_version() -> String {
    "1.0".to_string()
}

fn default_project_id() -> String {
    "default".to_string()
}

fn default_client_id() -> String {
    "client".to_string()
}

fn default_stats_interval_ms() -> u64 {
    10_000
}

impl SyncConfig {
    /// Parameterizes an endpoint URL with protocol version and project id.
    pub fn endpoint_url(&self, base: &str) -> String {
        let sep = if base.contains('?') { '&' } else { '?' };
        format!(
            "{base}{sep}version={}&project={}",
            self.protocol_version, self.project_id
        )
    }

    /// Checks that at least one usable endpoint is configured.
    pub fn validate(&self) -> Result<()> {
        if self.socket_url.is_none() && !(self.enable_fallback && self.stream_url.is_some()) {
            return Err(Error::MissingConfig(
                "sync requires socket_url or an enabled stream_url fallback".to_string(),
            ));
        }
        if let Some(url) = &self.socket_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(Error::Config(format!(
                    "socket_url must be ws:// or wss://, got '{url}'"
                )));
            }
        }
        if let Some(url) = &self.stream_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "stream_url must be http:// or https://, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}

/// Combined engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// State manager options.
    #[serde(default)]
    pub state: StateConfig,
    /// Sync client options.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        if config.state.persist && config.state.persist_path.is_none() {
            return Err(Error::MissingConfig(
                "state.persist_path is required when state.persist is set".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
