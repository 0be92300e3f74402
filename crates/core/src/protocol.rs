// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Wire protocol envelopes for client-server communication.
//!
//! Every exchange with the remote authority is a JSON-encoded
//! `SyncMessage`. The protocol is symmetric and simple:
//! - the client pushes `state-update` and `sync-request` messages
//! - the server pushes `state-update`, `heartbeat` and `error` messages
//! - `ping`/`pong` measure liveness and round-trip latency

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::change::StateChange;
use crate::error::{Error, Result};

/// Kind of a sync message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// A state change travelling in either direction.
    StateUpdate,
    /// Liveness probe.
    Ping,
    /// Reply to a ping; echoes the ping id in the payload.
    Pong,
    /// Application-level error from the peer.
    Error,
    /// Request for missed changes since a version.
    SyncRequest,
    /// Server-side liveness beacon (push-only transports).
    Heartbeat,
}

impl MessageKind {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::StateUpdate => "state-update",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Error => "error",
            MessageKind::SyncRequest => "sync-request",
            MessageKind::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "state-update" => Ok(MessageKind::StateUpdate),
            "ping" => Ok(MessageKind::Ping),
            "pong" => Ok(MessageKind::Pong),
            "error" => Ok(MessageKind::Error),
            "sync-request" => Ok(MessageKind::SyncRequest),
            "heartbeat" => Ok(MessageKind::Heartbeat),
            _ => Err(Error::InvalidMessageKind(s.to_string())),
        }
    }
}

/// Delivery priority of an outbound message.
///
/// The ordering is total and used directly by the outbound queue:
/// critical > high > medium > low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Best-effort; first evicted under pressure.
    Low,
    /// Default priority.
    Medium,
    /// Sent before medium/low traffic.
    High,
    /// Never evicted while lower-priority messages remain.
    Critical,
}

impl Priority {
    /// Returns the string representation used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(Error::InvalidPriority(s.to_string())),
        }
    }
}

/// The wire-level envelope exchanged with the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Unique message id.
    pub id: String,
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the producing context.
    pub source: String,
    /// Delivery priority.
    #[serde(default = "default_priority")]
    pub priority: Priority,
    /// Whether the receiver must acknowledge this message.
    #[serde(default, skip_serializing_if = "is_false")]
    pub requires_ack: bool,
    /// Whether the payload is a compressed blob.
    #[serde(default, skip_serializing_if = "is_false")]
    pub compressed: bool,
}

fn default_priority() -> Priority {
    Priority::Medium
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(v: &bool) -> bool {
    !v
}

impl SyncMessage {
    /// Creates a message with the given kind and payload.
    pub fn new(
        kind: MessageKind,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let source = source.into();
        SyncMessage {
            id: format!("{}-{}-{}", kind.as_str(), source, timestamp.timestamp_millis()),
            kind,
            payload,
            timestamp,
            source,
            priority,
            requires_ack: false,
            compressed: false,
        }
    }

    /// Creates a `state-update` carrying a change.
    pub fn state_update(
        change: &StateChange,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let payload = serde_json::to_value(change)?;
        let mut msg = Self::new(
            MessageKind::StateUpdate,
            payload,
            timestamp,
            source,
            Priority::High,
        );
        msg.id = format!("update-{}", change.id);
        Ok(msg)
    }

    /// Creates a ping probe. The id doubles as the latency-probe key.
    pub fn ping(timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self::new(
            MessageKind::Ping,
            serde_json::Value::Null,
            timestamp,
            source,
            Priority::Critical,
        )
    }

    /// Creates a pong reply echoing the ping id.
    pub fn pong(ping_id: &str, timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self::new(
            MessageKind::Pong,
            serde_json::json!({ "ping": ping_id }),
            timestamp,
            source,
            Priority::Critical,
        )
    }

    /// Creates a sync request for changes since the given version.
    pub fn sync_request(
        since_version: u64,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self::new(
            MessageKind::SyncRequest,
            serde_json::json!({ "since": since_version }),
            timestamp,
            source,
            Priority::High,
        )
    }

    /// Creates an error message.
    pub fn error(
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self::new(
            MessageKind::Error,
            serde_json::json!({ "message": message.into() }),
            timestamp,
            source,
            Priority::High,
        )
    }

    /// Marks the message as requiring acknowledgment.
    pub fn with_ack(mut self) -> Self {
        self.requires_ack = true;
        self
    }

    /// The ping id a pong replies to, if this is a well-formed pong.
    pub fn pong_ref(&self) -> Option<&str> {
        if self.kind != MessageKind::Pong {
            return None;
        }
        self.payload.get("ping").and_then(|v| v.as_str())
    }

    /// The message id this message acknowledges, if any.
    ///
    /// Acknowledgments ride on any inbound message as an `ack` field in
    /// the payload rather than a dedicated kind.
    pub fn ack_ref(&self) -> Option<&str> {
        self.payload.get("ack").and_then(|v| v.as_str())
    }

    /// The state change carried by a `state-update`, if well formed.
    pub fn change(&self) -> Result<StateChange> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a message from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Handshake payload sent as the first message after connecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version string.
    pub version: String,
    /// Client identity.
    pub client_id: String,
    /// Declared capabilities (e.g. `compression`, `ack`).
    pub capabilities: Vec<String>,
}

impl Handshake {
    /// Wraps the handshake in a critical-priority sync message.
    pub fn into_message(self, timestamp: DateTime<Utc>) -> Result<SyncMessage> {
        let source = self.client_id.clone();
        let payload = serde_json::to_value(&self)?;
        let mut msg = SyncMessage::new(
            MessageKind::SyncRequest,
            payload,
            timestamp,
            source,
            Priority::Critical,
        );
        msg.id = format!("handshake-{}", self.client_id);
        Ok(msg)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
