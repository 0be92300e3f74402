// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! State change intents.
//!
//! A `StateChange` describes one mutation of `ProjectState`. Changes are
//! the unit of queueing, conflict detection and commit: they either apply
//! fully (version bump, checksum recompute, `applied` set) or are rejected
//! with the state untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Which part of the project state a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A tracked file entry.
    File,
    /// The git state.
    Git,
    /// A dependency entry.
    Dependency,
    /// The build state.
    Build,
    /// The dev-server state.
    Server,
}

impl ChangeKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::File => "file",
            ChangeKind::Git => "git",
            ChangeKind::Dependency => "dependency",
            ChangeKind::Build => "build",
            ChangeKind::Server => "server",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(ChangeKind::File),
            "git" => Ok(ChangeKind::Git),
            "dependency" => Ok(ChangeKind::Dependency),
            "build" => Ok(ChangeKind::Build),
            "server" => Ok(ChangeKind::Server),
            _ => Err(Error::InvalidChangeKind(s.to_string())),
        }
    }
}

/// An intent to mutate `ProjectState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Unique change id.
    pub id: String,
    /// Which part of the state this change targets.
    pub kind: ChangeKind,
    /// Operation name scoped to the kind (e.g. `created`, `deleted`).
    pub op: String,
    /// Target key: file path, dependency name, or the kind name for
    /// singleton targets (git/build/server).
    pub target: String,
    /// Free-form operation payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// When the change was observed at its source.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the producing context.
    pub source: String,
    /// Set only after a successful commit.
    #[serde(default)]
    pub applied: bool,
}

impl StateChange {
    /// Creates a new unapplied change.
    pub fn new(
        kind: ChangeKind,
        op: impl Into<String>,
        target: impl Into<String>,
        metadata: serde_json::Value,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        let op = op.into();
        let target = target.into();
        let source = source.into();
        StateChange {
            id: format!("{}-{}-{}", kind.as_str(), target, timestamp.timestamp_millis()),
            kind,
            op,
            target,
            metadata,
            timestamp,
            source,
            applied: false,
        }
    }

    /// Serializes the change to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes a change from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
