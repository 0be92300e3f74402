// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Immutable historical snapshots of project state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::ProjectState;

/// A point-in-time copy of `ProjectState`, used for audit and rollback.
///
/// Snapshots form a bounded history in the state manager: oldest entries
/// are evicted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The version the snapshot represents.
    pub version: u64,
    /// Human-readable reason the snapshot was taken.
    pub reason: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Checksum of the captured state.
    pub checksum: String,
    /// The captured state.
    pub state: ProjectState,
}

impl StateSnapshot {
    /// Captures a snapshot of the given state.
    pub fn capture(state: &ProjectState, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        StateSnapshot {
            version: state.version,
            reason: reason.into(),
            taken_at: now,
            checksum: state.checksum.clone(),
            state: state.clone(),
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
