// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Durable persistence of state and snapshot history.
//!
//! The on-disk document flattens the state's maps into ordered key/value
//! pair lists so the format survives consumers that cannot represent
//! arbitrary map keys. Writes go through a sibling temp file and an
//! atomic rename so a crash never leaves a half-written document.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tether_core::{
    DependencyState, FileState, ProjectState, StateSnapshot,
};

use crate::error::Result;

/// Portable serialized form of [`ProjectState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatState {
    files: Vec<(String, FileState)>,
    dependencies: Vec<(String, DependencyState)>,
    git: tether_core::GitState,
    build: tether_core::BuildState,
    server: tether_core::ServerState,
    last_update: DateTime<Utc>,
    version: u64,
    checksum: String,
}

impl From<&ProjectState> for FlatState {
    fn from(state: &ProjectState) -> Self {
        FlatState {
            files: state
                .files
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            dependencies: state
                .dependencies
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            git: state.git.clone(),
            build: state.build.clone(),
            server: state.server.clone(),
            last_update: state.last_update,
            version: state.version,
            checksum: state.checksum.clone(),
        }
    }
}

impl From<FlatState> for ProjectState {
    fn from(flat: FlatState) -> Self {
        ProjectState {
            files: flat.files.into_iter().collect(),
            dependencies: flat.dependencies.into_iter().collect(),
            git: flat.git,
            build: flat.build,
            server: flat.server,
            last_update: flat.last_update,
            version: flat.version,
            checksum: flat.checksum,
        }
    }
}

/// Portable serialized form of [`StateSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatSnapshot {
    version: u64,
    reason: String,
    taken_at: DateTime<Utc>,
    checksum: String,
    state: FlatState,
}

impl From<&StateSnapshot> for FlatSnapshot {
    fn from(snap: &StateSnapshot) -> Self {
        FlatSnapshot {
            version: snap.version,
            reason: snap.reason.clone(),
            taken_at: snap.taken_at,
            checksum: snap.checksum.clone(),
            state: FlatState::from(&snap.state),
        }
    }
}

impl From<FlatSnapshot> for StateSnapshot {
    fn from(flat: FlatSnapshot) -> Self {
        StateSnapshot {
            version: flat.version,
            reason: flat.reason,
            taken_at: flat.taken_at,
            checksum: flat.checksum,
            state: flat.state.into(),
        }
    }
}

/// The persisted document: state plus bounded snapshot history.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateDocument {
    /// When the document was written.
    pub saved_at: DateTime<Utc>,
    /// The committed state.
    pub state: FlatState,
    /// Snapshot history, oldest first.
    pub snapshots: Vec<FlatSnapshot>,
}

/// Writes the state and snapshot history atomically to `path`.
pub fn save(
    path: &Path,
    state: &ProjectState,
    snapshots: &[StateSnapshot],
    now: DateTime<Utc>,
) -> Result<()> {
    let doc = StateDocument {
        saved_at: now,
        state: FlatState::from(state),
        snapshots: snapshots.iter().map(FlatSnapshot::from).collect(),
    };
    let json = serde_json::to_vec_pretty(&doc).map_err(tether_core::Error::from)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = json.len(), "persisted state");
    Ok(())
}

/// Loads a persisted document, verifying the restored state's checksum.
///
/// Returns `Ok(None)` when no document exists yet.
pub fn load(path: &Path) -> Result<Option<(ProjectState, Vec<StateSnapshot>)>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let doc: StateDocument =
        serde_json::from_str(&raw).map_err(tether_core::Error::from)?;
    let state: ProjectState = doc.state.into();
    state.verify_checksum().map_err(crate::error::Error::from)?;

    let snapshots = doc.snapshots.into_iter().map(Into::into).collect();
    debug!(path = %path.display(), version = state.version, "restored state");
    Ok(Some((state, snapshots)))
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod persist_tests;
