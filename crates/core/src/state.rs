// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! The canonical project state model.
//!
//! `ProjectState` is the full synchronized snapshot of truth: tracked
//! files, dependencies, git status, build status and dev-server status,
//! plus the version counter and checksum that guard its integrity.
//!
//! Maps are `BTreeMap` so serialization is deterministic; the checksum
//! is computed over the canonical JSON form (see `checksum`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Per-file tracking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    /// File size in bytes.
    pub size: u64,
    /// Last modification time reported by the watcher.
    pub modified: DateTime<Utc>,
    /// Content hash of the file, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Whether the file is tracked by version control.
    pub tracked: bool,
    /// When the file was last scanned.
    pub last_scan: DateTime<Utc>,
}

/// How a dependency is declared in the project manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Runtime dependency.
    Runtime,
    /// Development-only dependency.
    Dev,
    /// Build-time dependency.
    Build,
}

impl DependencyKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Runtime => "runtime",
            DependencyKind::Dev => "dev",
            DependencyKind::Build => "build",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-dependency state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyState {
    /// Resolved version string.
    pub version: String,
    /// Where the dependency is declared.
    pub kind: DependencyKind,
    /// Whether the dependency is installed locally.
    pub installed: bool,
    /// Count of known vulnerabilities.
    pub vulnerabilities: u32,
}

/// Working-tree cleanliness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitStatus {
    /// No uncommitted changes.
    Clean,
    /// Uncommitted changes present.
    Dirty,
    /// Merge or rebase conflict in progress.
    Conflict,
}

impl GitStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            GitStatus::Clean => "clean",
            GitStatus::Dirty => "dirty",
            GitStatus::Conflict => "conflict",
        }
    }
}

impl fmt::Display for GitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GitStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "clean" => Ok(GitStatus::Clean),
            "dirty" => Ok(GitStatus::Dirty),
            "conflict" => Ok(GitStatus::Conflict),
            _ => Err(Error::Validation(format!("invalid git status: '{s}'"))),
        }
    }
}

/// Repository state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitState {
    /// Current branch name.
    pub branch: String,
    /// HEAD commit hash.
    pub commit: String,
    /// Working-tree cleanliness.
    pub status: GitStatus,
    /// Paths staged for commit.
    pub staged: Vec<String>,
    /// Paths with unstaged modifications.
    pub unstaged: Vec<String>,
    /// Untracked paths.
    pub untracked: Vec<String>,
    /// Commits ahead of upstream.
    pub ahead: u32,
    /// Commits behind upstream.
    pub behind: u32,
}

impl Default for GitState {
    fn default() -> Self {
        GitState {
            branch: String::new(),
            commit: String::new(),
            status: GitStatus::Clean,
            staged: Vec::new(),
            unstaged: Vec::new(),
            untracked: Vec::new(),
            ahead: 0,
            behind: 0,
        }
    }
}

/// Build pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// No build in progress.
    Idle,
    /// Build currently running.
    Building,
    /// Last build succeeded.
    Success,
    /// Last build failed.
    Failed,
}

impl BuildStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Idle => "idle",
            BuildStatus::Building => "building",
            BuildStatus::Success => "success",
            BuildStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    /// Current build status.
    pub status: BuildStatus,
    /// When the current/last build started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    /// When the last build finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<DateTime<Utc>>,
    /// Errors from the last build.
    pub errors: Vec<String>,
    /// Warnings from the last build.
    pub warnings: Vec<String>,
    /// Produced asset paths.
    pub artifacts: Vec<String>,
}

impl Default for BuildState {
    fn default() -> Self {
        BuildState {
            status: BuildStatus::Idle,
            started: None,
            finished: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Dev-server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    /// Not running.
    Stopped,
    /// Starting up.
    Starting,
    /// Serving requests.
    Running,
    /// Crashed or failed to start.
    Error,
}

impl ServerStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Starting => "starting",
            ServerStatus::Running => "running",
            ServerStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dev-server state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    /// Current server status.
    pub status: ServerStatus,
    /// Process id, when running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// When the server was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Uptime in seconds, as last reported.
    pub uptime_secs: u64,
    /// Cumulative request count.
    pub requests: u64,
    /// Cumulative error count.
    pub errors: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        ServerState {
            status: ServerStatus::Stopped,
            pid: None,
            started_at: None,
            uptime_secs: 0,
            requests: 0,
            errors: 0,
        }
    }
}

/// The canonical synchronized project state.
///
/// Only the state manager mutates this; everything else sees committed
/// immutable copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Tracked files by path.
    pub files: BTreeMap<String, FileState>,
    /// Dependencies by name.
    pub dependencies: BTreeMap<String, DependencyState>,
    /// Repository state.
    pub git: GitState,
    /// Build state.
    pub build: BuildState,
    /// Dev-server state.
    pub server: ServerState,
    /// When the state was last mutated.
    pub last_update: DateTime<Utc>,
    /// Monotonically increasing commit counter.
    pub version: u64,
    /// SHA-256 over the canonical serialization (see `checksum`).
    pub checksum: String,
}

impl ProjectState {
    /// Creates an empty state at version 1.
    pub fn empty(now: DateTime<Utc>) -> Self {
        let mut state = ProjectState {
            files: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            git: GitState::default(),
            build: BuildState::default(),
            server: ServerState::default(),
            last_update: now,
            version: 1,
            checksum: String::new(),
        };
        state.checksum = crate::checksum::compute(&state);
        state
    }

    /// Returns the last-modified time recorded for a change target.
    ///
    /// Files carry their own mtime; every other kind shares the state's
    /// `last_update` since those entities have no per-entity clock.
    pub fn target_modified(&self, kind: crate::change::ChangeKind, target: &str) -> DateTime<Utc> {
        match kind {
            crate::change::ChangeKind::File => self
                .files
                .get(target)
                .map(|f| f.modified)
                .unwrap_or(self.last_update),
            _ => self.last_update,
        }
    }

    /// Verifies that the stored checksum matches a fresh recomputation.
    pub fn verify_checksum(&self) -> Result<()> {
        let computed = crate::checksum::compute(self);
        if computed == self.checksum {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                stored: self.checksum.clone(),
                computed,
            })
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
