// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Error types for tether-core operations.

use thiserror::Error;

/// All possible errors that can occur in tether-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid change kind: '{0}'\n  hint: valid kinds are: file, git, dependency, build, server")]
    InvalidChangeKind(String),

    #[error("unknown {kind} operation: '{op}'")]
    UnknownOperation { kind: String, op: String },

    #[error("invalid message kind: '{0}'\n  hint: valid kinds are: state-update, ping, pong, error, sync-request, heartbeat")]
    InvalidMessageKind(String),

    #[error("invalid priority: '{0}'\n  hint: valid priorities are: low, medium, high, critical")]
    InvalidPriority(String),

    #[error("state validation failed: {0}")]
    Validation(String),

    #[error("state corrupted: checksum mismatch (stored {stored}, computed {computed})")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("unknown snapshot version: {0}")]
    SnapshotNotFound(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for tether-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
