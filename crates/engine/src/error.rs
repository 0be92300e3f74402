// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

use thiserror::Error;

/// All possible errors that can occur in the tether library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("state manager already initialized")]
    AlreadyInitialized,

    #[error("state manager not initialized: call initialize() first")]
    NotInitialized,

    #[error("state manager worker stopped unexpectedly")]
    WorkerGone,

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("sync error: {0}")]
    Sync(#[from] crate::sync::SyncError),

    #[error(transparent)]
    Core(#[from] tether_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for tether operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
