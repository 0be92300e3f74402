// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Notification interface between the engine and the hosting application.
//!
//! The two subsystems never call each other directly: the sync client
//! emits `SyncEvent`s, the state manager emits `StateEvent`s, and a thin
//! bridge (see `bridge`) feeds remote changes from one into the other.
//! This keeps the dependency direction visible and both halves testable
//! in isolation.

use std::sync::Arc;

use tether_core::{ProjectState, StateChange};

use crate::sync::{ConnectionStats, TransportKind};

/// Events published by the state manager.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// A change was committed; carries the new immutable state.
    Changed(Arc<ProjectState>),
    /// A change originating from another context was applied.
    RemoteChange(StateChange),
}

/// Events published by the sync client.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A transport was negotiated and the handshake sent.
    Connected {
        /// Which transport kind is active.
        transport: TransportKind,
    },
    /// The connection was lost or closed.
    Disconnected {
        /// Why the connection went away.
        reason: String,
    },
    /// The reconnect attempt ceiling was reached; no further automatic
    /// attempts will be made.
    ConnectionFailed {
        /// Number of attempts performed.
        attempts: u32,
    },
    /// A state change received from the remote authority.
    RemoteChange(StateChange),
    /// A non-fatal error worth surfacing to the application.
    Error(String),
    /// Periodic connection statistics.
    Stats(ConnectionStats),
}
