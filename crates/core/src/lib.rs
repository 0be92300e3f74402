// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! tether-core: shared types for the tether state sync engine.
//!
//! This crate provides the state model, change/snapshot types, wire
//! protocol envelopes and checksum primitives used by both halves of the
//! engine (state manager and sync client). It has no async runtime and no
//! network dependency.

pub mod change;
pub mod checksum;
pub mod clock;
pub mod error;
pub mod protocol;
pub mod snapshot;
pub mod state;

pub use change::{ChangeKind, StateChange};
pub use clock::{ClockSource, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use protocol::{Handshake, MessageKind, Priority, SyncMessage};
pub use snapshot::StateSnapshot;
pub use state::{
    BuildState, BuildStatus, DependencyKind, DependencyState, FileState, GitState, GitStatus,
    ProjectState, ServerState, ServerStatus,
};
