// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! tether: a client-side state synchronization engine.
//!
//! Keeps a local replica of shared project state consistent with a
//! remote authority over an unreliable network. Two cooperating
//! subsystems:
//!
//! - the **state manager** ([`state`]): a versioned, checksummed state
//!   store with single-writer change application, conflict detection,
//!   bounded snapshot history with rollback, and durable persistence
//! - the **sync client** ([`sync`]): transport lifecycle over a
//!   bidirectional WebSocket with a push-only SSE fallback, bounded
//!   priority queueing, heartbeat liveness, acknowledgments and
//!   exponential-backoff reconnection
//!
//! The two communicate only through events; [`bridge::Engine`] wires
//! them together for the common case.
//!
//! ```no_run
//! use tether::bridge::Engine;
//! use tether::config::Config;
//!
//! # async fn demo() -> tether::error::Result<()> {
//! let config = Config::load(std::path::Path::new("tether.toml"))?;
//! let (engine, mut events) = Engine::start(config, None)?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod state;
pub mod sync;

pub use bridge::{Engine, EngineEvent};
pub use bus::{ContextBus, ContextFrame};
pub use config::{Config, StateConfig, SyncConfig};
pub use error::{Error, Result};
pub use events::{StateEvent, SyncEvent};
pub use state::{StateHandle, StateManager, StateMetrics};
pub use sync::{
    ConnectionStats, ConnectionStatus, SyncClient, SyncHandle, SyncStatus, TransportKind,
};

// Re-export the shared model types at the crate root.
pub use tether_core::{
    ChangeKind, ClockSource, FixedClock, MessageKind, Priority, ProjectState, StateChange,
    StateSnapshot, SyncMessage, SystemClock,
};
