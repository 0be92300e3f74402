// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Cross-context change broadcast.
//!
//! Sibling execution contexts (other state managers for the same project
//! in the same process tree) share a `ContextBus`. Every committed local
//! change is published tagged with its source id; receivers drop their
//! own frames so a change never echoes back to its producer.
//!
//! The bus is an explicit collaborator handed to the state manager at
//! construction; there is no ambient global channel.

use tether_core::StateChange;
use tokio::sync::broadcast;

/// A change published to sibling contexts.
#[derive(Debug, Clone)]
pub struct ContextFrame {
    /// Source id of the publishing context.
    pub source: String,
    /// The committed change.
    pub change: StateChange,
}

/// In-process broadcast hub connecting sibling contexts.
#[derive(Debug, Clone)]
pub struct ContextBus {
    tx: broadcast::Sender<ContextFrame>,
}

impl ContextBus {
    /// Creates a bus retaining up to `capacity` in-flight frames per
    /// receiver before lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ContextBus { tx }
    }

    /// Publishes a frame to all current subscribers.
    ///
    /// A bus with no subscribers is not an error; the frame is dropped.
    pub fn publish(&self, frame: ContextFrame) {
        let _ = self.tx.send(frame);
    }

    /// Subscribes to frames published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ContextFrame> {
        self.tx.subscribe()
    }
}

impl Default for ContextBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
