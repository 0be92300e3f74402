// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Connection layer: transports, outbound queue and the sync client.

pub mod client;
pub mod compress;
pub mod queue;
pub mod runner;
pub mod sse;
pub mod transport;

pub use client::{
    ConnectionStats, ConnectionStatus, DefaultTransportFactory, SyncClient, SyncError,
    TransportFactory,
};
pub use queue::MessageQueue;
pub use runner::{spawn, SyncCommand, SyncHandle, SyncStatus};
pub use sse::{SseEvent, SseParser, SseTransport};
pub use transport::{Transport, TransportError, TransportKind, TransportResult, WebSocketTransport};

#[cfg(test)]
#[path = "integration_tests.rs"]
mod integration_tests;
