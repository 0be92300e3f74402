// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! The engine facade: wires the state manager and sync client together.
//!
//! The two subsystems stay decoupled; a pump task forwards remote
//! changes from the sync side into the state manager's apply path and
//! merges both event streams into one channel for the hosting
//! application. On (re)connect the pump requests changes missed since
//! the current state version.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tether_core::{ProjectState, StateChange, StateSnapshot};

use crate::bus::ContextBus;
use crate::config::Config;
use crate::error::Result;
use crate::events::{StateEvent, SyncEvent};
use crate::state::{StateHandle, StateManager, StateMetrics};
use crate::sync::{self, ConnectionStats, SyncClient, SyncHandle, SyncStatus, TransportKind};

const EVENT_BUFFER: usize = 256;

/// Everything the hosting application can observe.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A change was committed; carries the new immutable state.
    StateChanged(Arc<ProjectState>),
    /// A change from the network or a sibling context was applied.
    RemoteChange(StateChange),
    /// The sync connection came up.
    Connected {
        /// Active transport kind.
        transport: TransportKind,
    },
    /// The sync connection went down.
    Disconnected {
        /// Why it went down.
        reason: String,
    },
    /// Reconnection gave up; `force_reconnect` is required to resume.
    ConnectionFailed {
        /// Attempts performed.
        attempts: u32,
    },
    /// A non-fatal error worth surfacing.
    Error(String),
    /// Periodic connection statistics.
    Stats(ConnectionStats),
}

/// A running engine instance.
pub struct Engine {
    state: StateManager,
    sync: Option<SyncHandle>,
    pump: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Engine {
    /// Starts the engine: initializes the state manager, connects the
    /// sync client when endpoints are configured, and begins pumping
    /// events.
    ///
    /// Returns the engine and the application's event stream.
    pub fn start(
        config: Config,
        bus: Option<ContextBus>,
    ) -> Result<(Engine, mpsc::Receiver<EngineEvent>)> {
        let (state_tx, state_rx) = mpsc::channel(EVENT_BUFFER);
        let mut state = StateManager::new(config.state.clone(), bus, state_tx);
        state.initialize()?;
        let handle = state.handle()?;

        let sync_enabled =
            config.sync.socket_url.is_some() || config.sync.stream_url.is_some();
        let (sync_handle, sync_rx) = if sync_enabled {
            config.sync.validate()?;
            let (sync_tx, sync_rx) = mpsc::channel(EVENT_BUFFER);
            let client = SyncClient::new(config.sync, sync_tx);
            (Some(sync::spawn(client)), Some(sync_rx))
        } else {
            (None, None)
        };

        let (app_tx, app_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump(
            handle,
            sync_handle.as_ref().map(SyncHandle::clone_sender),
            state_rx,
            sync_rx,
            app_tx,
            cancel.clone(),
        ));

        Ok((
            Engine {
                state,
                sync: sync_handle,
                pump,
                cancel,
            },
            app_rx,
        ))
    }

    /// Returns the committed state.
    pub async fn get_state(&self) -> Result<Arc<ProjectState>> {
        self.state.get_state().await
    }

    /// Applies a local change and publishes it to the remote authority.
    pub async fn apply_change(&self, change: StateChange) -> Result<Arc<ProjectState>> {
        let committed = self.state.apply_change(change.clone()).await?;
        if let Some(sync) = &self.sync {
            sync.send_change(change).await?;
        }
        Ok(committed)
    }

    /// Captures a named snapshot.
    pub async fn create_snapshot(&self, reason: impl Into<String>) -> Result<StateSnapshot> {
        self.state.create_snapshot(reason).await
    }

    /// Rolls the state content back to `version`.
    pub async fn rollback_to_version(&self, version: u64) -> Result<Arc<ProjectState>> {
        self.state.rollback_to_version(version).await
    }

    /// Returns state observability counters.
    pub async fn metrics(&self) -> Result<StateMetrics> {
        self.state.metrics().await
    }

    /// Returns the sync connection status, if sync is enabled.
    pub async fn sync_status(&self) -> Result<Option<SyncStatus>> {
        match &self.sync {
            Some(sync) => Ok(Some(sync.status().await?)),
            None => Ok(None),
        }
    }

    /// Resets reconnect failure state and retries immediately.
    pub async fn force_reconnect(&self) -> Result<()> {
        if let Some(sync) = &self.sync {
            sync.force_reconnect().await?;
        }
        Ok(())
    }

    /// Stops everything: sync task, pump, then the state worker (which
    /// performs a final persist).
    pub async fn shutdown(mut self) {
        if let Some(sync) = self.sync.take() {
            sync.shutdown().await;
        }
        self.cancel.cancel();
        if let Err(e) = self.pump.await {
            warn!(error = %e, "event pump panicked during shutdown");
        }
        self.state.shutdown().await;
    }
}

async fn pump(
    state: StateHandle,
    sync: Option<mpsc::Sender<sync::SyncCommand>>,
    mut state_rx: mpsc::Receiver<StateEvent>,
    sync_rx: Option<mpsc::Receiver<SyncEvent>>,
    app_tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) {
    let mut sync_rx = sync_rx;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = state_rx.recv() => match event {
                Some(event) => forward_state(event, &app_tx).await,
                None => break,
            },
            event = recv_sync(&mut sync_rx) => {
                handle_sync_event(event, &state, &sync, &app_tx).await;
            }
        }
    }
}

async fn forward_state(event: StateEvent, app_tx: &mpsc::Sender<EngineEvent>) {
    let out = match event {
        StateEvent::Changed(state) => EngineEvent::StateChanged(state),
        StateEvent::RemoteChange(change) => EngineEvent::RemoteChange(change),
    };
    let _ = app_tx.send(out).await;
}

async fn handle_sync_event(
    event: SyncEvent,
    state: &StateHandle,
    sync: &Option<mpsc::Sender<sync::SyncCommand>>,
    app_tx: &mpsc::Sender<EngineEvent>,
) {
    match event {
        SyncEvent::Connected { transport } => {
            // Catch up on whatever we missed while offline.
            if let Some(sync) = sync {
                match state.get_state().await {
                    Ok(current) => {
                        let _ = sync
                            .send(sync::SyncCommand::SyncSince(current.version))
                            .await;
                    }
                    Err(e) => warn!(error = %e, "could not read version for catch-up"),
                }
            }
            let _ = app_tx.send(EngineEvent::Connected { transport }).await;
        }
        SyncEvent::Disconnected { reason } => {
            let _ = app_tx.send(EngineEvent::Disconnected { reason }).await;
        }
        SyncEvent::ConnectionFailed { attempts } => {
            let _ = app_tx.send(EngineEvent::ConnectionFailed { attempts }).await;
        }
        SyncEvent::RemoteChange(change) => {
            debug!(id = %change.id, "applying remote change");
            match state.apply_change(change.clone()).await {
                Ok(_) => {
                    let _ = app_tx.send(EngineEvent::RemoteChange(change)).await;
                }
                Err(e) => {
                    warn!(error = %e, id = %change.id, "remote change rejected");
                    let _ = app_tx
                        .send(EngineEvent::Error(format!(
                            "remote change {} rejected: {e}",
                            change.id
                        )))
                        .await;
                }
            }
        }
        SyncEvent::Error(message) => {
            let _ = app_tx.send(EngineEvent::Error(message)).await;
        }
        SyncEvent::Stats(stats) => {
            let _ = app_tx.send(EngineEvent::Stats(stats)).await;
        }
    }
}

async fn recv_sync(rx: &mut Option<mpsc::Receiver<SyncEvent>>) -> SyncEvent {
    match rx {
        Some(rx) => match rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod bridge_tests;
