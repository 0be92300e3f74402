// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! The state manager: single authority over [`ProjectState`].
//!
//! All mutation flows through one worker task consuming a command
//! channel, so concurrent `apply_change` calls commit strictly in
//! enqueue order and never interleave. Reads hand out the committed
//! `Arc<ProjectState>`; the live value is never exposed mutably.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_core::{ClockSource, ProjectState, StateChange, StateSnapshot, SystemClock};

use crate::bus::{ContextBus, ContextFrame};
use crate::config::StateConfig;
use crate::error::{Error, Result};
use crate::events::StateEvent;

use super::{apply, persist};

const CMD_BUFFER: usize = 64;

/// Validation tolerance for timestamps ahead of the local clock.
const FUTURE_SKEW_MS: i64 = 5_000;

/// Observability counters served by `metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetrics {
    /// Number of tracked files.
    pub files: usize,
    /// Number of tracked dependencies.
    pub dependencies: usize,
    /// Approximate serialized state size in bytes.
    pub approx_size: usize,
    /// Current version.
    pub version: u64,
    /// Last mutation time.
    pub last_update: DateTime<Utc>,
}

enum StateCommand {
    Apply(StateChange, oneshot::Sender<Result<Arc<ProjectState>>>),
    Get(oneshot::Sender<Arc<ProjectState>>),
    Snapshot(String, oneshot::Sender<StateSnapshot>),
    Rollback(u64, oneshot::Sender<Result<Arc<ProjectState>>>),
    Metrics(oneshot::Sender<StateMetrics>),
    Persist(oneshot::Sender<Result<()>>),
}

/// Cheap cloneable handle for applying and reading state from other
/// tasks, detached from the manager's lifecycle.
#[derive(Clone)]
pub struct StateHandle {
    cmd_tx: mpsc::Sender<StateCommand>,
}

impl StateHandle {
    /// Returns the committed state.
    pub async fn get_state(&self) -> Result<Arc<ProjectState>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(StateCommand::Get(tx))
            .await
            .map_err(|_| Error::WorkerGone)?;
        rx.await.map_err(|_| Error::WorkerGone)
    }

    /// Applies a change, resolving once it is committed or rejected.
    pub async fn apply_change(&self, change: StateChange) -> Result<Arc<ProjectState>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(StateCommand::Apply(change, tx))
            .await
            .map_err(|_| Error::WorkerGone)?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }
}

/// Handle to the state manager.
///
/// `initialize` must be called exactly once before any other operation.
pub struct StateManager {
    config: StateConfig,
    bus: Option<ContextBus>,
    events: mpsc::Sender<StateEvent>,
    clock: Arc<dyn ClockSource>,
    worker: Option<WorkerHandle>,
}

struct WorkerHandle {
    cmd_tx: mpsc::Sender<StateCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StateManager {
    /// Creates an uninitialized manager.
    pub fn new(config: StateConfig, bus: Option<ContextBus>, events: mpsc::Sender<StateEvent>) -> Self {
        StateManager {
            config,
            bus,
            events,
            clock: Arc::new(SystemClock),
            worker: None,
        }
    }

    /// Replaces the wall clock, for tests.
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads persisted state (when configured), subscribes to the
    /// context bus and starts the worker task.
    ///
    /// Calling this twice is a fatal error.
    pub fn initialize(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if self.config.persist && self.config.persist_path.is_none() {
            return Err(Error::MissingConfig(
                "state.persist_path is required when state.persist is set".to_string(),
            ));
        }

        let now = self.clock.now();
        let (state, snapshots) = self.restore(now);

        let bus_rx = if self.config.broadcast {
            self.bus.as_ref().map(|bus| bus.subscribe())
        } else {
            None
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_BUFFER);
        let cancel = CancellationToken::new();
        let worker = StateWorker {
            config: self.config.clone(),
            bus: self.bus.clone(),
            events: self.events.clone(),
            clock: Arc::clone(&self.clock),
            state: Arc::new(state),
            snapshots,
        };
        let task = tokio::spawn(worker.run(cmd_rx, bus_rx, cancel.clone()));
        self.worker = Some(WorkerHandle {
            cmd_tx,
            cancel,
            task,
        });
        info!("state manager initialized");
        Ok(())
    }

    fn restore(&self, now: DateTime<Utc>) -> (ProjectState, VecDeque<StateSnapshot>) {
        if self.config.persist {
            if let Some(path) = &self.config.persist_path {
                match persist::load(path) {
                    Ok(Some((state, snapshots))) => {
                        info!(version = state.version, "restored persisted state");
                        return (state, snapshots.into());
                    }
                    Ok(None) => debug!("no persisted state yet"),
                    Err(e) => {
                        warn!(error = %e, "failed to restore persisted state, starting empty");
                    }
                }
            }
        }
        let state = ProjectState::empty(now);
        let mut snapshots = VecDeque::new();
        snapshots.push_back(StateSnapshot::capture(&state, "initial", now));
        (state, snapshots)
    }

    /// Returns a detached handle for other tasks.
    pub fn handle(&self) -> Result<StateHandle> {
        let worker = self.worker.as_ref().ok_or(Error::NotInitialized)?;
        Ok(StateHandle {
            cmd_tx: worker.cmd_tx.clone(),
        })
    }

    /// Returns the committed state.
    pub async fn get_state(&self) -> Result<Arc<ProjectState>> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Get(tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)
    }

    /// Applies a change, resolving once it is committed or rejected.
    pub async fn apply_change(&self, change: StateChange) -> Result<Arc<ProjectState>> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Apply(change, tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }

    /// Reports whether the change's target was modified after the
    /// change's own timestamp.
    ///
    /// Advisory: `apply_change` does not consult this itself; callers
    /// in multi-writer setups decide what to do with a conflict.
    pub fn check_for_conflicts(change: &StateChange, state: &ProjectState) -> bool {
        state.target_modified(change.kind, &change.target) > change.timestamp
    }

    /// Captures a snapshot of the current state into the history.
    pub async fn create_snapshot(&self, reason: impl Into<String>) -> Result<StateSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Snapshot(reason.into(), tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)
    }

    /// Restores the state content captured at `version`.
    ///
    /// Rollback moves the version counter forward; history is never
    /// silently rewound.
    pub async fn rollback_to_version(&self, version: u64) -> Result<Arc<ProjectState>> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Rollback(version, tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }

    /// Returns observability counters.
    pub async fn metrics(&self) -> Result<StateMetrics> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Metrics(tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)
    }

    /// Forces a persistence cycle now.
    pub async fn persist_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(StateCommand::Persist(tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)?
    }

    /// Stops the worker, performing a final persist.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            if let Err(e) = worker.task.await {
                warn!(error = %e, "state worker panicked during shutdown");
            }
        }
    }

    async fn command(&self, cmd: StateCommand) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(Error::NotInitialized)?;
        worker.cmd_tx.send(cmd).await.map_err(|_| Error::WorkerGone)
    }
}

struct StateWorker {
    config: StateConfig,
    bus: Option<ContextBus>,
    events: mpsc::Sender<StateEvent>,
    clock: Arc<dyn ClockSource>,
    state: Arc<ProjectState>,
    snapshots: VecDeque<StateSnapshot>,
}

impl StateWorker {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<StateCommand>,
        bus_rx: Option<broadcast::Receiver<ContextFrame>>,
        cancel: CancellationToken,
    ) {
        let backup_ms = if self.config.persist {
            self.config.backup_interval_ms
        } else {
            0
        };
        let mut backup = tokio::time::interval(Duration::from_millis(backup_ms.max(1)));
        backup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut bus_rx = bus_rx;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                frame = recv_frame(&mut bus_rx) => {
                    self.handle_frame(frame).await;
                }
                _ = backup.tick(), if backup_ms > 0 => {
                    if let Err(e) = self.persist() {
                        warn!(error = %e, "periodic backup failed");
                    }
                }
            }
        }

        // Final persist on shutdown.
        if self.config.persist {
            if let Err(e) = self.persist() {
                warn!(error = %e, "final persist failed");
            }
        }
    }

    async fn handle_command(&mut self, cmd: StateCommand) {
        match cmd {
            StateCommand::Apply(change, reply) => {
                let result = self.commit(change, true).await;
                let _ = reply.send(result);
            }
            StateCommand::Get(reply) => {
                let _ = reply.send(Arc::clone(&self.state));
            }
            StateCommand::Snapshot(reason, reply) => {
                let snapshot = StateSnapshot::capture(&self.state, reason, self.clock.now());
                self.push_snapshot(snapshot.clone());
                let _ = reply.send(snapshot);
            }
            StateCommand::Rollback(version, reply) => {
                let result = self.rollback(version).await;
                let _ = reply.send(result);
            }
            StateCommand::Metrics(reply) => {
                let _ = reply.send(self.metrics());
            }
            StateCommand::Persist(reply) => {
                let _ = reply.send(self.persist());
            }
        }
    }

    async fn handle_frame(&mut self, frame: ContextFrame) {
        if frame.source == self.config.source_id {
            // Our own broadcast echoed back.
            return;
        }
        debug!(source = %frame.source, id = %frame.change.id, "applying sibling change");
        let change = frame.change.clone();
        match self.commit(frame.change, false).await {
            Ok(_) => {
                let _ = self.events.send(StateEvent::RemoteChange(change)).await;
            }
            Err(e) => warn!(error = %e, "failed to apply sibling change"),
        }
    }

    /// Applies one change: handler, version bump, checksum, validation,
    /// snapshot, notify, persist, broadcast. Rejection leaves the
    /// committed state untouched.
    async fn commit(
        &mut self,
        mut change: StateChange,
        broadcast: bool,
    ) -> Result<Arc<ProjectState>> {
        let now = self.clock.now();
        let mut next = (*self.state).clone();

        apply::apply(&mut next, &change).map_err(Error::from)?;

        next.version += 1;
        next.last_update = now;
        next.checksum = tether_core::checksum::compute(&next);

        if self.config.validate {
            validate(&next, now).map_err(Error::from)?;
        }

        change.applied = true;
        let committed = Arc::new(next);
        self.state = Arc::clone(&committed);
        self.push_snapshot(StateSnapshot::capture(
            &committed,
            format!("change {}", change.id),
            now,
        ));

        debug!(id = %change.id, version = committed.version, "committed change");
        let _ = self
            .events
            .send(StateEvent::Changed(Arc::clone(&committed)))
            .await;

        if self.config.persist {
            if let Err(e) = self.persist() {
                // In-memory state stays authoritative; next cycle retries.
                warn!(error = %e, "persist failed after commit");
            }
        }

        if broadcast && self.config.broadcast {
            if let Some(bus) = &self.bus {
                bus.publish(ContextFrame {
                    source: self.config.source_id.clone(),
                    change,
                });
            }
        }

        Ok(committed)
    }

    async fn rollback(&mut self, version: u64) -> Result<Arc<ProjectState>> {
        let snapshot = self
            .snapshots
            .iter()
            .find(|s| s.version == version)
            .cloned()
            .ok_or(tether_core::Error::SnapshotNotFound(version))?;

        let now = self.clock.now();
        let mut next = snapshot.state;
        next.version = self.state.version + 1;
        next.last_update = now;
        next.checksum = tether_core::checksum::compute(&next);

        let committed = Arc::new(next);
        self.state = Arc::clone(&committed);
        self.push_snapshot(StateSnapshot::capture(
            &committed,
            format!("rollback to {version}"),
            now,
        ));

        info!(from = version, version = committed.version, "rolled back");
        let _ = self
            .events
            .send(StateEvent::Changed(Arc::clone(&committed)))
            .await;

        if self.config.persist {
            if let Err(e) = self.persist() {
                warn!(error = %e, "persist failed after rollback");
            }
        }

        Ok(committed)
    }

    fn push_snapshot(&mut self, snapshot: StateSnapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.config.max_snapshots.max(1) {
            self.snapshots.pop_front();
        }
    }

    fn metrics(&self) -> StateMetrics {
        let approx_size = serde_json::to_vec(&*self.state).map(|v| v.len()).unwrap_or(0);
        StateMetrics {
            files: self.state.files.len(),
            dependencies: self.state.dependencies.len(),
            approx_size,
            version: self.state.version,
            last_update: self.state.last_update,
        }
    }

    fn persist(&self) -> Result<()> {
        if !self.config.persist {
            return Ok(());
        }
        let path = self
            .config
            .persist_path
            .as_ref()
            .ok_or_else(|| Error::MissingConfig("state.persist_path".to_string()))?;
        let snapshots: Vec<StateSnapshot> = self.snapshots.iter().cloned().collect();
        persist::save(path, &self.state, &snapshots, self.clock.now())
    }
}

/// Structural invariant checks applied after each candidate mutation.
fn validate(state: &ProjectState, now: DateTime<Utc>) -> tether_core::Result<()> {
    if state.version == 0 {
        return Err(tether_core::Error::Validation(
            "version must be positive".to_string(),
        ));
    }
    let skew = state.last_update.timestamp_millis() - now.timestamp_millis();
    if skew > FUTURE_SKEW_MS {
        return Err(tether_core::Error::Validation(format!(
            "last_update is {skew}ms in the future"
        )));
    }
    state.verify_checksum()
}

async fn recv_frame(rx: &mut Option<broadcast::Receiver<ContextFrame>>) -> ContextFrame {
    match rx {
        Some(rx) => loop {
            match rx.recv().await {
                Ok(frame) => return frame,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "context bus lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    std::future::pending::<()>().await;
                }
            }
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
