// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Async driver for the sync client.
//!
//! Owns the [`SyncClient`] on a dedicated task and multiplexes
//! commands, inbound traffic, heartbeats and the reconnect schedule
//! over a single select loop. Callers hold a [`SyncHandle`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tether_core::{StateChange, SyncMessage};

use crate::error::{Error, Result};

use super::client::{ConnectionStats, ConnectionStatus, SyncClient, SyncError};
use super::transport::TransportKind;

const CMD_BUFFER: usize = 64;

/// Commands accepted by the sync task.
#[derive(Debug)]
pub enum SyncCommand {
    /// Send (or queue) an outbound message.
    Send(SyncMessage),
    /// Wrap a local change and send it as a state update.
    SendChange(StateChange),
    /// Request changes missed since the given version.
    SyncSince(u64),
    /// Drop the connection and retry immediately, resetting failure
    /// state.
    ForceReconnect,
    /// Tear down the connection without retrying.
    Disconnect,
    /// Report the current connection status.
    Status(oneshot::Sender<SyncStatus>),
}

/// Point-in-time view of the connection, served by `Status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Lifecycle state.
    pub status: ConnectionStatus,
    /// Active transport.
    pub transport: TransportKind,
    /// Last measured round-trip latency.
    pub latency_ms: Option<u64>,
    /// Traffic counters.
    pub stats: ConnectionStats,
}

/// Handle to a running sync task.
pub struct SyncHandle {
    cmd_tx: mpsc::Sender<SyncCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Send (or queue) an outbound message.
    pub async fn send(&self, msg: SyncMessage) -> Result<()> {
        self.command(SyncCommand::Send(msg)).await
    }

    /// Publish a local change to the remote authority.
    pub async fn send_change(&self, change: StateChange) -> Result<()> {
        self.command(SyncCommand::SendChange(change)).await
    }

    /// Ask the remote for changes since `version`.
    pub async fn sync_since(&self, version: u64) -> Result<()> {
        self.command(SyncCommand::SyncSince(version)).await
    }

    /// Drop and re-establish the connection, resetting failure state.
    pub async fn force_reconnect(&self) -> Result<()> {
        self.command(SyncCommand::ForceReconnect).await
    }

    /// Tear down the connection without retrying.
    pub async fn disconnect(&self) -> Result<()> {
        self.command(SyncCommand::Disconnect).await
    }

    /// Fetch the current connection status.
    pub async fn status(&self) -> Result<SyncStatus> {
        let (tx, rx) = oneshot::channel();
        self.command(SyncCommand::Status(tx)).await?;
        rx.await.map_err(|_| Error::WorkerGone)
    }

    /// A detached command sender for other tasks.
    pub fn clone_sender(&self) -> mpsc::Sender<SyncCommand> {
        self.cmd_tx.clone()
    }

    /// Stop the sync task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync task panicked during shutdown");
        }
    }

    async fn command(&self, cmd: SyncCommand) -> Result<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| Error::WorkerGone)
    }
}

/// One wakeup of the select loop.
enum Wakeup {
    Cancelled,
    Command(Option<SyncCommand>),
    Inbound(std::result::Result<Option<SyncMessage>, SyncError>),
    Heartbeat,
    Stats,
    Reconnect,
}

/// Spawn the sync task around an existing client.
pub fn spawn(client: SyncClient) -> SyncHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(CMD_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(client, cmd_rx, cancel.clone()));
    SyncHandle {
        cmd_tx,
        cancel,
        task,
    }
}

async fn run(
    mut client: SyncClient,
    mut cmd_rx: mpsc::Receiver<SyncCommand>,
    cancel: CancellationToken,
) {
    let heartbeat_ms = client.heartbeat_interval_ms();
    let stats_ms = client.stats_interval_ms();
    let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms.max(1)));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats = tokio::time::interval(Duration::from_millis(stats_ms.max(1)));
    stats.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut reconnect_at: Option<tokio::time::Instant> = None;

    // Initial connection attempt; failures enter the backoff schedule.
    if let Err(e) = client.connect().await {
        warn!(error = %e, "initial connect failed");
        reconnect_at = next_attempt(&mut client).await;
    }

    loop {
        let connected = client.status() == ConnectionStatus::Connected;

        let wakeup = tokio::select! {
            _ = cancel.cancelled() => Wakeup::Cancelled,
            cmd = cmd_rx.recv() => Wakeup::Command(cmd),
            res = client.recv(), if connected => Wakeup::Inbound(res),
            _ = heartbeat.tick(), if heartbeat_ms > 0 => Wakeup::Heartbeat,
            _ = stats.tick(), if stats_ms > 0 => Wakeup::Stats,
            _ = wait_for(reconnect_at) => Wakeup::Reconnect,
        };

        match wakeup {
            Wakeup::Cancelled | Wakeup::Command(None) => break,
            Wakeup::Command(Some(cmd)) => {
                handle_command(&mut client, cmd, &mut reconnect_at).await;
            }
            Wakeup::Inbound(Ok(Some(msg))) => {
                if let Err(e) = client.handle_message(msg).await {
                    warn!(error = %e, "failed to handle inbound message");
                }
            }
            Wakeup::Inbound(Ok(None)) => {
                client.handle_transport_loss("closed by peer").await;
                reconnect_at = next_attempt(&mut client).await;
            }
            Wakeup::Inbound(Err(e)) => {
                client.handle_transport_loss(&e.to_string()).await;
                reconnect_at = next_attempt(&mut client).await;
            }
            Wakeup::Heartbeat => {
                client.heartbeat_tick().await;
                client.sweep_acks();
                if client.status() == ConnectionStatus::Reconnecting && reconnect_at.is_none() {
                    reconnect_at = next_attempt(&mut client).await;
                }
            }
            Wakeup::Stats => {
                client.emit_stats().await;
            }
            Wakeup::Reconnect => {
                reconnect_at = None;
                match client.connect().await {
                    Ok(()) => debug!("reconnected"),
                    Err(e) => {
                        warn!(error = %e, "reconnect attempt failed");
                        if client.status() != ConnectionStatus::Failed {
                            reconnect_at = next_attempt(&mut client).await;
                        }
                    }
                }
            }
        }
    }

    client.disconnect().await;
}

async fn handle_command(
    client: &mut SyncClient,
    cmd: SyncCommand,
    reconnect_at: &mut Option<tokio::time::Instant>,
) {
    match cmd {
        SyncCommand::Send(msg) => {
            if let Err(e) = client.send_message(msg).await {
                warn!(error = %e, "send failed");
                if client.status() == ConnectionStatus::Reconnecting && reconnect_at.is_none() {
                    *reconnect_at = next_attempt(client).await;
                }
            }
        }
        SyncCommand::SendChange(change) => match client.outbound_update(&change) {
            Ok(msg) => {
                if let Err(e) = client.send_message(msg).await {
                    warn!(error = %e, "change send failed");
                    if client.status() == ConnectionStatus::Reconnecting && reconnect_at.is_none()
                    {
                        *reconnect_at = next_attempt(client).await;
                    }
                }
            }
            Err(e) => warn!(error = %e, "could not encode change"),
        },
        SyncCommand::SyncSince(version) => {
            let msg = client.sync_request(version);
            if let Err(e) = client.send_message(msg).await {
                warn!(error = %e, "sync request failed");
            }
        }
        SyncCommand::ForceReconnect => {
            *reconnect_at = None;
            if let Err(e) = client.force_reconnect().await {
                warn!(error = %e, "forced reconnect failed");
                *reconnect_at = next_attempt(client).await;
            }
        }
        SyncCommand::Disconnect => {
            *reconnect_at = None;
            client.disconnect().await;
        }
        SyncCommand::Status(reply) => {
            let status = SyncStatus {
                status: client.status(),
                transport: client.transport_kind(),
                latency_ms: client.latency_ms(),
                stats: client.stats(),
            };
            let _ = reply.send(status);
        }
    }
}

async fn next_attempt(client: &mut SyncClient) -> Option<tokio::time::Instant> {
    client
        .schedule_reconnect()
        .await
        .map(|delay| tokio::time::Instant::now() + delay)
}

async fn wait_for(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod runner_tests;
