// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Sync client connection management.
//!
//! Owns the active transport, the outbound queue, ack bookkeeping and
//! the reconnection schedule. The async runner (`runner`) drives this
//! state machine; the client itself never spawns tasks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tether_core::{ClockSource, MessageKind, Priority, StateChange, SyncMessage, SystemClock};

use crate::config::SyncConfig;
use crate::events::SyncEvent;

use super::compress::{compress_payload, decompress_payload};
use super::queue::MessageQueue;
use super::sse::SseTransport;
use super::transport::{Transport, TransportError, TransportKind, WebSocketTransport};

/// Errors surfaced by the sync client.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// All transports refused the connection.
    #[error("unable to reach sync endpoint: {0}")]
    Unreachable(String),

    /// The client gave up after exhausting reconnect attempts.
    #[error("connection failed after {attempts} attempts")]
    GaveUp {
        /// How many attempts were made.
        attempts: u32,
    },

    /// Message encode/decode failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// Underlying transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected, not trying.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Live connection.
    Connected,
    /// Waiting out a backoff delay before retrying.
    Reconnecting,
    /// Gave up after exhausting attempts.
    Failed,
}

/// Counters reported alongside the connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Messages currently waiting in the outbound queue.
    pub messages_queued: usize,
    /// Messages successfully handed to a transport.
    pub messages_sent: u64,
    /// Messages received from the remote authority.
    pub messages_received: u64,
    /// Wire bytes sent.
    pub bytes_sent: u64,
    /// Wire bytes received.
    pub bytes_received: u64,
}

/// An outbound message awaiting acknowledgment.
#[derive(Debug)]
struct PendingAck {
    deadline: Instant,
}

/// Produces transports for the client; swapped out in tests.
pub trait TransportFactory: Send + Sync {
    /// Build the bidirectional socket transport.
    fn socket(&mut self) -> Option<Box<dyn Transport>>;

    /// Build the push-only stream fallback, if enabled.
    fn stream(&mut self) -> Option<Box<dyn Transport>>;
}

/// Factory wiring the real WebSocket and SSE transports.
pub struct DefaultTransportFactory {
    connect_timeout: Duration,
    enable_fallback: bool,
}

impl DefaultTransportFactory {
    /// Build a factory from the sync configuration.
    pub fn new(config: &SyncConfig) -> Self {
        DefaultTransportFactory {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            enable_fallback: config.enable_fallback,
        }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn socket(&mut self) -> Option<Box<dyn Transport>> {
        Some(Box::new(WebSocketTransport::new(self.connect_timeout)))
    }

    fn stream(&mut self) -> Option<Box<dyn Transport>> {
        if self.enable_fallback {
            Some(Box::new(SseTransport::new(self.connect_timeout)))
        } else {
            None
        }
    }
}

/// The sync client state machine.
pub struct SyncClient {
    config: SyncConfig,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    status: ConnectionStatus,
    queue: MessageQueue,
    pending_acks: HashMap<String, PendingAck>,
    pending_pings: HashMap<String, Instant>,
    reconnect_attempts: u32,
    latency_ms: Option<u64>,
    stats: ConnectionStats,
    last_heartbeat: Option<Instant>,
    events: mpsc::Sender<SyncEvent>,
}

impl SyncClient {
    /// Create a client with the default transport factory.
    pub fn new(config: SyncConfig, events: mpsc::Sender<SyncEvent>) -> Self {
        let factory = Box::new(DefaultTransportFactory::new(&config));
        SyncClient::with_factory(config, factory, events)
    }

    /// Create a client with a custom transport factory.
    pub fn with_factory(
        config: SyncConfig,
        factory: Box<dyn TransportFactory>,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let queue = MessageQueue::new(config.queue_capacity);
        SyncClient {
            config,
            factory,
            transport: None,
            status: ConnectionStatus::Disconnected,
            queue,
            pending_acks: HashMap::new(),
            pending_pings: HashMap::new(),
            reconnect_attempts: 0,
            latency_ms: None,
            stats: ConnectionStats::default(),
            last_heartbeat: None,
            events,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Which transport is active.
    pub fn transport_kind(&self) -> TransportKind {
        self.transport
            .as_ref()
            .map(|t| t.kind())
            .unwrap_or(TransportKind::None)
    }

    /// Most recent round-trip latency, if measured.
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    /// Counters snapshot with up-to-date queue depth.
    pub fn stats(&self) -> ConnectionStats {
        let mut stats = self.stats;
        stats.messages_queued = self.queue.len();
        stats
    }

    /// Configured heartbeat interval.
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.config.heartbeat_interval_ms
    }

    /// Configured stats reporting interval.
    pub fn stats_interval_ms(&self) -> u64 {
        self.config.stats_interval_ms
    }

    /// Publish a stats snapshot on the event channel.
    pub async fn emit_stats(&self) {
        self.emit(SyncEvent::Stats(self.stats())).await;
    }

    /// Attempt to connect once: socket first, then stream fallback.
    ///
    /// A no-op when already connected or a connect is in flight.
    /// Returns an error after the client has permanently failed;
    /// `force_reconnect` resets that state.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        match self.status {
            ConnectionStatus::Connected | ConnectionStatus::Connecting => return Ok(()),
            ConnectionStatus::Failed => {
                return Err(SyncError::GaveUp {
                    attempts: self.reconnect_attempts,
                })
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting => {}
        }

        self.status = ConnectionStatus::Connecting;

        let socket_err = match (self.config.socket_url.clone(), self.factory.socket()) {
            (Some(base), Some(transport)) => {
                let url = self.config.endpoint_url(&base);
                match self.try_transport(transport, &url).await {
                    Ok(()) => return Ok(()),
                    Err(e) => e.to_string(),
                }
            }
            (None, _) => "no socket endpoint configured".to_string(),
            (_, None) => "socket transport unavailable".to_string(),
        };

        warn!(error = %socket_err, "socket connect failed, trying stream fallback");

        if let (Some(base), Some(transport)) = (self.config.stream_url.clone(), self.factory.stream())
        {
            let url = self.config.endpoint_url(&base);
            match self.try_transport(transport, &url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.status = ConnectionStatus::Disconnected;
                    return Err(SyncError::Unreachable(format!(
                        "socket: {socket_err}; stream: {e}"
                    )));
                }
            }
        }

        self.status = ConnectionStatus::Disconnected;
        Err(SyncError::Unreachable(socket_err))
    }

    async fn try_transport(
        &mut self,
        mut transport: Box<dyn Transport>,
        url: &str,
    ) -> Result<(), SyncError> {
        transport.connect(url).await?;
        let kind = transport.kind();
        let can_send = transport.can_send();
        self.transport = Some(transport);
        self.status = ConnectionStatus::Connected;
        self.last_heartbeat = Some(Instant::now());

        if can_send {
            if let Err(e) = self.send_handshake().await {
                // A transport that cannot carry the handshake is no
                // connection at all.
                self.transport = None;
                self.status = ConnectionStatus::Connecting;
                self.last_heartbeat = None;
                return Err(e);
            }
        }

        self.reconnect_attempts = 0;
        info!(transport = %kind, "connected to sync endpoint");
        self.emit(SyncEvent::Connected { transport: kind }).await;

        if can_send {
            self.flush_queue().await;
        }
        Ok(())
    }

    async fn send_handshake(&mut self) -> Result<(), SyncError> {
        let handshake = tether_core::Handshake {
            version: self.config.protocol_version.clone(),
            client_id: self.config.client_id.clone(),
            capabilities: if self.config.enable_compression {
                vec!["compression".to_string()]
            } else {
                Vec::new()
            },
        };
        let msg = handshake
            .into_message(SystemClock.now())
            .map_err(|e| SyncError::Codec(e.to_string()))?;
        self.transmit(msg).await
    }

    /// Tear down the connection without scheduling a retry.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.disconnect().await {
                debug!(error = %e, "error during disconnect");
            }
        }
        self.status = ConnectionStatus::Disconnected;
        self.pending_acks.clear();
        self.pending_pings.clear();
        self.latency_ms = None;
        self.last_heartbeat = None;
        self.emit(SyncEvent::Disconnected {
            reason: "requested".to_string(),
        })
        .await;
    }

    /// Drop any connection, clear the failure state and retry counters,
    /// then connect again.
    pub async fn force_reconnect(&mut self) -> Result<(), SyncError> {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.disconnect().await;
        }
        self.status = ConnectionStatus::Disconnected;
        self.reconnect_attempts = 0;
        self.pending_acks.clear();
        self.pending_pings.clear();
        self.connect().await
    }

    /// Send a message, queueing it if the connection cannot carry it.
    pub async fn send_message(&mut self, msg: SyncMessage) -> Result<(), SyncError> {
        let sendable = self.status == ConnectionStatus::Connected
            && self.transport.as_ref().is_some_and(|t| t.can_send());

        if !sendable {
            self.enqueue(msg);
            return Ok(());
        }

        match self.transmit(msg.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Keep the message; the runner will reconnect and flush.
                warn!(error = %e, id = %msg.id, "send failed, queueing message");
                self.enqueue(msg);
                self.handle_transport_loss("send failure").await;
                Err(e)
            }
        }
    }

    fn enqueue(&mut self, msg: SyncMessage) {
        if let Some(evicted) = self.queue.push(msg) {
            warn!(id = %evicted.id, priority = ?evicted.priority, "queue full, dropping message");
        }
    }

    /// Re-send everything queued while the connection was down.
    pub async fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let drained = self.queue.drain_ordered();
        info!(count = drained.len(), "flushing queued messages");
        for msg in drained {
            if let Err(e) = self.transmit(msg.clone()).await {
                warn!(error = %e, "flush interrupted, re-queueing");
                self.enqueue(msg);
                self.handle_transport_loss("flush failure").await;
                return;
            }
        }
    }

    async fn transmit(&mut self, mut msg: SyncMessage) -> Result<(), SyncError> {
        if self.config.enable_compression {
            compress_payload(&mut msg, self.config.compression_threshold)?;
        }

        if msg.requires_ack {
            self.pending_acks.insert(
                msg.id.clone(),
                PendingAck {
                    deadline: Instant::now() + Duration::from_millis(self.config.ack_timeout_ms),
                },
            );
        }

        let wire_len = msg.to_json().map(|j| j.len() as u64).unwrap_or(0);
        let transport = self
            .transport
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;
        transport.send(msg).await?;
        self.stats.messages_sent += 1;
        self.stats.bytes_sent += wire_len;
        Ok(())
    }

    /// Wait for the next inbound message on the active transport.
    pub async fn recv(&mut self) -> Result<Option<SyncMessage>, SyncError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or(TransportError::ConnectionClosed)?;
        Ok(transport.recv().await?)
    }

    /// Dispatch one inbound message.
    pub async fn handle_message(&mut self, mut msg: SyncMessage) -> Result<(), SyncError> {
        decompress_payload(&mut msg)?;

        self.stats.messages_received += 1;
        if let Ok(json) = msg.to_json() {
            self.stats.bytes_received += json.len() as u64;
        }

        if let Some(acked) = msg.ack_ref() {
            if self.pending_acks.remove(acked).is_some() {
                debug!(id = acked, "message acknowledged");
            }
        }

        match msg.kind {
            MessageKind::Pong => {
                if let Some(ping_id) = msg.pong_ref() {
                    if let Some(sent_at) = self.pending_pings.remove(ping_id) {
                        self.latency_ms = Some(sent_at.elapsed().as_millis() as u64);
                    }
                }
                self.last_heartbeat = Some(Instant::now());
            }
            MessageKind::Ping => {
                self.last_heartbeat = Some(Instant::now());
                let pong = SyncMessage::pong(
                    &msg.id,
                    SystemClock.now(),
                    self.config.client_id.clone(),
                );
                if self.transport.as_ref().is_some_and(|t| t.can_send()) {
                    if let Err(e) = self.transmit(pong).await {
                        warn!(error = %e, "failed to answer ping");
                    }
                }
            }
            MessageKind::Heartbeat => {
                self.last_heartbeat = Some(Instant::now());
            }
            MessageKind::Error => {
                let detail = msg
                    .payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown remote error")
                    .to_string();
                warn!(error = %detail, "remote reported an error");
                self.emit(SyncEvent::Error(detail)).await;
            }
            MessageKind::StateUpdate => match msg.change() {
                Ok(change) => {
                    self.last_heartbeat = Some(Instant::now());
                    self.emit(SyncEvent::RemoteChange(change)).await;
                }
                Err(e) => {
                    warn!(error = %e, id = %msg.id, "undecodable state update");
                }
            },
            MessageKind::SyncRequest => {
                // Client-originated only; the remote never sends these.
                debug!(id = %msg.id, "ignoring inbound sync request");
            }
        }
        Ok(())
    }

    /// Emit a liveness probe on the active transport.
    pub async fn heartbeat_tick(&mut self) {
        if self.status != ConnectionStatus::Connected {
            return;
        }

        if self.is_stale() {
            warn!("no traffic within two heartbeat intervals, assuming dead connection");
            self.handle_transport_loss("heartbeat timeout").await;
            return;
        }

        if self.transport.as_ref().is_some_and(|t| t.can_send()) {
            let ping = SyncMessage::ping(SystemClock.now(), self.config.client_id.clone());
            let id = ping.id.clone();
            match self.transmit(ping).await {
                Ok(()) => {
                    self.pending_pings.insert(id, Instant::now());
                }
                Err(e) => {
                    warn!(error = %e, "heartbeat send failed");
                    self.handle_transport_loss("heartbeat send failure").await;
                }
            }
        }
    }

    /// Whether the connection has gone silent past the liveness window.
    pub fn is_stale(&self) -> bool {
        match self.last_heartbeat {
            Some(at) => {
                at.elapsed() > Duration::from_millis(self.config.heartbeat_interval_ms * 2)
            }
            None => false,
        }
    }

    /// Drop unacknowledged messages whose deadline has passed.
    ///
    /// Eviction is final: timed-out messages are not retried.
    pub fn sweep_acks(&mut self) {
        let now = Instant::now();
        let before = self.pending_acks.len();
        self.pending_acks.retain(|id, pending| {
            let keep = pending.deadline > now;
            if !keep {
                warn!(id = %id, "ack timed out, dropping");
            }
            keep
        });
        let dropped = before - self.pending_acks.len();
        if dropped > 0 {
            debug!(dropped, "swept timed-out acks");
        }
    }

    /// React to a broken transport: tear down and enter the
    /// reconnecting state.
    pub async fn handle_transport_loss(&mut self, reason: &str) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.disconnect().await;
        }
        self.pending_pings.clear();
        self.latency_ms = None;
        self.last_heartbeat = None;
        self.status = ConnectionStatus::Reconnecting;
        warn!(reason, "connection lost");
        self.emit(SyncEvent::Disconnected {
            reason: reason.to_string(),
        })
        .await;
    }

    /// Register a failed attempt and compute the next backoff delay.
    ///
    /// Returns `None` once the attempt budget is exhausted; the client
    /// then stays `Failed` until `force_reconnect`.
    pub async fn schedule_reconnect(&mut self) -> Option<Duration> {
        self.reconnect_attempts += 1;
        if self.reconnect_attempts >= self.config.max_reconnect_attempts {
            self.status = ConnectionStatus::Failed;
            warn!(
                attempts = self.reconnect_attempts,
                "giving up on reconnection"
            );
            self.emit(SyncEvent::ConnectionFailed {
                attempts: self.reconnect_attempts,
            })
            .await;
            return None;
        }

        self.status = ConnectionStatus::Reconnecting;
        let delay = self.reconnect_delay(self.reconnect_attempts);
        info!(
            attempt = self.reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        Some(delay)
    }

    /// Exponential backoff: base doubling per attempt, capped.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_interval_ms;
        let exp = attempt.saturating_sub(1).min(16);
        let delay = base.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.config.reconnect_max_delay_ms))
    }

    /// Build a sync-request asking for changes since `version`.
    pub fn sync_request(&self, version: u64) -> SyncMessage {
        SyncMessage::sync_request(version, SystemClock.now(), self.config.client_id.clone())
    }

    /// Wrap a local change for the wire, tagged for acknowledgment when
    /// it is high priority.
    pub fn outbound_update(&self, change: &StateChange) -> Result<SyncMessage, SyncError> {
        let msg =
            SyncMessage::state_update(change, SystemClock.now(), self.config.client_id.clone())
                .map_err(|e| SyncError::Codec(e.to_string()))?;
        Ok(if msg.priority >= Priority::High {
            msg.with_ack()
        } else {
            msg
        })
    }

    async fn emit(&self, event: SyncEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
