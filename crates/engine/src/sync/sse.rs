// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Push-only SSE fallback transport.
//!
//! When the WebSocket endpoint is unreachable the client degrades to a
//! server-sent-events stream. The stream delivers remote updates but
//! cannot carry outbound traffic, so local changes stay queued until
//! the socket recovers.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use tracing::warn;

use tether_core::SyncMessage;

use super::transport::{Transport, TransportError, TransportKind, TransportResult};

/// Incremental parser for the SSE wire format.
///
/// Feeds on raw chunks and yields complete events. An event is the
/// accumulated `data:` lines, dispatched at the first blank line.
/// `event:` names and comment lines (leading `:`) are tracked but the
/// payload itself is always the data body.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event_name: Option<String>,
    data: Vec<String>,
}

/// A single parsed server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name from the `event:` field, if any.
    pub name: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
}

impl SseParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        SseParser::default()
    }

    /// Feed a chunk of bytes, returning any events completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.take_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            // Blank line dispatches the accumulated event
            if self.data.is_empty() {
                self.event_name = None;
                return None;
            }
            let event = SseEvent {
                name: self.event_name.take(),
                data: self.data.join("\n"),
            };
            self.data.clear();
            return Some(event);
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.event_name = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if line.starts_with(':') {
            // Comment line, used by servers as a keepalive
        }
        None
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Sync>>;

/// SSE transport implementation over a chunked HTTP response.
pub struct SseTransport {
    client: reqwest::Client,
    stream: Option<ByteStream>,
    parser: SseParser,
    pending: VecDeque<SyncMessage>,
    connect_timeout: Duration,
}

impl SseTransport {
    /// Create a new SSE transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        SseTransport {
            client: reqwest::Client::new(),
            stream: None,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            connect_timeout,
        }
    }

    fn decode_event(event: SseEvent) -> Option<SyncMessage> {
        match event.name.as_deref() {
            None | Some("state-update") | Some("heartbeat") | Some("message") => {
                match SyncMessage::from_json(&event.data) {
                    Ok(msg) => Some(msg),
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable stream event");
                        None
                    }
                }
            }
            Some(other) => {
                warn!(event = other, "ignoring unknown stream event");
                None
            }
        }
    }
}

impl Transport for SseTransport {
    fn connect(
        &mut self,
        url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            let request = self
                .client
                .get(&url)
                .header("Accept", "text/event-stream")
                .send();

            // Bound the connect and header phase only; the body is a
            // long-lived stream and must not carry a deadline.
            let response = tokio::time::timeout(self.connect_timeout, request)
                .await
                .map_err(|_| TransportError::ConnectionFailed("connect timed out".to_string()))?
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?
                .error_for_status()
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            self.parser = SseParser::new();
            self.pending.clear();
            self.stream = Some(Box::pin(response.bytes_stream()));
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.stream = None;
            self.pending.clear();
            Ok(())
        })
    }

    fn send(
        &mut self,
        _msg: SyncMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Err(TransportError::SendUnsupported) })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<SyncMessage>>> + Send + '_>> {
        Box::pin(async move {
            use futures_util::StreamExt;

            loop {
                if let Some(msg) = self.pending.pop_front() {
                    return Ok(Some(msg));
                }

                let stream = self.stream.as_mut().ok_or(TransportError::ConnectionClosed)?;
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        for event in self.parser.feed(&chunk) {
                            if let Some(msg) = Self::decode_event(event) {
                                self.pending.push_back(msg);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        self.stream = None;
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        self.stream = None;
                        return Ok(None);
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn can_send(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod sse_tests;
