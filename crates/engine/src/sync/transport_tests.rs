// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::sync::client::TransportFactory;

/// Shared wires for mock transports: everything sent and everything
/// waiting to be received, visible to the test.
#[derive(Clone, Default)]
pub(crate) struct MockNet {
    pub sent: Arc<Mutex<Vec<SyncMessage>>>,
    pub inbound: Arc<Mutex<VecDeque<SyncMessage>>>,
    pub socket_attempts: Arc<AtomicU32>,
    pub stream_attempts: Arc<AtomicU32>,
}

impl MockNet {
    pub fn sent_ids(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.id.clone()).collect()
    }

    pub fn push_inbound(&self, msg: SyncMessage) {
        self.inbound.lock().unwrap().push_back(msg);
    }
}

/// In-memory transport for unit tests.
pub(crate) struct MockTransport {
    net: MockNet,
    kind: TransportKind,
    can_send: bool,
    fail_connect: bool,
    connected: bool,
}

impl MockTransport {
    pub fn socket(net: MockNet, fail_connect: bool) -> Self {
        MockTransport {
            net,
            kind: TransportKind::Socket,
            can_send: true,
            fail_connect,
            connected: false,
        }
    }

    pub fn stream(net: MockNet, fail_connect: bool) -> Self {
        MockTransport {
            net,
            kind: TransportKind::Stream,
            can_send: false,
            fail_connect,
            connected: false,
        }
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let counter = match self.kind {
                TransportKind::Stream => &self.net.stream_attempts,
                _ => &self.net.socket_attempts,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(TransportError::ConnectionFailed("refused".to_string()));
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(
        &mut self,
        msg: SyncMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            if !self.can_send {
                return Err(TransportError::SendUnsupported);
            }
            self.net.sent.lock().unwrap().push(msg);
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<SyncMessage>>> + Send + '_>> {
        // Pends while idle, like a live connection.
        Box::pin(async move {
            loop {
                if !self.connected {
                    return Err(TransportError::ConnectionClosed);
                }
                if let Some(msg) = self.net.inbound.lock().unwrap().pop_front() {
                    return Ok(Some(msg));
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn can_send(&self) -> bool {
        self.can_send
    }
}

/// Factory producing mock transports with shared wires.
pub(crate) struct MockFactory {
    pub net: MockNet,
    pub socket: Option<bool>,
    pub stream: Option<bool>,
}

impl MockFactory {
    /// `socket`/`stream`: `None` = unavailable, `Some(fail)` =
    /// available, optionally refusing every connect.
    pub fn new(net: MockNet, socket: Option<bool>, stream: Option<bool>) -> Box<Self> {
        Box::new(MockFactory {
            net,
            socket,
            stream,
        })
    }
}

impl TransportFactory for MockFactory {
    fn socket(&mut self) -> Option<Box<dyn Transport>> {
        self.socket
            .map(|fail| Box::new(MockTransport::socket(self.net.clone(), fail)) as Box<dyn Transport>)
    }

    fn stream(&mut self) -> Option<Box<dyn Transport>> {
        self.stream
            .map(|fail| Box::new(MockTransport::stream(self.net.clone(), fail)) as Box<dyn Transport>)
    }
}

fn ping() -> SyncMessage {
    SyncMessage::ping(chrono::Utc::now(), "client")
}

#[test]
fn kind_strings() {
    assert_eq!(TransportKind::Socket.to_string(), "socket");
    assert_eq!(TransportKind::Stream.to_string(), "stream");
    assert_eq!(TransportKind::None.as_str(), "none");
}

#[tokio::test]
async fn mock_transport_round_trip() {
    let net = MockNet::default();
    let mut transport = MockTransport::socket(net.clone(), false);
    assert!(!transport.is_connected());

    transport.connect("mock://").await.unwrap();
    assert!(transport.is_connected());

    transport.send(ping()).await.unwrap();
    assert_eq!(net.sent.lock().unwrap().len(), 1);

    net.push_inbound(ping());
    let received = transport.recv().await.unwrap();
    assert!(received.is_some());

    transport.disconnect().await.unwrap();
    assert!(transport.send(ping()).await.is_err());
}

#[tokio::test]
async fn failing_mock_counts_attempts() {
    let net = MockNet::default();
    let mut transport = MockTransport::socket(net.clone(), true);
    assert!(transport.connect("mock://").await.is_err());
    assert!(transport.connect("mock://").await.is_err());
    assert_eq!(net.socket_attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn websocket_transport_starts_disconnected() {
    let transport = WebSocketTransport::new(std::time::Duration::from_millis(50));
    assert!(!transport.is_connected());
    assert_eq!(transport.kind(), TransportKind::Socket);
    assert!(transport.can_send());
}
