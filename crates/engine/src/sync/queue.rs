// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Bounded priority queue for outbound messages.
//!
//! Messages accumulate here while the connection is down or send-only
//! traffic is impossible, then drain in priority order on reconnect.
//! When full, the oldest low-priority entry is evicted first; if none
//! exists, the oldest entry overall goes.

use tether_core::{Priority, SyncMessage};

/// A queued message with its arrival order.
#[derive(Debug, Clone)]
struct QueueEntry {
    seq: u64,
    msg: SyncMessage,
}

/// Bounded in-memory queue ordered by priority, then arrival.
#[derive(Debug)]
pub struct MessageQueue {
    entries: Vec<QueueEntry>,
    capacity: usize,
    next_seq: u64,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        MessageQueue {
            entries: Vec::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueue a message, evicting if at capacity.
    ///
    /// Returns the evicted message, if any.
    pub fn push(&mut self, msg: SyncMessage) -> Option<SyncMessage> {
        let evicted = if self.entries.len() >= self.capacity {
            Some(self.evict())
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(QueueEntry { seq, msg });
        evicted
    }

    /// Drain all messages in send order: highest priority first,
    /// oldest first within a priority.
    pub fn drain_ordered(&mut self) -> Vec<SyncMessage> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by_key(|e| (std::cmp::Reverse(e.msg.priority), e.seq));
        entries.into_iter().map(|e| e.msg).collect()
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict(&mut self) -> SyncMessage {
        let victim = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.msg.priority == Priority::Low)
            .min_by_key(|(_, e)| e.seq)
            .map(|(i, _)| i)
            .or_else(|| {
                self.entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.seq)
                    .map(|(i, _)| i)
            });

        // Capacity is at least 1, so the queue is non-empty here.
        match victim {
            Some(i) => self.entries.remove(i).msg,
            None => unreachable!("evict called on empty queue"),
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
