// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded notification queue between the transport and the session task.
//!
//! Producers (transport callbacks, possibly on a foreign thread) never
//! block: when the queue is full the oldest entry is evicted and counted.
//! The single consumer is the session task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::transport::Notification;

/// Drop-oldest FIFO of notifications.
#[derive(Debug)]
pub struct NotificationQueue {
    entries: Mutex<VecDeque<Notification>>,
    capacity: usize,
    ready: Notify,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl NotificationQueue {
    /// Creates a queue holding at most `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            ready: Notify::new(),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues a notification, evicting the oldest one when full.
    ///
    /// Returns `true` if an entry was evicted.
    pub fn push(&self, notification: Notification) -> bool {
        let evicted = {
            let mut entries = self.entries.lock();
            let evicted = if entries.len() >= self.capacity {
                entries.pop_front().is_some()
            } else {
                false
            };
            entries.push_back(notification);
            evicted
        };

        self.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total.is_power_of_two() {
                tracing::warn!(dropped = total, capacity = self.capacity, "Notification queue overflow");
            }
        }
        self.ready.notify_one();
        evicted
    }

    /// Removes the oldest notification without waiting.
    pub fn try_pop(&self) -> Option<Notification> {
        self.entries.lock().pop_front()
    }

    /// Waits for the next notification.
    pub async fn recv(&self) -> Notification {
        loop {
            if let Some(notification) = self.try_pop() {
                return notification;
            }
            self.ready.notified().await;
        }
    }

    /// Discards every queued notification and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Current number of queued notifications.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of queued notifications.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total notifications accepted.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Total notifications evicted on overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;
    use std::sync::Arc;
    use std::time::Duration;

    fn notification(node: &str) -> Notification {
        Notification::good(node, Value::Float(1.0))
    }

    #[test]
    fn test_drop_oldest() {
        let queue = NotificationQueue::new(2);
        assert!(!queue.push(notification("a")));
        assert!(!queue.push(notification("b")));
        assert!(queue.push(notification("c")));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pushed(), 3);
        assert_eq!(queue.try_pop().unwrap().remote_node_id, "b");
        assert_eq!(queue.try_pop().unwrap().remote_node_id, "c");
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_clear() {
        let queue = NotificationQueue::new(8);
        queue.push(notification("a"));
        queue.push(notification("b"));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let queue = Arc::new(NotificationQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(notification("late"));

        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.remote_node_id, "late");
    }
}
