// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Upstream transport abstraction.
//!
//! The session task drives an [`UpstreamTransport`] through connect,
//! handshake, subscribe and teardown. Asynchronous data changes flow the
//! other way: the transport pushes them into the [`NotificationSink`] it
//! was handed on `connect`, and reports connection loss through the same
//! sink. This keeps the transport testable with a scripted fake and lets
//! the production implementation wrap a callback-based client library.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::queue::NotificationQueue;
use crate::error::{ConnectError, HandshakeError, SubscribeError};
use crate::store::{Quality, Value};
use crate::types::SecurityProfile;

// =============================================================================
// Notification
// =============================================================================

/// A data change reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Remote node the change belongs to.
    pub remote_node_id: String,

    /// New payload; absent when the server sent no value (e.g. bad status).
    pub value: Option<Value>,

    /// OPC UA status code of the data value.
    pub status_code: u32,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl Notification {
    /// Creates a notification with the given status code and no timestamps.
    pub fn new(remote_node_id: impl Into<String>, value: Option<Value>, status_code: u32) -> Self {
        Self {
            remote_node_id: remote_node_id.into(),
            value,
            status_code,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Creates a good notification.
    pub fn good(remote_node_id: impl Into<String>, value: Value) -> Self {
        Self::new(remote_node_id, Some(value), 0)
    }

    /// Sets the source timestamp.
    pub fn with_source_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.server_timestamp = Some(timestamp);
        self
    }

    /// Quality derived from the status code.
    #[inline]
    pub fn quality(&self) -> Quality {
        Quality::from_status_code(self.status_code)
    }

    /// Source timestamp, else server timestamp.
    #[inline]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.source_timestamp.or(self.server_timestamp)
    }
}

// =============================================================================
// MonitoredItemRequest
// =============================================================================

/// Parameters for one monitored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredItemRequest {
    /// Node to monitor.
    pub remote_node_id: String,

    /// Handle echoed back by the server in notifications.
    pub client_handle: u32,

    /// Requested sampling interval.
    pub sampling_interval: Duration,

    /// Server-side queue size.
    pub queue_size: u32,
}

// =============================================================================
// NotificationSink
// =============================================================================

/// Where a transport delivers data changes and connection-loss signals.
///
/// Cloneable and callable from any thread; delivery never blocks.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    queue: Arc<NotificationQueue>,
    lost: mpsc::Sender<String>,
}

impl NotificationSink {
    /// Creates a sink.
    pub fn new(queue: Arc<NotificationQueue>, lost: mpsc::Sender<String>) -> Self {
        Self { queue, lost }
    }

    /// Delivers a data change. Returns `true` if an older one was evicted.
    pub fn deliver(&self, notification: Notification) -> bool {
        self.queue.push(notification)
    }

    /// Reports that the connection is gone.
    ///
    /// Only the first report per connection is kept.
    pub fn connection_lost(&self, reason: impl Into<String>) {
        let _ = self.lost.try_send(reason.into());
    }

    /// Returns `true` if the session no longer listens on this sink.
    pub fn is_closed(&self) -> bool {
        self.lost.is_closed()
    }
}

// =============================================================================
// UpstreamTransport
// =============================================================================

/// Operations the session task needs from an OPC UA client.
///
/// Implementations are owned exclusively by the session task, so every
/// method takes `&mut self`. Every method may be cancelled at an await
/// point when shutdown is requested.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Opens the transport and secure channel.
    ///
    /// Notifications and connection loss must be reported through `sink`
    /// from now on.
    async fn connect(&mut self, sink: NotificationSink) -> Result<(), ConnectError>;

    /// Negotiates the security profile and activates the session.
    async fn activate_session(&mut self, profile: &SecurityProfile) -> Result<(), HandshakeError>;

    /// Creates the subscription and returns its id.
    async fn create_subscription(&mut self, publishing_interval: Duration) -> Result<u32, SubscribeError>;

    /// Creates one monitored item and returns its id.
    async fn create_monitored_item(
        &mut self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> Result<u32, SubscribeError>;

    /// Deletes monitored items.
    async fn delete_monitored_items(
        &mut self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<(), SubscribeError>;

    /// Deletes a subscription.
    async fn delete_subscription(&mut self, subscription_id: u32) -> Result<(), SubscribeError>;

    /// Reads the current values of the given nodes.
    ///
    /// Transports that cannot read return nothing and the store is filled
    /// by the first data change instead.
    async fn read_values(&mut self, _remote_node_ids: &[String]) -> Result<Vec<Notification>, SubscribeError> {
        Ok(Vec::new())
    }

    /// Closes the session and transport. Never fails.
    async fn disconnect(&mut self);

    /// Name used in logs.
    fn display_name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_notification_timestamp_precedence() {
        let source = Utc.timestamp_opt(100, 0).unwrap();
        let server = Utc.timestamp_opt(200, 0).unwrap();

        let n = Notification::good("ns=2;i=1", Value::Integer(1));
        assert_eq!(n.timestamp(), None);

        let n = n.with_server_timestamp(server);
        assert_eq!(n.timestamp(), Some(server));

        let n = n.with_source_timestamp(source);
        assert_eq!(n.timestamp(), Some(source));
    }

    #[test]
    fn test_notification_quality() {
        assert_eq!(Notification::good("a", Value::Boolean(true)).quality(), Quality::Good);
        assert_eq!(Notification::new("a", None, 0x8000_0000).quality(), Quality::Bad);
    }

    #[tokio::test]
    async fn test_sink_connection_lost_keeps_first() {
        let queue = Arc::new(NotificationQueue::new(4));
        let (tx, mut rx) = mpsc::channel(1);
        let sink = NotificationSink::new(queue.clone(), tx);

        sink.connection_lost("socket closed");
        sink.connection_lost("second");
        sink.deliver(Notification::good("a", Value::Integer(1)));

        assert_eq!(rx.recv().await.as_deref(), Some("socket closed"));
        assert!(rx.try_recv().is_err());
        assert_eq!(queue.len(), 1);

        drop(rx);
        assert!(sink.is_closed());
    }
}
