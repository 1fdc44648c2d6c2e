// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read-only query surface.
//!
//! [`QueryFacade`] joins the registry with the value store and the published
//! session state. Every call completes immediately; nothing here waits on
//! the session task or the network.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::{ConnectionState, StatusHandle};
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{NodeRegistry, SubscriptionDescriptor};
use crate::store::{Quality, Sample, Value, ValueStore};

/// One point as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointReading {
    /// Display name.
    pub display_name: String,
    /// Remote node id.
    pub remote_node_id: String,
    /// Display unit.
    pub unit: Option<String>,
    /// Last known value; `None` if never observed.
    pub value: Option<Value>,
    /// Quality; Unknown if never observed.
    pub quality: Quality,
    /// Timestamp of the last notification; `None` if never observed.
    pub observed_at: Option<DateTime<Utc>>,
}

impl PointReading {
    fn new(descriptor: &SubscriptionDescriptor, sample: Option<Sample>) -> Self {
        let (value, quality, observed_at) = match sample {
            Some(sample) => (sample.value, sample.quality, Some(sample.observed_at)),
            None => (None, Quality::Unknown, None),
        };
        Self {
            display_name: descriptor.display_name.clone(),
            remote_node_id: descriptor.remote_node_id.clone(),
            unit: descriptor.unit.clone(),
            value,
            quality,
            observed_at,
        }
    }

    /// Returns a copy with float values rounded to `decimals`.
    pub fn rounded(mut self, decimals: u32) -> Self {
        self.value = self.value.map(|v| v.rounded(decimals));
        self
    }
}

/// Connection and cache health.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStatus {
    /// Current connection state.
    pub connection_state: ConnectionState,
    /// `true` while Active.
    pub connected: bool,
    /// When the state last changed.
    pub last_state_change_at: DateTime<Utc>,
    /// Configured points.
    pub monitored_count: usize,
    /// Monitored items currently created on the server.
    pub active_subscription_count: usize,
    /// Points observed at least once.
    pub values_count: usize,
    /// Notifications evicted from the queue on overflow.
    pub dropped_notifications: u64,
    /// Notifications for nodes outside the registry.
    pub unresolved_notifications: u64,
    /// Notifications older than the stored sample.
    pub discarded_notifications: u64,
    /// Notifications processed.
    pub notifications_received: u64,
    /// Failures since the last Active state.
    pub consecutive_failures: u32,
    /// Times the session entered Reconnecting.
    pub reconnect_count: u64,
    /// Backoff delay currently being waited out, in milliseconds.
    pub current_backoff_ms: Option<u64>,
    /// Most recent upstream failure.
    pub last_error: Option<String>,
    /// Server endpoint URL.
    pub endpoint: String,
}

/// Cloneable handle answering client queries.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    registry: Arc<NodeRegistry>,
    store: Arc<ValueStore>,
    status: StatusHandle,
}

impl QueryFacade {
    /// Creates a facade over the given parts.
    pub fn new(registry: Arc<NodeRegistry>, store: Arc<ValueStore>, status: StatusHandle) -> Self {
        Self {
            registry,
            store,
            status,
        }
    }

    /// Every configured point in configuration order.
    pub fn get_all(&self) -> Vec<PointReading> {
        let snapshot = self.store.snapshot();
        self.registry
            .all()
            .iter()
            .map(|descriptor| {
                PointReading::new(descriptor, snapshot.get(&descriptor.display_name).cloned())
            })
            .collect()
    }

    /// One point by display name.
    ///
    /// Fails with `NotFound` only when the name is not configured; a
    /// configured point without data is reported as Unknown.
    pub fn get_by_name(&self, display_name: &str) -> BridgeResult<PointReading> {
        let descriptor = self
            .registry
            .lookup(display_name)
            .ok_or_else(|| BridgeError::not_found(display_name))?;
        Ok(PointReading::new(descriptor, self.store.get(display_name)))
    }

    /// Connection and cache health.
    pub fn get_status(&self) -> BridgeStatus {
        let snapshot = self.status.snapshot();
        let counters = self.status.counters();

        BridgeStatus {
            connection_state: snapshot.state,
            connected: snapshot.state.is_active(),
            last_state_change_at: snapshot.last_state_change_at,
            monitored_count: self.registry.len(),
            active_subscription_count: snapshot.active_subscription_count,
            values_count: self.store.len(),
            dropped_notifications: self.status.dropped_notifications(),
            unresolved_notifications: counters.unresolved(),
            discarded_notifications: counters.discarded(),
            notifications_received: counters.received(),
            consecutive_failures: snapshot.consecutive_failures,
            reconnect_count: snapshot.reconnect_count,
            current_backoff_ms: snapshot.current_backoff.map(|d| d.as_millis() as u64),
            last_error: snapshot.last_error,
            endpoint: self.status.endpoint().to_string(),
        }
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.status.state()
    }

    /// The session status handle behind this facade.
    pub fn status_handle(&self) -> &StatusHandle {
        &self.status
    }

    /// The registry behind this facade.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NotificationQueue, SessionCounters, StateSnapshot};
    use chrono::TimeZone;
    use tokio::sync::watch;

    fn facade() -> (QueryFacade, Arc<ValueStore>, watch::Sender<StateSnapshot>) {
        let registry = NodeRegistry::build(vec![
            SubscriptionDescriptor::new("FlowTransmitter", "ns=2;s=D1.Tag1").with_unit("l/min"),
            SubscriptionDescriptor::new("Valve", "ns=2;s=D1.Tag2"),
        ])
        .unwrap();
        let store = Arc::new(ValueStore::new());
        let (tx, rx) = watch::channel(StateSnapshot::default());
        let status = StatusHandle::new(
            rx,
            Arc::new(SessionCounters::default()),
            Arc::new(NotificationQueue::new(8)),
            "opc.tcp://plc:4840",
        );
        (QueryFacade::new(Arc::new(registry), store.clone(), status), store, tx)
    }

    #[tokio::test]
    async fn test_get_all_reports_unobserved_as_unknown() {
        let (facade, store, _tx) = facade();
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        store.update("FlowTransmitter", Some(Value::Float(12.4)), Quality::Good, t0);

        let all = facade.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].display_name, "FlowTransmitter");
        assert_eq!(all[0].value, Some(Value::Float(12.4)));
        assert_eq!(all[0].unit.as_deref(), Some("l/min"));
        assert_eq!(all[1].quality, Quality::Unknown);
        assert!(all[1].value.is_none());
        assert!(all[1].observed_at.is_none());
    }

    #[tokio::test]
    async fn test_get_by_name() {
        let (facade, _store, _tx) = facade();
        assert_eq!(facade.get_by_name("Valve").unwrap().quality, Quality::Unknown);
        assert!(facade.get_by_name("Nope").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_status() {
        let (facade, _store, tx) = facade();
        tx.send_modify(|s| {
            s.state = ConnectionState::Active;
            s.active_subscription_count = 2;
        });

        let status = facade.get_status();
        assert!(status.connected);
        assert_eq!(status.monitored_count, 2);
        assert_eq!(status.active_subscription_count, 2);
        assert_eq!(status.values_count, 0);
        assert_eq!(status.endpoint, "opc.tcp://plc:4840");
    }

    #[test]
    fn test_reading_rounded() {
        let descriptor = SubscriptionDescriptor::new("A", "ns=2;i=1");
        let reading = PointReading {
            value: Some(Value::Float(1.23456)),
            ..PointReading::new(&descriptor, None)
        };
        assert_eq!(reading.rounded(2).value, Some(Value::Float(1.23)));
    }
}
