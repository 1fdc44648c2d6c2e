// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session task: the connection state machine.
//!
//! ```text
//!  Disconnected ──► Connecting ──► SecurityHandshake ──► Subscribing ──► Active
//!       ▲              │                  │                   │             │
//!       └── backoff ◄──┴──────────────────┘                   ▼             ▼
//!                      ▲                                 Reconnecting ◄─────┘
//!                      └────────────── backoff ──────────────┘
//!
//!  any state ── shutdown ──► ShuttingDown (terminal)
//! ```
//!
//! The [`SessionManager`] owns the transport and is the only writer of
//! sample values. Its state is published through a `watch` channel so that
//! readers never wait on the session task.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::queue::NotificationQueue;
use super::transport::{MonitoredItemRequest, Notification, NotificationSink, UpstreamTransport};
use crate::error::{BridgeError, ConnectError, HandshakeError, SubscribeError};
use crate::registry::NodeRegistry;
use crate::store::{UpdateOutcome, ValueStore};
use crate::types::SessionConfig;

// =============================================================================
// ConnectionState
// =============================================================================

/// State of the upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected; initial state and backoff after a failed attempt.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Negotiating security and activating the session.
    SecurityHandshake,
    /// Creating the subscription and monitored items.
    Subscribing,
    /// Receiving data changes.
    Active,
    /// Tearing down after a failure and waiting to reconnect.
    Reconnecting,
    /// Closing for good.
    ShuttingDown,
}

impl ConnectionState {
    /// Returns `true` if data changes are flowing.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` while a connection attempt is in progress.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::SecurityHandshake | Self::Subscribing)
    }

    /// Returns `true` once shutdown has started.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }

    /// Returns the display name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::SecurityHandshake => "SecurityHandshake",
            Self::Subscribing => "Subscribing",
            Self::Active => "Active",
            Self::Reconnecting => "Reconnecting",
            Self::ShuttingDown => "ShuttingDown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// StateSnapshot
// =============================================================================

/// Everything the session task publishes about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Current state.
    pub state: ConnectionState,
    /// When `state` last changed.
    pub last_state_change_at: DateTime<Utc>,
    /// Monitored items currently created on the server.
    pub active_subscription_count: usize,
    /// Failures since the last time the session reached Active.
    pub consecutive_failures: u32,
    /// Number of times the session entered Reconnecting.
    pub reconnect_count: u64,
    /// Number of connect attempts started.
    pub connect_attempts: u64,
    /// Backoff delay currently being waited out.
    pub current_backoff: Option<Duration>,
    /// Most recent upstream failure.
    pub last_error: Option<String>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_state_change_at: Utc::now(),
            active_subscription_count: 0,
            consecutive_failures: 0,
            reconnect_count: 0,
            connect_attempts: 0,
            current_backoff: None,
            last_error: None,
        }
    }
}

// =============================================================================
// SessionCounters
// =============================================================================

/// Notification counters maintained by the session task.
#[derive(Debug, Default)]
pub struct SessionCounters {
    received: AtomicU64,
    applied: AtomicU64,
    unresolved: AtomicU64,
    discarded: AtomicU64,
}

impl SessionCounters {
    /// Notifications taken off the queue.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Store updates that were accepted.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Notifications for nodes outside the registry.
    pub fn unresolved(&self) -> u64 {
        self.unresolved.load(Ordering::Relaxed)
    }

    /// Store updates rejected as older than the stored sample.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

// =============================================================================
// StatusHandle
// =============================================================================

/// Read-only view of a running session.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    state: watch::Receiver<StateSnapshot>,
    counters: Arc<SessionCounters>,
    queue: Arc<NotificationQueue>,
    endpoint: Arc<str>,
}

impl StatusHandle {
    /// Creates a status handle.
    pub fn new(
        state: watch::Receiver<StateSnapshot>,
        counters: Arc<SessionCounters>,
        queue: Arc<NotificationQueue>,
        endpoint: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            state,
            counters,
            queue,
            endpoint: endpoint.into(),
        }
    }

    /// Returns a copy of the latest published state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state.borrow().clone()
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().state
    }

    /// Returns a receiver that observes every state publication.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.state.clone()
    }

    /// Notification counters.
    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Notifications evicted from the queue on overflow.
    pub fn dropped_notifications(&self) -> u64 {
        self.queue.dropped()
    }

    /// Server endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Why a phase of the state machine ended early.
#[derive(Debug)]
enum Interrupt {
    Shutdown,
    Failed(BridgeError),
}

macro_rules! interrupt_from {
    ($($error:ty),*) => {
        $(
            impl From<$error> for Interrupt {
                fn from(error: $error) -> Self {
                    Interrupt::Failed(error.into())
                }
            }
        )*
    };
}

interrupt_from!(BridgeError, ConnectError, HandshakeError, SubscribeError);

type Phase = Result<(), Interrupt>;

#[derive(Debug)]
struct ActiveSubscription {
    id: u32,
    items: Vec<u32>,
}

/// Owns the upstream transport and drives the connection state machine.
pub struct SessionManager<T> {
    config: SessionConfig,
    registry: Arc<NodeRegistry>,
    store: Arc<ValueStore>,
    transport: T,
    queue: Arc<NotificationQueue>,
    counters: Arc<SessionCounters>,
    state_tx: watch::Sender<StateSnapshot>,
    shutdown: watch::Receiver<bool>,
    backoff: Backoff,
    subscription: Option<ActiveSubscription>,
    lost_rx: Option<mpsc::Receiver<String>>,
    transport_open: bool,
}

impl<T: UpstreamTransport> SessionManager<T> {
    /// Creates a session manager in the Disconnected state.
    ///
    /// The task stops when `shutdown` becomes `true` or its sender is dropped.
    pub fn new(
        config: SessionConfig,
        registry: Arc<NodeRegistry>,
        store: Arc<ValueStore>,
        transport: T,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let queue = Arc::new(NotificationQueue::new(config.notification_queue_capacity));
        let backoff = Backoff::new(config.backoff.clone());
        let (state_tx, _) = watch::channel(StateSnapshot::default());

        Self {
            config,
            registry,
            store,
            transport,
            queue,
            counters: Arc::new(SessionCounters::default()),
            state_tx,
            shutdown,
            backoff,
            subscription: None,
            lost_rx: None,
            transport_open: false,
        }
    }

    /// Returns a read-only view of this session.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(
            self.state_tx.subscribe(),
            self.counters.clone(),
            self.queue.clone(),
            self.config.endpoint.as_str(),
        )
    }

    /// Runs the state machine until shutdown.
    pub async fn run(mut self) {
        info!(
            endpoint = %self.config.endpoint,
            transport = %self.transport.display_name(),
            points = self.registry.len(),
            "Session task started"
        );

        loop {
            self.transition(ConnectionState::Connecting);
            match self.open().await {
                Ok(()) => {}
                Err(Interrupt::Shutdown) => break,
                Err(Interrupt::Failed(error)) => {
                    self.record_failure(&error);
                    self.teardown().await;
                    self.transition(ConnectionState::Disconnected);
                    if !self.wait_backoff().await {
                        break;
                    }
                    continue;
                }
            }

            self.transition(ConnectionState::Subscribing);
            let outcome = match self.subscribe().await {
                Ok(()) => {
                    self.on_active();
                    self.run_active().await
                }
                failed => failed,
            };

            match outcome {
                Ok(()) | Err(Interrupt::Shutdown) => break,
                Err(Interrupt::Failed(error)) => {
                    self.record_failure(&error);
                    self.transition(ConnectionState::Reconnecting);
                    self.state_tx.send_modify(|s| s.reconnect_count += 1);
                    self.teardown().await;
                    if !self.wait_backoff().await {
                        break;
                    }
                }
            }
        }

        self.transition(ConnectionState::ShuttingDown);
        self.teardown().await;
        info!(endpoint = %self.config.endpoint, "Session task stopped");
    }

    // =========================================================================
    // Phases
    // =========================================================================

    /// Connecting and SecurityHandshake.
    async fn open(&mut self) -> Phase {
        let (lost_tx, lost_rx) = mpsc::channel(1);
        self.lost_rx = Some(lost_rx);
        let sink = NotificationSink::new(self.queue.clone(), lost_tx);

        self.transport_open = true;
        self.state_tx.send_modify(|s| s.connect_attempts += 1);

        let connect_timeout = self.config.connect_timeout;
        match cancellable(&mut self.shutdown, timeout(connect_timeout, self.transport.connect(sink))).await {
            None => return Err(Interrupt::Shutdown),
            Some(Err(_)) => {
                return Err(ConnectError::timed_out(&self.config.endpoint, connect_timeout).into())
            }
            Some(Ok(result)) => result?,
        }
        debug!(endpoint = %self.config.endpoint, "Transport opened");

        self.transition(ConnectionState::SecurityHandshake);
        let profile = self.config.security_profile();
        let request_timeout = self.config.request_timeout;
        match cancellable(
            &mut self.shutdown,
            timeout(request_timeout, self.transport.activate_session(&profile)),
        )
        .await
        {
            None => Err(Interrupt::Shutdown),
            Some(Err(_)) => Err(HandshakeError::TimedOut {
                duration: request_timeout,
            }
            .into()),
            Some(Ok(result)) => {
                result?;
                debug!(
                    policy = %profile.policy,
                    mode = %profile.mode,
                    "Session activated"
                );
                Ok(())
            }
        }
    }

    /// Subscribing: the whole registry, from scratch, in configuration order.
    async fn subscribe(&mut self) -> Phase {
        if self.registry.is_empty() {
            info!("No points configured, skipping subscription");
            return Ok(());
        }

        let request_timeout = self.config.request_timeout;
        let subscription_id = match cancellable(
            &mut self.shutdown,
            timeout(
                request_timeout,
                self.transport.create_subscription(self.config.publishing_interval),
            ),
        )
        .await
        {
            None => return Err(Interrupt::Shutdown),
            Some(Err(_)) => return Err(SubscribeError::TimedOut { duration: request_timeout }.into()),
            Some(Ok(result)) => result?,
        };

        let registry = Arc::clone(&self.registry);
        self.subscription = Some(ActiveSubscription {
            id: subscription_id,
            items: Vec::with_capacity(registry.len()),
        });

        for (index, descriptor) in registry.all().iter().enumerate() {
            let request = MonitoredItemRequest {
                remote_node_id: descriptor.remote_node_id.clone(),
                client_handle: index as u32 + 1,
                sampling_interval: self.config.sampling_interval,
                queue_size: self.config.queue_size,
            };

            let item_id = match cancellable(
                &mut self.shutdown,
                timeout(
                    request_timeout,
                    self.transport.create_monitored_item(subscription_id, &request),
                ),
            )
            .await
            {
                None => return Err(Interrupt::Shutdown),
                Some(Err(_)) => {
                    return Err(SubscribeError::TimedOut { duration: request_timeout }.into())
                }
                Some(Ok(result)) => result?,
            };

            if let Some(subscription) = self.subscription.as_mut() {
                subscription.items.push(item_id);
                let count = subscription.items.len();
                self.state_tx.send_modify(|s| s.active_subscription_count = count);
            }
        }

        info!(
            subscription_id,
            items = registry.len(),
            "Subscribed to all points"
        );
        Ok(())
    }

    /// Active: drain notifications until the connection is lost or shutdown.
    async fn run_active(&mut self) -> Phase {
        if self.config.read_initial_values && !self.registry.is_empty() {
            self.read_initial_values().await?;
        }

        let Some(mut lost_rx) = self.lost_rx.take() else {
            return Err(ConnectError::NotConnected.into());
        };

        loop {
            tokio::select! {
                biased;

                _ = shutdown_requested(&mut self.shutdown) => {
                    return Err(Interrupt::Shutdown);
                }

                reason = lost_rx.recv() => {
                    let reason = reason.unwrap_or_else(|| "notification sink closed".to_string());
                    return Err(ConnectError::lost(reason).into());
                }

                notification = self.queue.recv() => {
                    self.apply_notification(notification);
                }
            }
        }
    }

    async fn read_initial_values(&mut self) -> Phase {
        let mut seen = HashSet::new();
        let node_ids: Vec<String> = self
            .registry
            .all()
            .iter()
            .filter(|d| seen.insert(d.remote_node_id.as_str()))
            .map(|d| d.remote_node_id.clone())
            .collect();

        let request_timeout = self.config.request_timeout;
        match cancellable(
            &mut self.shutdown,
            timeout(request_timeout, self.transport.read_values(&node_ids)),
        )
        .await
        {
            None => return Err(Interrupt::Shutdown),
            Some(Err(_)) => warn!(?request_timeout, "Initial read timed out"),
            Some(Ok(Err(error))) => warn!(error = %error, "Initial read failed"),
            Some(Ok(Ok(values))) => {
                debug!(count = values.len(), "Applying initial values");
                for notification in values {
                    self.apply_notification(notification);
                }
            }
        }
        Ok(())
    }

    /// Writes one data change into the store for every display name it feeds.
    fn apply_notification(&self, notification: Notification) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let observed_at = notification.timestamp().unwrap_or_else(Utc::now);
        let quality = notification.quality();
        let mut resolved = false;

        for descriptor in self.registry.resolve(&notification.remote_node_id) {
            resolved = true;
            match self.store.update(
                &descriptor.display_name,
                notification.value.clone(),
                quality,
                observed_at,
            ) {
                UpdateOutcome::Discarded => {
                    self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        display_name = %descriptor.display_name,
                        %observed_at,
                        "Out-of-order notification discarded"
                    );
                }
                UpdateOutcome::Inserted | UpdateOutcome::Updated => {
                    self.counters.applied.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if !resolved {
            self.counters.unresolved.fetch_add(1, Ordering::Relaxed);
            warn!(
                remote_node_id = %notification.remote_node_id,
                "Notification for unknown node dropped"
            );
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn on_active(&mut self) {
        self.backoff.reset();
        self.state_tx.send_modify(|s| {
            s.consecutive_failures = 0;
            s.current_backoff = None;
        });
        self.transition(ConnectionState::Active);
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state_tx.borrow().state;
        if previous == next {
            return;
        }
        self.state_tx.send_modify(|s| {
            s.state = next;
            s.last_state_change_at = Utc::now();
        });
        info!(old_state = %previous, new_state = %next, "Connection state changed");
    }

    fn record_failure(&self, error: &BridgeError) {
        let message = error.to_string();
        warn!(
            endpoint = %self.config.endpoint,
            category = error.category(),
            error = %message,
            "Upstream failure"
        );
        self.state_tx.send_modify(|s| {
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            s.last_error = Some(message);
        });
    }

    /// Sleeps for the next backoff delay. Returns `false` on shutdown.
    async fn wait_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        self.state_tx.send_modify(|s| s.current_backoff = Some(delay));
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.backoff.attempt(),
            "Waiting before next connection attempt"
        );
        cancellable(&mut self.shutdown, tokio::time::sleep(delay))
            .await
            .is_some()
    }

    /// Deletes monitored items and the subscription, then closes the transport.
    async fn teardown(&mut self) {
        let request_timeout = self.config.request_timeout;

        if let Some(subscription) = self.subscription.take() {
            if !subscription.items.is_empty() {
                match timeout(
                    request_timeout,
                    self.transport
                        .delete_monitored_items(subscription.id, &subscription.items),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => warn!(error = %error, "Failed to delete monitored items"),
                    Err(_) => warn!("Deleting monitored items timed out"),
                }
            }
            match timeout(
                request_timeout,
                self.transport.delete_subscription(subscription.id),
            )
            .await
            {
                Ok(Ok(())) => debug!(subscription_id = subscription.id, "Subscription deleted"),
                Ok(Err(error)) => warn!(error = %error, "Failed to delete subscription"),
                Err(_) => warn!("Deleting subscription timed out"),
            }
            self.state_tx.send_modify(|s| s.active_subscription_count = 0);
        }

        self.lost_rx = None;
        if self.transport_open {
            if timeout(request_timeout, self.transport.disconnect()).await.is_err() {
                warn!("Disconnect timed out");
            }
            self.transport_open = false;
        }
    }
}

impl<T> fmt::Debug for SessionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state_tx.borrow().state)
            .field("points", &self.registry.len())
            .finish()
    }
}

/// Runs `future` unless shutdown is requested first.
async fn cancellable<F: Future>(shutdown: &mut watch::Receiver<bool>, future: F) -> Option<F::Output> {
    if *shutdown.borrow() {
        return None;
    }
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => None,
        output = future => Some(output),
    }
}

/// Resolves once shutdown is requested or the sender is dropped.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
