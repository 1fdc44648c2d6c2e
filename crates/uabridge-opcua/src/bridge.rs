// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge lifecycle: start, stop and the staleness sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::{ConnectionState, SessionManager, StateSnapshot, UpstreamTransport};
use crate::error::{BridgeError, BridgeResult};
use crate::facade::QueryFacade;
use crate::registry::NodeRegistry;
use crate::store::ValueStore;
use crate::types::BridgeConfig;

/// A running bridge: one session task, one sweep task and the query surface.
///
/// # Examples
///
/// ```rust,ignore
/// let mut bridge = Bridge::start(config, OpcUaTransport::new(config.session.clone())).await?;
/// let facade = bridge.facade();
/// println!("{:?}", facade.get_all());
/// bridge.stop().await?;
/// ```
#[derive(Debug)]
pub struct Bridge {
    facade: QueryFacade,
    shutdown_tx: watch::Sender<bool>,
    session_task: Option<JoinHandle<()>>,
    sweep_task: Option<JoinHandle<()>>,
    stop_timeout: Duration,
    stopped: bool,
}

impl Bridge {
    /// Validates the configuration, builds the registry and spawns the
    /// session and sweep tasks.
    ///
    /// Returns once the first connection attempt has been started; it does
    /// not wait for the connection to succeed.
    ///
    /// # Errors
    ///
    /// `BridgeError::Config` for an invalid registry or session settings.
    pub async fn start<T>(config: BridgeConfig, transport: T) -> BridgeResult<Self>
    where
        T: UpstreamTransport + 'static,
    {
        let BridgeConfig { session, points } = config;
        session.validate()?;
        let registry = Arc::new(NodeRegistry::build(points)?);
        let store = Arc::new(ValueStore::new());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stale_after = session.stale_after;
        let sweep_interval = session.sweep_interval;
        let stop_timeout = session.stop_timeout;
        let endpoint = session.endpoint.clone();

        let manager = SessionManager::new(
            session,
            registry.clone(),
            store.clone(),
            transport,
            shutdown_rx.clone(),
        );
        let status = manager.status_handle();
        let mut state_rx = status.subscribe();

        let session_task = tokio::spawn(manager.run());
        let sweep_task = tokio::spawn(sweep(
            store.clone(),
            stale_after,
            sweep_interval,
            shutdown_rx,
        ));

        // A closed channel means the session task is already gone.
        let _ = state_rx
            .wait_for(|s| s.connect_attempts > 0 || s.state.is_terminal())
            .await;

        info!(
            endpoint = %endpoint,
            points = registry.len(),
            "Bridge started"
        );

        Ok(Self {
            facade: QueryFacade::new(registry, store, status),
            shutdown_tx,
            session_task: Some(session_task),
            sweep_task: Some(sweep_task),
            stop_timeout,
            stopped: false,
        })
    }

    /// Returns a cloneable query handle.
    pub fn facade(&self) -> QueryFacade {
        self.facade.clone()
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Waits until the session reaches `target`.
    ///
    /// # Errors
    ///
    /// - `AlreadyStopped` if the bridge is or becomes stopped first
    /// - `Timeout` if `limit` elapses
    pub async fn wait_for_state(&self, target: ConnectionState, limit: Duration) -> BridgeResult<()> {
        if self.stopped {
            return Err(BridgeError::AlreadyStopped);
        }
        let mut state_rx = self.state_changes();
        let reached = timeout(
            limit,
            state_rx.wait_for(|s| s.state == target || s.state.is_terminal()),
        )
        .await
        .map_err(|_| BridgeError::timeout(format!("waiting for {}", target), limit))?;

        match reached {
            Ok(snapshot) if snapshot.state == target => Ok(()),
            _ => Err(BridgeError::AlreadyStopped),
        }
    }

    /// Returns a receiver observing every published session state.
    pub fn state_changes(&self) -> watch::Receiver<StateSnapshot> {
        self.facade.status_handle().subscribe()
    }

    /// Drives the session to ShuttingDown and waits for a clean teardown.
    ///
    /// Calling `stop` again is a no-op.
    ///
    /// # Errors
    ///
    /// `Timeout` if teardown exceeds `stop_timeout`; the tasks are aborted.
    pub async fn stop(&mut self) -> BridgeResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.shutdown_tx.send_replace(true);
        info!("Stopping bridge");

        let tasks: Vec<JoinHandle<()>> = self
            .session_task
            .take()
            .into_iter()
            .chain(self.sweep_task.take())
            .collect();
        let aborts: Vec<_> = tasks.iter().map(|task| task.abort_handle()).collect();

        let joined = timeout(self.stop_timeout, async move {
            for task in tasks {
                if let Err(join_error) = task.await {
                    if join_error.is_panic() {
                        error!(error = %join_error, "Bridge task panicked");
                    }
                }
            }
        })
        .await;

        match joined {
            Ok(()) => {
                info!("Bridge stopped");
                Ok(())
            }
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                warn!(timeout = ?self.stop_timeout, "Bridge did not stop in time, tasks aborted");
                Err(BridgeError::timeout("bridge stop", self.stop_timeout))
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if !self.stopped {
            self.shutdown_tx.send_replace(true);
        }
    }
}

/// Periodically downgrades samples that were not refreshed in time.
async fn sweep(
    store: Arc<ValueStore>,
    stale_after: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.wait_for(|stop| *stop) => break,

            _ = ticker.tick() => {
                let marked = store.mark_stale_if_older_than(stale_after, Instant::now());
                if marked > 0 {
                    debug!(marked, ?stale_after, "Marked samples stale");
                }
            }
        }
    }
}
