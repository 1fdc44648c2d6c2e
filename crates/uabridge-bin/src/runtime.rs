// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bridge runtime orchestration.
//!
//! Starts the bridge, serves the HTTP adapter and tears both down on
//! shutdown: the HTTP server stops accepting first, then the bridge
//! closes its session.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use uabridge_api::{ApiServer, AppState};
use uabridge_config::AppConfig;
use uabridge_opcua::{Bridge, UpstreamTransport};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// BridgeRuntime
// =============================================================================

/// Owns the validated configuration and the shutdown coordinator for one
/// process lifetime.
#[derive(Debug)]
pub struct BridgeRuntime {
    config: Arc<AppConfig>,
    shutdown: ShutdownCoordinator,
}

impl BridgeRuntime {
    /// Creates a runtime for an already validated configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// Returns a handle that can stop the runtime.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Runs with the OPC UA transport until shutdown is signaled.
    #[cfg(feature = "real-transport")]
    pub async fn run(self) -> BinResult<()> {
        let transport = uabridge_opcua::OpcUaTransport::new(self.config.opcua.clone());
        self.run_with_transport(transport).await
    }

    /// Runs with the OPC UA transport until shutdown is signaled.
    ///
    /// This build carries no transport, so it always fails.
    #[cfg(not(feature = "real-transport"))]
    pub async fn run(self) -> BinResult<()> {
        Err(BinError::init(
            "this build has no OPC UA transport; rebuild with the `real-transport` feature",
        ))
    }

    /// Runs with the given transport until shutdown is signaled.
    pub async fn run_with_transport<T>(self, transport: T) -> BinResult<()>
    where
        T: UpstreamTransport + 'static,
    {
        info!(
            version = crate::VERSION,
            endpoint = %self.config.opcua.endpoint,
            points = self.config.points.len(),
            "Starting uabridge"
        );

        let mut bridge = Bridge::start(self.config.bridge_config(), transport).await?;

        let server = ApiServer::new(AppState::new(bridge.facade(), self.config.http.clone()));
        let addr = server.addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                if let Err(stop_error) = bridge.stop().await {
                    error!(error = %stop_error, "Failed to stop bridge");
                }
                return Err(BinError::init(format!("Failed to bind {}: {}", addr, e)));
            }
        };

        let mut http_task = tokio::spawn(server.serve(listener, self.shutdown.shutdown_signal()));
        info!(%addr, "uabridge is ready");

        let finished_early = tokio::select! {
            _ = self.shutdown.wait_for_shutdown() => None,
            result = &mut http_task => Some(result),
        };
        self.shutdown.initiate_shutdown();

        let http_result = match finished_early {
            Some(result) => result,
            None => http_task.await,
        };
        let http_result = match http_result {
            Ok(result) => result.map_err(BinError::from),
            Err(e) => Err(BinError::runtime(format!("HTTP server task failed: {}", e))),
        };

        let bridge_result = bridge.stop().await.map_err(BinError::from);

        info!("uabridge shutdown complete");

        http_result.and(bridge_result)
    }
}

// =============================================================================
// Tests
// =============================================================================
