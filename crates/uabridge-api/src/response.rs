// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API response types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uabridge_opcua::{BridgeStatus, ConnectionState};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Version string.
    pub version: String,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Whether the bridge is receiving data changes.
    pub ready: bool,
    /// Current connection state.
    pub connection_state: ConnectionState,
}

/// Status response: bridge health plus server clock.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Bridge status.
    #[serde(flatten)]
    pub bridge: BridgeStatus,
    /// Current server time.
    pub server_time: DateTime<Utc>,
    /// Seconds since the HTTP adapter started.
    pub uptime_seconds: u64,
}
