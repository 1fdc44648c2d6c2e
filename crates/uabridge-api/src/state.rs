// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uabridge_config::HttpConfig;
use uabridge_opcua::QueryFacade;

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
///
/// Passed to handlers via Axum's state extraction. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Query surface of the running bridge.
    pub facade: QueryFacade,
    /// HTTP configuration.
    pub config: Arc<HttpConfig>,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl AppState {
    /// Creates the state for a bridge that has just started.
    pub fn new(facade: QueryFacade, config: HttpConfig) -> Self {
        Self {
            facade,
            config: Arc::new(config),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Time since the state was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
