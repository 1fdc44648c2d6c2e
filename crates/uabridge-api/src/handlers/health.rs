// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health check handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::response::{HealthResponse, ReadinessResponse};
use crate::state::AppState;

/// GET /health
///
/// Simple liveness check. Returns 200 OK if the service is running.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

/// GET /ready
///
/// 200 while the session is Active, 503 otherwise. Cached values stay
/// readable either way.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let connection_state = state.facade.connection_state();
    let response = ReadinessResponse {
        ready: connection_state.is_active(),
        connection_state,
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
