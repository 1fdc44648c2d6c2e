// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Status handler.

use axum::{extract::State, Json};
use chrono::Utc;

use crate::response::StatusResponse;
use crate::state::AppState;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        bridge: state.facade.get_status(),
        server_time: Utc::now(),
        uptime_seconds: state.uptime().as_secs(),
    })
}
