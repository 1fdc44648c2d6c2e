// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use uabridge_opcua::PointReading;

use crate::error::ApiResult;
use crate::state::AppState;

fn present(state: &AppState, reading: PointReading) -> PointReading {
    match state.config.float_decimals {
        Some(decimals) => reading.rounded(decimals),
        None => reading,
    }
}

/// GET /api/values
///
/// Every configured point in configuration order.
pub async fn list_values(State(state): State<AppState>) -> Json<Vec<PointReading>> {
    let readings = state
        .facade
        .get_all()
        .into_iter()
        .map(|reading| present(&state, reading))
        .collect();
    Json(readings)
}

/// GET /api/value/{name}
///
/// One point by display name; 404 if the name is not configured.
pub async fn get_value(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<PointReading>> {
    let reading = state.facade.get_by_name(&name)?;
    Ok(Json(present(&state, reading)))
}
