// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-api
//!
//! Read-only HTTP adapter for the uabridge query facade.
//!
//! # Endpoints
//!
//! | Method | Path                | Description                          |
//! |--------|---------------------|--------------------------------------|
//! | GET    | `/api/values`       | All points in configuration order    |
//! | GET    | `/api/value/{name}` | One point; 404 for unknown names     |
//! | GET    | `/api/status`       | Connection state and counters        |
//! | GET    | `/health`           | Liveness                             |
//! | GET    | `/ready`            | 200 while the session is Active      |
//!
//! Handlers only read the cache; none of them waits on the upstream server.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::ApiServer;
pub use state::AppState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
