// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers for all endpoints.
//!
//! - [`values`]: cached point values
//! - [`status`]: connection and cache status
//! - [`health`]: liveness and readiness

mod health;
mod status;
mod values;

pub use health::*;
pub use status::*;
pub use values::*;
