// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uabridge-bin
//!
//! CLI binary for uabridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └─────┬────┘ └──────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │  shutdown   │
//!                    └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the bridge (default command)
//! uabridge
//!
//! # Start with a custom config
//! uabridge -c /etc/uabridge/uabridge.yaml
//!
//! # Validate configuration
//! uabridge validate --strict
//!
//! # Show version
//! uabridge version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::{init_logging, LogSettings};
pub use runtime::BridgeRuntime;
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
