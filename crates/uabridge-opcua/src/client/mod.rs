// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Upstream client side of the bridge.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       SessionManager                            │
//! │        (state machine, backoff, single ValueStore writer)       │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ connect / handshake / subscribe         ▲
//!          ▼                                         │ recv
//! ┌──────────────────────────────┐     ┌──────────────────────────────┐
//! │      UpstreamTransport       │────►│      NotificationQueue       │
//! │ (fake in tests, opcua crate) │sink │  (bounded, drop-oldest)      │
//! └──────────────────────────────┘     └──────────────────────────────┘
//! ```

pub mod backoff;
mod queue;
mod session;
mod transport;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use backoff::{Backoff, BackoffConfig};
pub use queue::NotificationQueue;
pub use session::{ConnectionState, SessionCounters, SessionManager, StateSnapshot, StatusHandle};
pub use transport::{MonitoredItemRequest, Notification, NotificationSink, UpstreamTransport};

#[cfg(feature = "real-transport")]
pub use real_transport::OpcUaTransport;
