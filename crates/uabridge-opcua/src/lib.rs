// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA subscription-and-cache bridge.
//!
//! This crate keeps one long-lived session to an OPC UA server, subscribes
//! to a configured set of nodes and caches the latest value of each under
//! a friendly display name. Readers query the cache through a
//! [`QueryFacade`] and never wait on the network.
//!
//! # Architecture
//!
//! ```text
//!   BridgeConfig ──► NodeRegistry (immutable, shared)
//!                         │
//!   ┌─────────────────────┼──────────────────────────────────────────┐
//!   │ Bridge              ▼                                          │
//!   │   SessionManager ──writes──► ValueStore ◄──reads── QueryFacade │
//!   │        │  ▲                     ▲                              │
//!   │        │  │ NotificationQueue   │ staleness sweep              │
//!   │        ▼  │                                                    │
//!   │   UpstreamTransport (opcua crate or a test fake)               │
//!   └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! ```text
//! BridgeError
//! ├── Config          - Invalid registry or session settings (fatal)
//! ├── Connect         - Transport open failures and connection loss
//! ├── Handshake       - Security negotiation and session activation
//! ├── Subscribe       - Subscription and monitored item creation
//! ├── NotFound        - Unknown display name (query error)
//! ├── Timeout         - An operation exceeded its deadline
//! └── AlreadyStopped  - The bridge has been stopped
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uabridge_opcua::{Bridge, BridgeConfig, OpcUaTransport, SessionConfig, SubscriptionDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionConfig::new("opc.tcp://localhost:4840");
//!     let points = vec![
//!         SubscriptionDescriptor::new("FlowTransmitter", "ns=2;s=D1.Tag1").with_unit("l/min"),
//!     ];
//!     let transport = OpcUaTransport::new(session.clone());
//!     let mut bridge = Bridge::start(BridgeConfig::new(session, points), transport).await?;
//!
//!     let reading = bridge.facade().get_by_name("FlowTransmitter")?;
//!     println!("{:?} {:?}", reading.value, reading.quality);
//!
//!     bridge.stop().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod client;
pub mod error;
pub mod facade;
pub mod registry;
pub mod store;
pub mod types;

pub use bridge::Bridge;
pub use facade::{BridgeStatus, PointReading, QueryFacade};

pub use error::{
    BridgeError, BridgeResult, ConfigError, ConnectError, HandshakeError, SubscribeError,
};

pub use types::{
    BridgeConfig, NodeId, NodeIdentifier, SecurityMode, SecurityPolicy, SecurityProfile,
    SessionConfig, SessionConfigBuilder,
};

pub use registry::{NodeRegistry, SubscriptionDescriptor};
pub use store::{Quality, Sample, UpdateOutcome, Value, ValueStore};

pub use client::{
    Backoff, BackoffConfig, ConnectionState, MonitoredItemRequest, Notification,
    NotificationQueue, NotificationSink, SessionCounters, SessionManager, StateSnapshot,
    StatusHandle, UpstreamTransport,
};

#[cfg(feature = "real-transport")]
pub use client::OpcUaTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
