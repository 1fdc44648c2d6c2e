// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the subscription-and-cache bridge.
//!
//! Upstream failures (connect, handshake, subscribe) never reach query
//! callers. They are absorbed by the session task and turned into state
//! transitions; they surface only through the status read and the logs.
//! Configuration errors are fatal at startup and `NotFound` is the only
//! error a query can produce.
//!
//! # Error Categories
//!
//! ```text
//! BridgeError
//! ├── Config     - Invalid registry or session settings (fatal at start)
//! ├── Connect    - Transport could not be opened or was lost
//! ├── Handshake  - Security negotiation or session activation failed
//! ├── Subscribe  - Subscription or monitored item creation failed
//! ├── NotFound   - Display name absent from the registry
//! ├── Timeout    - Bounded wait expired (stop)
//! └── AlreadyStopped - Bridge already shut down
//! ```
//!
//! # Examples
//!
//! ```
//! use uabridge_opcua::error::{BridgeError, ConnectError};
//!
//! let error = BridgeError::from(ConnectError::refused(
//!     "opc.tcp://localhost:4840",
//!     "connection refused",
//! ));
//!
//! assert!(error.is_retryable());
//! assert_eq!(error.category(), "connect");
//! ```

use std::time::Duration;

use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

// =============================================================================
// BridgeError - Main Error Type
// =============================================================================

/// The main error type of the bridge core.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Invalid configuration.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Transport could not be opened, or was lost.
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// Security negotiation or session activation failed.
    #[error("{0}")]
    Handshake(#[from] HandshakeError),

    /// Subscription setup failed.
    #[error("{0}")]
    Subscribe(#[from] SubscribeError),

    /// A display name that is not part of the registry was queried.
    #[error("Point not found: '{name}'")]
    NotFound {
        /// The queried display name.
        name: String,
    },

    /// A bounded wait expired.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        duration: Duration,
    },

    /// The bridge has already been stopped.
    #[error("Bridge is stopped")]
    AlreadyStopped,
}

impl BridgeError {
    /// Creates a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns `true` if the session task recovers from this error by
    /// reconnecting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Handshake(_) | Self::Subscribe(_) => true,
            Self::Config(_) | Self::NotFound { .. } | Self::Timeout { .. } | Self::AlreadyStopped => {
                false
            }
        }
    }

    /// Returns `true` if the error prevents the bridge from starting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns `true` for a registry membership miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns a short category label, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connect(_) => "connect",
            Self::Handshake(_) => "handshake",
            Self::Subscribe(_) => "subscribe",
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::AlreadyStopped => "stopped",
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Invalid registry definition or session settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two descriptors share a display name.
    #[error("Duplicate display name: '{name}'")]
    DuplicateDisplayName {
        /// The duplicated name.
        name: String,
    },

    /// A descriptor has an empty display name.
    #[error("Point #{index} has an empty display name")]
    EmptyDisplayName {
        /// Position of the descriptor in configuration order.
        index: usize,
    },

    /// A descriptor has an empty remote node id.
    #[error("Point '{name}' has an empty remote node id")]
    EmptyRemoteNodeId {
        /// Display name of the offending descriptor.
        name: String,
    },

    /// A node id could not be parsed.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// The node id text.
        node_id: String,
        /// Parse failure reason.
        reason: String,
    },

    /// The server endpoint URL is malformed.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint URL.
        endpoint: String,
        /// Reason.
        reason: String,
    },

    /// Unknown security policy name.
    #[error("Unknown security policy '{name}'")]
    UnknownSecurityPolicy {
        /// The name given.
        name: String,
    },

    /// Unknown security mode name.
    #[error("Unknown security mode '{name}'")]
    UnknownSecurityMode {
        /// The name given.
        name: String,
    },

    /// Security policy and mode contradict each other.
    #[error("Security policy '{policy}' cannot be combined with mode '{mode}'")]
    SecurityMismatch {
        /// Configured policy.
        policy: String,
        /// Configured mode.
        mode: String,
    },

    /// A tunable has an invalid value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Reason.
        reason: String,
    },
}

impl ConfigError {
    /// Creates a duplicate display name error.
    pub fn duplicate_display_name(name: impl Into<String>) -> Self {
        Self::DuplicateDisplayName { name: name.into() }
    }

    /// Creates an empty remote node id error.
    pub fn empty_remote_node_id(name: impl Into<String>) -> Self {
        Self::EmptyRemoteNodeId { name: name.into() }
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// ConnectError
// =============================================================================

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// The server refused or could not be reached.
    #[error("Connection to '{endpoint}' failed: {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Reason reported by the transport.
        reason: String,
    },

    /// Opening the transport took longer than allowed.
    #[error("Connection to '{endpoint}' timed out after {duration:?}")]
    TimedOut {
        /// Target endpoint.
        endpoint: String,
        /// The bound that was exceeded.
        duration: Duration,
    },

    /// An established connection dropped.
    #[error("Connection lost: {reason}")]
    Lost {
        /// Reason for the loss.
        reason: String,
    },

    /// An operation required an open transport.
    #[error("Not connected to the OPC UA server")]
    NotConnected,
}

impl ConnectError {
    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timed out error.
    pub fn timed_out(endpoint: impl Into<String>, duration: Duration) -> Self {
        Self::TimedOut {
            endpoint: endpoint.into(),
            duration,
        }
    }

    /// Creates a connection lost error.
    pub fn lost(reason: impl Into<String>) -> Self {
        Self::Lost {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// HandshakeError
// =============================================================================

/// Security negotiation and session activation failures.
///
/// A rejected policy is retried with the same policy after backoff. The
/// bridge never falls back to a weaker policy.
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    /// The server offers no endpoint with the configured policy and mode.
    #[error("Server offers no endpoint for policy '{policy}' with mode '{mode}'")]
    UnsupportedPolicy {
        /// Configured policy.
        policy: String,
        /// Configured mode.
        mode: String,
    },

    /// The server rejected the secure channel or session.
    #[error("Handshake rejected: {reason}")]
    Rejected {
        /// Reason.
        reason: String,
    },

    /// The client certificate or key could not be loaded or created.
    #[error("Certificate error: {reason}")]
    Certificate {
        /// Reason.
        reason: String,
    },

    /// Session activation exceeded its bound.
    #[error("Handshake timed out after {duration:?}")]
    TimedOut {
        /// The bound that was exceeded.
        duration: Duration,
    },
}

impl HandshakeError {
    /// Creates a rejected error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported policy error.
    pub fn unsupported_policy(policy: impl Into<String>, mode: impl Into<String>) -> Self {
        Self::UnsupportedPolicy {
            policy: policy.into(),
            mode: mode.into(),
        }
    }

    /// Creates a certificate error.
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::Certificate {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// SubscribeError
// =============================================================================

/// Subscription and monitored item failures.
#[derive(Debug, Clone, Error)]
pub enum SubscribeError {
    /// The subscription itself could not be created.
    #[error("Failed to create subscription: {reason}")]
    Subscription {
        /// Reason.
        reason: String,
    },

    /// A monitored item was rejected.
    #[error("Failed to monitor '{node_id}': {reason}")]
    MonitoredItem {
        /// Remote node id.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// The server returned a bad status code for a monitored item.
    #[error("Server rejected '{node_id}' with status 0x{status_code:08X}")]
    BadStatus {
        /// Remote node id.
        node_id: String,
        /// OPC UA status code.
        status_code: u32,
    },

    /// Subscribing exceeded its bound.
    #[error("Subscribing timed out after {duration:?}")]
    TimedOut {
        /// The bound that was exceeded.
        duration: Duration,
    },
}

impl SubscribeError {
    /// Creates a subscription creation error.
    pub fn subscription(reason: impl Into<String>) -> Self {
        Self::Subscription {
            reason: reason.into(),
        }
    }

    /// Creates a monitored item error.
    pub fn monitored_item(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MonitoredItem {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a bad status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_are_retryable() {
        let connect = BridgeError::from(ConnectError::refused("opc.tcp://h:4840", "refused"));
        let handshake = BridgeError::from(HandshakeError::rejected("BadSecurityPolicyRejected"));
        let subscribe = BridgeError::from(SubscribeError::bad_status("ns=2;s=X", 0x8034_0000));

        assert!(connect.is_retryable());
        assert!(handshake.is_retryable());
        assert!(subscribe.is_retryable());
        assert!(!connect.is_fatal());
    }

    #[test]
    fn test_config_error_is_fatal() {
        let err = BridgeError::from(ConfigError::duplicate_display_name("Flow"));
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "config");
        assert_eq!(err.to_string(), "Duplicate display name: 'Flow'");
    }

    #[test]
    fn test_not_found() {
        let err = BridgeError::not_found("Missing");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Point not found: 'Missing'");
    }

    #[test]
    fn test_bad_status_display() {
        let err = SubscribeError::bad_status("ns=2;s=X", 0x8034_0000);
        assert_eq!(
            err.to_string(),
            "Server rejected 'ns=2;s=X' with status 0x80340000"
        );
    }
}
