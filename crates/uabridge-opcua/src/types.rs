// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA types and session configuration.
//!
//! - **NodeId**: the four OPC UA identifier kinds, parsed from the textual
//!   `ns=<idx>;<kind>=<value>` form used in configuration files
//! - **SecurityMode/Policy**: negotiated security parameters
//! - **SessionConfig**: everything the session task needs to reach the server
//! - **BridgeConfig**: session settings plus the ordered list of points
//!
//! # Examples
//!
//! ```
//! use uabridge_opcua::types::{NodeId, SecurityMode, SecurityPolicy, SessionConfig};
//!
//! let node: NodeId = "ns=2;s=D1.Tag1".parse().unwrap();
//! assert_eq!(node.namespace_index, 2);
//!
//! let config = SessionConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .security_policy(SecurityPolicy::Basic256Sha256)
//!     .security_mode(SecurityMode::SignAndEncrypt)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.publishing_interval.as_millis(), 500);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::backoff::BackoffConfig;
use crate::error::ConfigError;
use crate::registry::SubscriptionDescriptor;

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA node identifier.
///
/// The registry treats remote node ids as opaque strings. This type is used
/// by transports that need the structured form and by the `validate`
/// command to flag ids that will not parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Returns the node ID in OPC UA string format.
    ///
    /// Namespace 0 is written without the `ns=` prefix.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = ConfigError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=2258` (namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| ConfigError::invalid_node_id(s, "Missing identifier after namespace"))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| ConfigError::invalid_node_id(s, "Invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value: u32 = id
                .parse()
                .map_err(|_| ConfigError::invalid_node_id(s, "Invalid numeric identifier"))?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(ConfigError::invalid_node_id(s, "Empty string identifier"));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id)
                .map_err(|e| ConfigError::invalid_node_id(s, format!("Invalid GUID: {}", e)))?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|e| ConfigError::invalid_node_id(s, format!("Invalid base64: {}", e)))?;
            NodeIdentifier::Opaque(bytes)
        } else {
            return Err(ConfigError::invalid_node_id(
                s,
                "Unknown identifier type. Expected i=, s=, g=, or b=",
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// OPC UA node identifier kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
    /// Opaque (byte string) identifier.
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SecurityMode {
    /// Messages are neither signed nor encrypted.
    #[default]
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Returns `true` if this mode provides no security.
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "none" | "nosecurity" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" | "encrypted" => Ok(Self::SignAndEncrypt),
            _ => Err(ConfigError::UnknownSecurityMode { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for SecurityMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SecurityMode> for String {
    fn from(mode: SecurityMode) -> Self {
        mode.name().to_string()
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128Sha256RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256Sha256RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// Returns the OPC UA policy URI.
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// Returns the short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Returns `true` if this policy is deprecated.
    #[inline]
    pub const fn is_deprecated(&self) -> bool {
        matches!(self, Self::Basic128Rsa15 | Self::Basic256)
    }

    /// Returns `true` if a client certificate is required.
    #[inline]
    pub const fn requires_certificates(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Creates from a policy URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.rsplit_once('#').map(|(_, name)| name) {
            Some("None") => Some(Self::None),
            Some("Basic128Rsa15") => Some(Self::Basic128Rsa15),
            Some("Basic256") => Some(Self::Basic256),
            Some("Basic256Sha256") => Some(Self::Basic256Sha256),
            Some("Aes128_Sha256_RsaOaep") => Some(Self::Aes128Sha256RsaOaep),
            Some("Aes256_Sha256_RsaPss") => Some(Self::Aes256Sha256RsaPss),
            _ => Option::None,
        }
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }

        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "none" => Ok(Self::None),
            "basic128rsa15" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(ConfigError::UnknownSecurityPolicy { name: s.to_string() }),
        }
    }
}

impl TryFrom<String> for SecurityPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SecurityPolicy> for String {
    fn from(policy: SecurityPolicy) -> Self {
        policy.name().to_string()
    }
}

// =============================================================================
// SecurityProfile
// =============================================================================

/// The parameters negotiated during the security handshake.
///
/// The profile is fixed by configuration. A rejected handshake is retried
/// with the same profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityProfile {
    /// Security policy.
    pub policy: SecurityPolicy,
    /// Message security mode.
    pub mode: SecurityMode,
    /// Application name presented to the server.
    pub application_name: String,
    /// Application URI presented to the server.
    pub application_uri: String,
}

// =============================================================================
// SessionConfig
// =============================================================================

/// Settings for the upstream session and the session task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server endpoint URL (e.g. "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Application name presented to the server.
    pub application_name: String,

    /// Application URI. Derived from the application name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Security policy.
    pub security_policy: SecurityPolicy,

    /// Message security mode.
    pub security_mode: SecurityMode,

    /// Client certificate (DER).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<PathBuf>,

    /// Client private key (PEM).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// PKI directory holding own and trusted certificates.
    pub pki_dir: PathBuf,

    /// Create a self-signed client keypair in the PKI directory when none exists.
    pub create_keypair: bool,

    /// Trust server certificates without validation.
    pub trust_server_certificates: bool,

    /// Bound for opening the transport.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Bound for handshake and subscription requests.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Requested session timeout.
    #[serde(with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Subscription publishing interval.
    #[serde(with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Monitored item sampling interval.
    #[serde(with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size per monitored item.
    pub queue_size: u32,

    /// Reconnection backoff.
    pub backoff: BackoffConfig,

    /// Age after which a sample is reported as stale.
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,

    /// Interval of the staleness sweep.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Capacity of the notification queue. The oldest entry is dropped on overflow.
    pub notification_queue_capacity: usize,

    /// Bound for a clean shutdown.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Read current values once after subscribing.
    pub read_initial_values: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "opc.tcp://localhost:4840".to_string(),
            application_name: "uabridge".to_string(),
            application_uri: None,
            security_policy: SecurityPolicy::None,
            security_mode: SecurityMode::None,
            certificate_path: None,
            private_key_path: None,
            pki_dir: PathBuf::from("pki"),
            create_keypair: true,
            trust_server_certificates: true,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            session_timeout: Duration::from_secs(60),
            publishing_interval: Duration::from_millis(500),
            sampling_interval: Duration::from_millis(500),
            queue_size: 10,
            backoff: BackoffConfig::default(),
            stale_after: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            notification_queue_capacity: 1024,
            stop_timeout: Duration::from_secs(5),
            read_initial_values: true,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Creates a configuration with default settings for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Returns the application URI, derived from the name when not set.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri.clone().unwrap_or_else(|| {
            format!(
                "urn:{}:client",
                self.application_name.to_lowercase().replace(' ', "-")
            )
        })
    }

    /// Returns the security profile negotiated during the handshake.
    pub fn security_profile(&self) -> SecurityProfile {
        SecurityProfile {
            policy: self.security_policy,
            mode: self.security_mode,
            application_name: self.application_name.clone(),
            application_uri: self.effective_application_uri(),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self
            .endpoint
            .strip_prefix("opc.tcp://")
            .ok_or_else(|| ConfigError::invalid_endpoint(&self.endpoint, "must start with opc.tcp://"))?;
        if host.is_empty() || host.starts_with('/') || host.starts_with(':') {
            return Err(ConfigError::invalid_endpoint(&self.endpoint, "missing host"));
        }

        // Policy and mode must agree on whether the channel is secured.
        if self.security_policy.requires_certificates() == self.security_mode.is_none() {
            return Err(ConfigError::SecurityMismatch {
                policy: self.security_policy.to_string(),
                mode: self.security_mode.to_string(),
            });
        }

        if self.application_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("application_name", "must not be empty"));
        }

        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("publishing_interval", self.publishing_interval),
            ("stale_after", self.stale_after),
            ("sweep_interval", self.sweep_interval),
            ("stop_timeout", self.stop_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        if self.notification_queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "notification_queue_capacity",
                "must be greater than zero",
            ));
        }

        self.backoff.validate()
    }
}

// =============================================================================
// SessionConfigBuilder
// =============================================================================

/// Builder for [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = Some(uri.into());
        self
    }

    /// Sets the security policy.
    pub fn security_policy(mut self, policy: SecurityPolicy) -> Self {
        self.config.security_policy = policy;
        self
    }

    /// Sets the security mode.
    pub fn security_mode(mut self, mode: SecurityMode) -> Self {
        self.config.security_mode = mode;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.config.publishing_interval = interval;
        self
    }

    /// Sets the reconnection backoff.
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Sets the staleness threshold.
    pub fn stale_after(mut self, threshold: Duration) -> Self {
        self.config.stale_after = threshold;
        self
    }

    /// Sets the staleness sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Sets the notification queue capacity.
    pub fn notification_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_queue_capacity = capacity;
        self
    }

    /// Sets the shutdown bound.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Enables or disables the initial read after subscribing.
    pub fn read_initial_values(mut self, enabled: bool) -> Self {
        self.config.read_initial_values = enabled;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// BridgeConfig
// =============================================================================

/// Complete input of [`Bridge::start`](crate::Bridge::start).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Upstream session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Monitored points in configuration order.
    #[serde(default)]
    pub points: Vec<SubscriptionDescriptor>,
}

impl BridgeConfig {
    /// Creates a bridge configuration.
    pub fn new(session: SessionConfig, points: Vec<SubscriptionDescriptor>) -> Self {
        Self { session, points }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_parse_string() {
        let node: NodeId = "ns=2;s=D1.Tag1".parse().unwrap();
        assert_eq!(node.namespace_index, 2);
        assert_eq!(node.identifier, NodeIdentifier::String("D1.Tag1".into()));
        assert_eq!(node.to_string(), "ns=2;s=D1.Tag1");
    }

    #[test]
    fn test_node_id_parse_numeric_default_namespace() {
        let node: NodeId = "i=2258".parse().unwrap();
        assert_eq!(node, NodeId::numeric(0, 2258));
        assert_eq!(node.to_string(), "i=2258");
    }

    #[test]
    fn test_node_id_parse_errors() {
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=2;q=1".parse::<NodeId>().is_err());
        assert!("ns=2;s=".parse::<NodeId>().is_err());
        assert!("ns=2;g=not-a-guid".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_security_names() {
        assert_eq!("Basic256Sha256".parse::<SecurityPolicy>().unwrap(), SecurityPolicy::Basic256Sha256);
        assert_eq!("basic256_sha256".parse::<SecurityPolicy>().unwrap(), SecurityPolicy::Basic256Sha256);
        assert_eq!(
            SecurityPolicy::from_uri("http://opcfoundation.org/UA/SecurityPolicy#Basic256"),
            Some(SecurityPolicy::Basic256)
        );
        assert_eq!("SignAndEncrypt".parse::<SecurityMode>().unwrap(), SecurityMode::SignAndEncrypt);
        assert!("Rot13".parse::<SecurityPolicy>().is_err());
    }

    #[test]
    fn test_security_serde_accepts_display_names() {
        let policy: SecurityPolicy = serde_json::from_str("\"Basic256Sha256\"").unwrap();
        assert_eq!(policy, SecurityPolicy::Basic256Sha256);
        assert_eq!(serde_json::to_string(&SecurityMode::Sign).unwrap(), "\"Sign\"");
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(SessionConfig::new("opc.tcp://plc:4840").validate().is_ok());
        assert!(matches!(
            SessionConfig::new("http://plc:4840").validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(SessionConfig::new("opc.tcp://").validate().is_err());
    }

    #[test]
    fn test_validate_security_mismatch() {
        let result = SessionConfig::builder()
            .security_policy(SecurityPolicy::None)
            .security_mode(SecurityMode::Sign)
            .build();
        assert!(matches!(result, Err(ConfigError::SecurityMismatch { .. })));

        let result = SessionConfig::builder()
            .security_policy(SecurityPolicy::Basic256Sha256)
            .security_mode(SecurityMode::None)
            .build();
        assert!(matches!(result, Err(ConfigError::SecurityMismatch { .. })));
    }

    #[test]
    fn test_effective_application_uri() {
        let config = SessionConfig::builder()
            .application_name("Flow Gateway")
            .build()
            .unwrap();
        assert_eq!(config.effective_application_uri(), "urn:flow-gateway:client");
        assert_eq!(config.security_profile().policy, SecurityPolicy::None);
    }

    #[test]
    fn test_session_config_humantime() {
        let json = r#"{"endpoint": "opc.tcp://plc:4840", "stale_after": "5s", "publishing_interval": "250ms"}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.stale_after, Duration::from_secs(5));
        assert_eq!(config.publishing_interval, Duration::from_millis(250));
        assert_eq!(config.notification_queue_capacity, 1024);
    }
}
