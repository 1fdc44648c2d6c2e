// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Production transport backed by the `opcua` crate.
//!
//! The `opcua` client API is synchronous, so every call runs on the
//! blocking pool. Data changes arrive on the client's own threads through
//! a [`DataChangeCallback`] and are forwarded to the [`NotificationSink`];
//! monitored items are mapped back to their configured node id through the
//! client handle.
//!
//! The crate's own session retry is disabled: reconnection is the job of
//! the session task.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use super::transport::{MonitoredItemRequest, Notification, NotificationSink, UpstreamTransport};
use crate::error::{ConnectError, HandshakeError, SubscribeError};
use crate::store::Value;
use crate::types::{self, NodeIdentifier, SecurityProfile, SessionConfig};

type SharedSession = Arc<OpcUaRwLock<Session>>;
type HandleMap = Arc<RwLock<HashMap<u32, String>>>;

/// Transport talking to a real OPC UA server.
pub struct OpcUaTransport {
    config: SessionConfig,
    client: Option<Client>,
    endpoint: Option<EndpointDescription>,
    session: Option<SharedSession>,
    stop_tx: Option<tokio::sync::oneshot::Sender<SessionCommand>>,
    sink: Option<NotificationSink>,
    handles: HandleMap,
}

impl OpcUaTransport {
    /// Creates a transport for the given session settings.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            client: None,
            endpoint: None,
            session: None,
            stop_tx: None,
            sink: None,
            handles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn build_client(config: &SessionConfig) -> Result<Client, ConnectError> {
        let mut builder = ClientBuilder::new()
            .application_name(config.application_name.as_str())
            .application_uri(config.effective_application_uri().as_str())
            .create_sample_keypair(config.create_keypair)
            .trust_server_certs(config.trust_server_certificates)
            .pki_dir(config.pki_dir.clone())
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis() as u32);

        if let (Some(cert), Some(key)) = (&config.certificate_path, &config.private_key_path) {
            builder = builder.certificate_path(cert.clone()).private_key_path(key.clone());
        }

        builder
            .client()
            .ok_or_else(|| ConnectError::refused(&config.endpoint, "invalid client configuration"))
    }

    fn opcua_policy(policy: types::SecurityPolicy) -> opcua::client::prelude::SecurityPolicy {
        use opcua::client::prelude::SecurityPolicy as Policy;
        match policy {
            types::SecurityPolicy::None => Policy::None,
            types::SecurityPolicy::Basic128Rsa15 => Policy::Basic128Rsa15,
            types::SecurityPolicy::Basic256 => Policy::Basic256,
            types::SecurityPolicy::Basic256Sha256 => Policy::Basic256Sha256,
            types::SecurityPolicy::Aes128Sha256RsaOaep => Policy::Aes128Sha256RsaOaep,
            types::SecurityPolicy::Aes256Sha256RsaPss => Policy::Aes256Sha256RsaPss,
        }
    }

    fn opcua_mode(mode: types::SecurityMode) -> MessageSecurityMode {
        match mode {
            types::SecurityMode::None => MessageSecurityMode::None,
            types::SecurityMode::Sign => MessageSecurityMode::Sign,
            types::SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
        }
    }

    fn opcua_node_id(text: &str) -> Result<opcua::types::NodeId, String> {
        let node_id = types::NodeId::from_str(text).map_err(|e| e.to_string())?;
        let ns = node_id.namespace_index;
        Ok(match node_id.identifier {
            NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, v),
            NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v),
            NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(v)),
            NodeIdentifier::Opaque(v) => {
                opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
            }
        })
    }

    fn session(&self) -> Result<SharedSession, SubscribeError> {
        self.session
            .clone()
            .ok_or_else(|| SubscribeError::subscription("session not active"))
    }

    async fn blocking<R, F>(f: F) -> Result<R, String>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| format!("blocking task failed: {}", e))
    }
}

/// Converts an OPC UA timestamp without tying callers to the crate's chrono version.
fn to_utc(timestamp: &opcua::types::DateTime) -> Option<DateTime<Utc>> {
    let value = timestamp.as_chrono();
    DateTime::from_timestamp(value.timestamp(), value.timestamp_subsec_nanos())
}

/// Maps a variant onto the bridge's value type.
fn to_value(variant: &Variant) -> Option<Value> {
    Some(match variant {
        Variant::Empty => return None,
        Variant::Boolean(v) => Value::Boolean(*v),
        Variant::SByte(v) => Value::Integer(i64::from(*v)),
        Variant::Byte(v) => Value::Integer(i64::from(*v)),
        Variant::Int16(v) => Value::Integer(i64::from(*v)),
        Variant::UInt16(v) => Value::Integer(i64::from(*v)),
        Variant::Int32(v) => Value::Integer(i64::from(*v)),
        Variant::UInt32(v) => Value::Integer(i64::from(*v)),
        Variant::Int64(v) => Value::Integer(*v),
        Variant::UInt64(v) => i64::try_from(*v)
            .map(Value::Integer)
            .unwrap_or(Value::Float(*v as f64)),
        Variant::Float(v) => Value::Float(f64::from(*v)),
        Variant::Double(v) => Value::Float(*v),
        Variant::String(v) => Value::Text(v.as_ref().to_string()),
        Variant::LocalizedText(v) => Value::Text(v.text.as_ref().to_string()),
        Variant::DateTime(v) => Value::Text(to_utc(v).map(|t| t.to_rfc3339()).unwrap_or_default()),
        other => Value::Text(format!("{:?}", other)),
    })
}

fn to_notification(remote_node_id: String, data_value: &DataValue) -> Notification {
    Notification {
        remote_node_id,
        value: data_value.value.as_ref().and_then(to_value),
        status_code: data_value.status.map(|s| s.bits()).unwrap_or(0),
        source_timestamp: data_value.source_timestamp.as_ref().and_then(to_utc),
        server_timestamp: data_value.server_timestamp.as_ref().and_then(to_utc),
    }
}

fn value_id(node_id: opcua::types::NodeId) -> ReadValueId {
    ReadValueId {
        node_id,
        attribute_id: AttributeId::Value as u32,
        index_range: opcua::types::UAString::null(),
        data_encoding: opcua::types::QualifiedName::null(),
    }
}

#[async_trait]
impl UpstreamTransport for OpcUaTransport {
    async fn connect(&mut self, sink: NotificationSink) -> Result<(), ConnectError> {
        let config = self.config.clone();
        let url = config.endpoint.clone();

        let (client, endpoints) = Self::blocking(move || {
            let client = Self::build_client(&config)?;
            let endpoints = client
                .get_server_endpoints_from_url(config.endpoint.as_str())
                .map_err(|status| ConnectError::refused(&config.endpoint, format!("{}", status)))?;
            Ok::<_, ConnectError>((client, endpoints))
        })
        .await
        .map_err(|reason| ConnectError::refused(&url, reason))??;

        let policy = Self::opcua_policy(self.config.security_policy);
        let mode = Self::opcua_mode(self.config.security_mode);
        self.endpoint = endpoints
            .into_iter()
            .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode);

        debug!(endpoint = %url, matched = self.endpoint.is_some(), "Discovered server endpoints");
        self.client = Some(client);
        self.sink = Some(sink);
        Ok(())
    }

    async fn activate_session(&mut self, profile: &SecurityProfile) -> Result<(), HandshakeError> {
        let endpoint = self.endpoint.clone().ok_or_else(|| {
            HandshakeError::unsupported_policy(profile.policy.to_string(), profile.mode.to_string())
        })?;
        let mut client = self
            .client
            .take()
            .ok_or_else(|| HandshakeError::rejected("transport not connected"))?;

        let (client, session) = Self::blocking(move || {
            let session = client
                .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
                .map_err(|status| HandshakeError::rejected(format!("{}", status)))?;
            Ok::<_, HandshakeError>((client, session))
        })
        .await
        .map_err(HandshakeError::rejected)??;

        if let Some(sink) = self.sink.clone() {
            session
                .write()
                .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
                    if !connected {
                        sink.connection_lost("server connection closed");
                    }
                }));
        }

        self.stop_tx = Some(Session::run_async(session.clone()));
        self.client = Some(client);
        self.session = Some(session);
        info!(endpoint = %self.config.endpoint, policy = %profile.policy, "OPC UA session active");
        Ok(())
    }

    async fn create_subscription(&mut self, publishing_interval: Duration) -> Result<u32, SubscribeError> {
        let session = self.session()?;
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| SubscribeError::subscription("transport not connected"))?;
        let handles = self.handles.clone();
        handles.write().clear();

        let callback = DataChangeCallback::new(move |items| {
            let handles = handles.read();
            for item in items.iter() {
                let remote_node_id = match handles.get(&item.client_handle()) {
                    Some(id) => id.clone(),
                    None => item.item_to_monitor().node_id.to_string(),
                };
                sink.deliver(to_notification(remote_node_id, item.last_value()));
            }
        });

        let interval_ms = publishing_interval.as_millis() as f64;
        Self::blocking(move || {
            session
                .read()
                .create_subscription(interval_ms, 60, 10, 0, 0, true, callback)
        })
        .await
        .map_err(SubscribeError::subscription)?
        .map_err(|status| SubscribeError::subscription(format!("{}", status)))
    }

    async fn create_monitored_item(
        &mut self,
        subscription_id: u32,
        request: &MonitoredItemRequest,
    ) -> Result<u32, SubscribeError> {
        let session = self.session()?;
        let node_id = Self::opcua_node_id(&request.remote_node_id)
            .map_err(|reason| SubscribeError::monitored_item(&request.remote_node_id, reason))?;

        let create = MonitoredItemCreateRequest {
            item_to_monitor: value_id(node_id),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: request.client_handle,
                sampling_interval: request.sampling_interval.as_millis() as f64,
                filter: ExtensionObject::null(),
                queue_size: request.queue_size,
                discard_oldest: true,
            },
        };

        self.handles
            .write()
            .insert(request.client_handle, request.remote_node_id.clone());

        trace!(node_id = %request.remote_node_id, subscription_id, "Creating monitored item");
        let results = Self::blocking(move || {
            session
                .read()
                .create_monitored_items(subscription_id, TimestampsToReturn::Both, &[create])
        })
        .await
        .map_err(|reason| SubscribeError::monitored_item(&request.remote_node_id, reason))?
        .map_err(|status| SubscribeError::monitored_item(&request.remote_node_id, format!("{}", status)))?;

        let result = results
            .first()
            .ok_or_else(|| SubscribeError::monitored_item(&request.remote_node_id, "empty response"))?;
        if !result.status_code.is_good() {
            return Err(SubscribeError::bad_status(
                &request.remote_node_id,
                result.status_code.bits(),
            ));
        }
        Ok(result.monitored_item_id)
    }

    async fn delete_monitored_items(
        &mut self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<(), SubscribeError> {
        let session = self.session()?;
        let ids = monitored_item_ids.to_vec();
        Self::blocking(move || session.read().delete_monitored_items(subscription_id, &ids))
            .await
            .map_err(SubscribeError::subscription)?
            .map(|_| ())
            .map_err(|status| SubscribeError::subscription(format!("{}", status)))
    }

    async fn delete_subscription(&mut self, subscription_id: u32) -> Result<(), SubscribeError> {
        let session = self.session()?;
        Self::blocking(move || session.read().delete_subscription(subscription_id))
            .await
            .map_err(SubscribeError::subscription)?
            .map(|_| ())
            .map_err(|status| SubscribeError::subscription(format!("{}", status)))
    }

    async fn read_values(&mut self, remote_node_ids: &[String]) -> Result<Vec<Notification>, SubscribeError> {
        let session = self.session()?;

        let mut ids = Vec::with_capacity(remote_node_ids.len());
        let mut requests = Vec::with_capacity(remote_node_ids.len());
        for text in remote_node_ids {
            match Self::opcua_node_id(text) {
                Ok(node_id) => {
                    ids.push(text.clone());
                    requests.push(value_id(node_id));
                }
                Err(reason) => warn!(node_id = %text, %reason, "Skipping unparseable node id"),
            }
        }
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let values = Self::blocking(move || session.read().read(&requests, TimestampsToReturn::Both, 0.0))
            .await
            .map_err(SubscribeError::subscription)?
            .map_err(|status| SubscribeError::subscription(format!("read: {}", status)))?;

        Ok(ids
            .into_iter()
            .zip(values.iter())
            .map(|(id, data_value)| to_notification(id, data_value))
            .collect())
    }

    async fn disconnect(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(SessionCommand::Stop);
        }
        if let Some(session) = self.session.take() {
            if let Err(reason) = Self::blocking(move || session.read().disconnect()).await {
                warn!(%reason, "Disconnect failed");
            }
        }
        self.handles.write().clear();
        self.endpoint = None;
        self.sink = None;
        self.client = None;
        debug!(endpoint = %self.config.endpoint, "OPC UA transport closed");
    }

    fn display_name(&self) -> String {
        format!("OpcUaTransport({})", self.config.endpoint)
    }
}

impl std::fmt::Debug for OpcUaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaTransport")
            .field("endpoint", &self.config.endpoint)
            .field("session", &self.session.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_conversion() {
        let node = OpcUaTransport::opcua_node_id("ns=2;s=D1.Tag1").unwrap();
        assert_eq!(node, opcua::types::NodeId::new(2, "D1.Tag1"));

        let node = OpcUaTransport::opcua_node_id("i=2258").unwrap();
        assert_eq!(node, opcua::types::NodeId::new(0, 2258u32));

        assert!(OpcUaTransport::opcua_node_id("garbage").is_err());
    }

    #[test]
    fn test_variant_conversion() {
        assert_eq!(to_value(&Variant::Double(12.4)), Some(Value::Float(12.4)));
        assert_eq!(to_value(&Variant::Int16(-3)), Some(Value::Integer(-3)));
        assert_eq!(to_value(&Variant::Boolean(true)), Some(Value::Boolean(true)));
        assert_eq!(to_value(&Variant::Empty), None);
    }

    #[tokio::test]
    async fn test_activate_without_matching_endpoint() {
        let mut transport = OpcUaTransport::new(SessionConfig::default());
        let profile = SessionConfig::default().security_profile();

        let error = transport.activate_session(&profile).await.unwrap_err();
        assert!(matches!(error, HandshakeError::UnsupportedPolicy { .. }));
        assert!(transport.session.is_none());
    }

    #[test]
    fn test_transport_creation() {
        let transport = OpcUaTransport::new(SessionConfig::default());
        assert!(transport.display_name().contains("opc.tcp://localhost:4840"));
    }
}
