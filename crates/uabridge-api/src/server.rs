// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use uabridge_config::HttpConfig;

use crate::error::{ApiError, ApiResult};
use crate::handlers;
use crate::state::AppState;

// =============================================================================
// ApiServer
// =============================================================================

/// The HTTP adapter over a running bridge.
pub struct ApiServer {
    state: AppState,
    config: Arc<HttpConfig>,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self { state, config }
    }

    /// Creates the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.request_timeout,
            ));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route("/ready", get(handlers::ready))
            .route("/api/values", get(handlers::list_values))
            .route("/api/value/{name}", get(handlers::get_value))
            .route("/api/status", get(handlers::get_status))
            .layer(middleware_stack);

        if self.config.cors_enabled {
            router = router.layer(create_cors_layer(&self.config));
        }

        router.with_state(self.state.clone())
    }

    /// Binds the configured address and serves until `shutdown_signal`
    /// resolves.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;
        self.serve(listener, shutdown_signal).await
    }

    /// Serves on an already bound listener until `shutdown_signal` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let router = self.router();
        let local_addr = listener.local_addr().ok();

        info!(addr = ?local_addr, "Starting API server");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("API server shutdown complete");

        Ok(())
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.config.socket_addr()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer from configuration. An empty origin list allows
/// any origin.
fn create_cors_layer(config: &HttpConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use serde_json::Value as Json;
    use tokio::sync::watch;
    use tower::ServiceExt;
    use uabridge_opcua::{
        ConnectionState, NodeRegistry, NotificationQueue, Quality, QueryFacade, SessionCounters,
        StateSnapshot, StatusHandle, SubscriptionDescriptor, Value, ValueStore,
    };

    struct Fixture {
        server: ApiServer,
        store: Arc<ValueStore>,
        state_tx: watch::Sender<StateSnapshot>,
    }

    fn fixture(config: HttpConfig) -> Fixture {
        let registry = NodeRegistry::build(vec![
            SubscriptionDescriptor::new("FlowTransmitter", "ns=2;s=D1.Tag1").with_unit("l/min"),
            SubscriptionDescriptor::new("Valve", "ns=2;s=D1.Tag2"),
        ])
        .unwrap();
        let store = Arc::new(ValueStore::new());
        let (state_tx, state_rx) = watch::channel(StateSnapshot::default());
        let status = StatusHandle::new(
            state_rx,
            Arc::new(SessionCounters::default()),
            Arc::new(NotificationQueue::new(8)),
            "opc.tcp://plc:4840",
        );
        let facade = QueryFacade::new(Arc::new(registry), store.clone(), status);
        Fixture {
            server: ApiServer::new(AppState::new(facade, config)),
            store,
            state_tx,
        }
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Json) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_values_in_configuration_order() {
        let fixture = fixture(HttpConfig::default());
        fixture.store.update(
            "FlowTransmitter",
            Some(Value::Float(12.4567)),
            Quality::Good,
            Utc::now(),
        );

        let (status, body) = get(fixture.server.router(), "/api/values").await;
        assert_eq!(status, StatusCode::OK);

        let values = body.as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["display_name"], "FlowTransmitter");
        assert_eq!(values[0]["value"], 12.46);
        assert_eq!(values[0]["quality"], "Good");
        assert_eq!(values[0]["unit"], "l/min");
        assert_eq!(values[1]["display_name"], "Valve");
        assert!(values[1]["value"].is_null());
        assert_eq!(values[1]["quality"], "Unknown");
    }

    #[tokio::test]
    async fn test_float_rounding_disabled() {
        let config = HttpConfig {
            float_decimals: None,
            ..HttpConfig::default()
        };
        let fixture = fixture(config);
        fixture.store.update(
            "FlowTransmitter",
            Some(Value::Float(12.4567)),
            Quality::Good,
            Utc::now(),
        );

        let (_, body) = get(fixture.server.router(), "/api/value/FlowTransmitter").await;
        assert_eq!(body["value"], 12.4567);
    }

    #[tokio::test]
    async fn test_get_value_unknown_name() {
        let fixture = fixture(HttpConfig::default());
        let (status, body) = get(fixture.server.router(), "/api/value/Pump").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_get_value_unobserved() {
        let fixture = fixture(HttpConfig::default());
        let (status, body) = get(fixture.server.router(), "/api/value/Valve").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quality"], "Unknown");
        assert!(body["observed_at"].is_null());
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let fixture = fixture(HttpConfig::default());
        fixture.state_tx.send_modify(|s| {
            s.state = ConnectionState::Active;
            s.active_subscription_count = 2;
        });

        let (status, body) = get(fixture.server.router(), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection_state"], "active");
        assert_eq!(body["connected"], true);
        assert_eq!(body["monitored_count"], 2);
        assert_eq!(body["active_subscription_count"], 2);
        assert_eq!(body["endpoint"], "opc.tcp://plc:4840");
        assert!(body["server_time"].is_string());
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_ready_follows_connection_state() {
        let fixture = fixture(HttpConfig::default());

        let (status, body) = get(fixture.server.router(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
        assert_eq!(body["connection_state"], "disconnected");

        fixture
            .state_tx
            .send_modify(|s| s.state = ConnectionState::Active);
        let (status, body) = get(fixture.server.router(), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);
    }

    #[tokio::test]
    async fn test_health() {
        let fixture = fixture(HttpConfig::default());
        let (status, body) = get(fixture.server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let config = HttpConfig {
            allowed_origins: vec!["http://hmi.local".to_string()],
            ..HttpConfig::default()
        };
        let fixture = fixture(config);
        let response = fixture
            .server
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/values")
                    .header(header::ORIGIN, "http://hmi.local")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://hmi.local"
        );
    }

    #[test]
    fn test_addr() {
        let fixture = fixture(HttpConfig::default());
        assert_eq!(fixture.server.addr().port(), 5000);
    }
}
