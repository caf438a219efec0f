//! HTTP gateway
//!
//! Exposes the SNMP OLT adapter to callers that address an OLT directly and
//! lets the inventory service push the device list.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/olt/system` - OLT system metrics
//! - `POST /api/v1/olt/pon-ports` - PON port metrics
//! - `POST /api/v1/olt/onts` - ONT metrics
//! - `POST /api/v1/olt/ont-status` - ONTs split into up and down
//! - `POST /api/v1/monitoring/sync` - Replace the device inventory

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, SyncRequest, SyncResponse};

use std::net::SocketAddr;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8008")
    pub bind_addr: SocketAddr,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl From<&ServerConfig> for ApiConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            bind_addr: server.socket_addr(),
            enable_cors: server.enable_cors,
        }
    }
}

/// All routes with their state applied
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/olt/system", post(routes::olt::system_metrics))
        .route("/api/v1/olt/pon-ports", post(routes::olt::pon_ports))
        .route("/api/v1/olt/onts", post(routes::olt::onts))
        .route("/api/v1/olt/ont-status", post(routes::olt::ont_status))
        .route("/api/v1/monitoring/sync", post(routes::inventory::sync_devices))
        .with_state(state)
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
