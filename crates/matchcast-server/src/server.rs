//! `MatchcastServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ConfigError, ServerConfig};
use crate::health::HealthReport;
use crate::matches::{create_match, list_matches};
use crate::shutdown::{DrainReport, ShutdownCoordinator};
use crate::store::MatchStore;
use crate::websocket::broadcast::BroadcastHub;
use crate::websocket::handler::ws_handler;
use crate::websocket::slots::ConnectionSlots;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry, heartbeat, and event fan-out.
    pub hub: Arc<BroadcastHub>,
    /// Upgrade admission, sized by `max_connections`.
    pub slots: Arc<ConnectionSlots>,
    /// Match persistence.
    pub store: Arc<dyn MatchStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The matchcast server.
pub struct MatchcastServer {
    state: AppState,
}

impl std::fmt::Debug for MatchcastServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchcastServer")
            .field("config", &self.state.config)
            .finish_non_exhaustive()
    }
}

impl MatchcastServer {
    /// Create a server and start its hub's heartbeat.
    ///
    /// Must be called inside a Tokio runtime. The heartbeat stops when the
    /// server's shutdown coordinator fires. Fails if `config` does not
    /// validate.
    pub fn new(config: ServerConfig, store: Arc<dyn MatchStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let hub = Arc::new(BroadcastHub::start(
            config.heartbeat_interval(),
            &shutdown.token(),
        ));
        let slots = Arc::new(ConnectionSlots::new(config.max_connections));
        Ok(Self {
            state: AppState {
                hub,
                slots,
                store,
                config: Arc::new(config),
                shutdown,
                start_time: Instant::now(),
                metrics: None,
            },
        })
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/matches", get(list_matches).post(create_match))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`). The serve task is
    /// tracked by the shutdown coordinator.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(self.state.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.state.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        self.state.shutdown.track("http", handle);
        info!(%addr, "matchcast server listening");
        Ok(addr)
    }

    /// The broadcast hub.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.state.hub
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Signal shutdown and close every WebSocket connection without waiting.
    pub fn stop(&self) {
        self.state.shutdown.shutdown();
        self.state.hub.shutdown();
    }

    /// Stop, then wait up to `timeout` for the serve loop and heartbeat.
    pub async fn shutdown_gracefully(&self, timeout: Option<Duration>) -> DrainReport {
        self.state.shutdown.drain(&self.state.hub, timeout).await
    }
}

/// GET /health
///
/// 503 when the hub is degraded.
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::collect(&state.hub, state.start_time);
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
