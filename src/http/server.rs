//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, rate limit)
//! - Construct the shared breaker, orchestrator and store
//! - Bind server to listener and shut down on signal

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::{GatewayConfig, ValidationConfig};
use crate::detection::Orchestrator;
use crate::http::handlers::{detect, health, login, not_found, stats};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::resilience::{CircuitBreaker, Clock, SystemClock};
use crate::security::{rate_limit_middleware, RateLimiterState};
use crate::storage::{DetectionStore, MemoryStore};
use crate::upstream::{HttpUpstream, Upstream, UpstreamError};

/// Extra time the whole request may take beyond the upstream deadline.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(2);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn DetectionStore>,
    pub validation: ValidationConfig,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server talking to the configured backend over HTTP.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamError> {
        let upstream = Arc::new(HttpUpstream::new(&config.upstream)?);
        Ok(Self::with_parts(
            config,
            upstream,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        ))
    }

    /// Create a server from explicit collaborators.
    pub fn with_parts(
        config: GatewayConfig,
        upstream: Arc<dyn Upstream>,
        store: Arc<dyn DetectionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(&config.circuit_breaker, clock));
        let orchestrator = Arc::new(Orchestrator::new(breaker, upstream, &config.upstream));
        let rate_limiter = Arc::new(RateLimiterState::new(&config.rate_limit));

        let state = AppState {
            orchestrator,
            store,
            validation: config.validation.clone(),
        };

        let router = Self::build_router(&config, state.clone(), rate_limiter);
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, rate_limiter: Arc<RateLimiterState>) -> Router {
        let api = Router::new()
            .route("/api/detect", post(detect))
            .route("/api/auth/login", post(login))
            .route("/api/stats", get(stats))
            .merge(setup_admin_router())
            .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

        let request_timeout = Duration::from_millis(config.upstream.timeout_ms) + REQUEST_TIMEOUT_SLACK;

        Router::new()
            .route("/health", get(health))
            .merge(api)
            .fallback(not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            circuit = %self.state.orchestrator.breaker().state(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}
