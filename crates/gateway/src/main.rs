//! CiteForge Tool Gateway
//!
//! Exposes the citation tools to agent hosts over HTTP/JSON.
//! Handles:
//! - Tool catalogue and dispatch
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    error_handling::HandleErrorLayer,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    BoxError, Router,
};
use citeforge_citation::{CitationGraphExpander, ExpanderConfig};
use citeforge_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics, AppError, CitationProvider, PaperSearch, SemanticScholarProvider, VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub expander: Arc<CitationGraphExpander>,
    pub search: Arc<dyn PaperSearch>,
    pub provider_name: String,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn CitationProvider>,
        search: Arc<dyn PaperSearch>,
    ) -> Self {
        let expander_config = ExpanderConfig {
            max_concurrent_lookups: config.expansion.max_concurrent_lookups,
        };
        let provider_name = provider.name().to_string();

        Self {
            config: Arc::new(config),
            expander: Arc::new(CitationGraphExpander::new(provider, expander_config)),
            search,
            provider_name,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match std::env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path),
        Err(_) => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        version = VERSION,
        "Starting CiteForge gateway"
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .set_buckets_for_metric(
                Matcher::Suffix("expansion_duration_seconds".to_string()),
                metrics::EXPANSION_BUCKETS,
            )?
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Citation provider (shared HTTP client and outbound rate limiter)
    let provider = Arc::new(SemanticScholarProvider::new(&config.provider)?);
    info!(
        base_url = %config.provider.base_url,
        authenticated = config.provider.api_key.is_some(),
        "Semantic Scholar provider ready"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState::new(config, provider.clone(), provider);

    // Build the router
    let app = create_router(state);

    // Start the server
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Turn errors from the tower middleware stack into structured tool errors
fn handle_middleware_error(err: BoxError, request_timeout: Duration) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Timeout {
            timeout_ms: request_timeout.as_millis() as u64,
        }
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let request_timeout = state.config.request_timeout();

    // Tool routes
    let mut tool_routes = Router::new()
        .route("/tools", get(handlers::tools::list_tools))
        .route("/tools/call", post(handlers::tools::call_tool))
        .route("/tools/analyze_citations", post(handlers::tools::analyze_citations))
        .route(
            "/tools/search_semantic_scholar",
            post(handlers::tools::search_semantic_scholar),
        );

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        tool_routes = tool_routes.route_layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (not rate limited)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", tool_routes)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    handle_middleware_error(err, request_timeout)
                }))
                .timeout(request_timeout),
        )
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
