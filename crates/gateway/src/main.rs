//! SONAR Deposit Gateway
//!
//! HTTP entry point of the deposit editor.
//! Handles:
//! - Deposit step editing and publication
//! - File uploads, versions, order and labels
//! - Metadata import from swisscovery and PDF extraction
//! - Observability (logging, metrics, tracing) and rate limiting

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use sonar_deposit_common::{
    client::{create_backend, DepositBackend},
    config::AppConfig,
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, UPLOAD_BUCKETS},
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn DepositBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    let _telemetry = telemetry::init_tracing(&config.observability)?;

    info!("Starting SONAR deposit gateway v{}", sonar_deposit_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        install_prometheus(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    let backend = create_backend(&config.backend)?;
    info!(backend = backend.name(), url = %config.backend.base_url, "Backend configured");

    // Create app state
    let state = AppState {
        config: config.clone(),
        backend,
    };

    // Build the router
    let app = create_router(state)?;

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // In-flight requests get `shutdown_timeout` to finish once a signal arrives
    let shutdown_started = Arc::new(Notify::new());
    let server = {
        let shutdown_started = shutdown_started.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                    shutdown_started.notify_one();
                })
                .await
        }
    };
    let grace_period = config.shutdown_timeout();

    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(grace_period).await;
        } => {
            warn!(timeout_secs = grace_period.as_secs(), "Shutdown timed out, dropping open connections");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn install_prometheus(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_backend_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_upload_duration_seconds", METRICS_PREFIX)),
            UPLOAD_BUCKETS,
        )?
        .install()?;
    info!(port = port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = usize::try_from(config.upload.max_file_size_bytes()).unwrap_or(usize::MAX);
    // Oversized parts of a batch are reported per file, not rejected as a whole
    let batch_limit = usize::try_from(config.upload.max_batch_bytes()).unwrap_or(usize::MAX);

    // API routes
    let mut api_routes = Router::new()
        // Deposit endpoints
        .route("/deposits", post(handlers::deposits::create_deposit))
        .route("/deposits/{pid}", get(handlers::deposits::get_deposit))
        .route(
            "/deposits/{pid}/steps/{step}",
            get(handlers::deposits::get_step).put(handlers::deposits::save_step),
        )
        .route("/deposits/{pid}/publish", post(handlers::deposits::publish))
        .route(
            "/deposits/{pid}/import/swisscovery",
            post(handlers::deposits::import_swisscovery),
        )
        .route("/deposits/{pid}/import/pdf", post(handlers::deposits::import_pdf))

        // File endpoints (deposits and documents)
        .route(
            "/records/{record_type}/{pid}/files",
            get(handlers::files::list_files)
                .put(handlers::files::reorder_files)
                .merge(
                    post(handlers::files::upload_files).layer(DefaultBodyLimit::max(batch_limit)),
                ),
        )
        .route(
            "/records/{record_type}/{pid}/files/{key}",
            put(handlers::files::upload_version).delete(handlers::files::delete_file),
        )
        .route(
            "/records/{record_type}/{pid}/files/{key}/label",
            put(handlers::files::update_label),
        )

        // Public document endpoints
        .route("/documents/{pid}/other-files", get(handlers::files::other_files))
        .route("/documents/{pid}/stats", get(handlers::files::stats))

        // Reference endpoints
        .route("/schemas/{record_type}/{section}", get(handlers::reference::schema))
        .route("/identifiers/validate", post(handlers::reference::validate_identifier))
        .route("/swisscovery/types", get(handlers::reference::swisscovery_types))
        .layer(DefaultBodyLimit::max(body_limit));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?;
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Ok(Router::new()
        // Health endpoints (no rate limit)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
