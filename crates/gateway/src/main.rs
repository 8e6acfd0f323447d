//! ArticleForge API Gateway
//!
//! The entry point for all external article reads and fragment
//! writes. Handles:
//! - Content-type negotiation
//! - Publish/unpublish visibility
//! - Request routing
//! - Observability (logging, metrics, tracing)
//!
//! Authentication happens upstream; the gateway only consumes the
//! injected consumer-group header.

mod handlers;
mod negotiate;

use axum::{
    routing::{get, post},
    Router,
};
use articleforge_common::{
    config::AppConfig,
    db::DbPool,
    events::EventSink,
    metrics,
    schemas::SchemaRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub registry: Arc<SchemaRegistry>,
    pub events: Arc<EventSink>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting ArticleForge API Gateway v{}", articleforge_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    // Schemas load once at boot; a bad schema file aborts startup
    info!(dir = %config.schemas.dir, "Loading schemas...");
    let registry = Arc::new(SchemaRegistry::from_dir(&config.schemas.dir)?);

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Outbound notification sink
    let events = Arc::new(EventSink::from_config(&config.events).await);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        registry,
        events,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
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

    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Article endpoints
        .route("/articles/{msid}", get(handlers::articles::latest_article))
        .route("/articles/{msid}/versions", get(handlers::articles::version_history))
        .route(
            "/articles/{msid}/versions/{version}",
            get(handlers::articles::article_version),
        )
        .route("/articles/{msid}/related", get(handlers::articles::related_articles))

        // Fragment endpoints (privileged)
        .route(
            "/articles/{msid}/fragments/{key}",
            post(handlers::fragments::add_fragment)
                .delete(handlers::fragments::delete_fragment),
        );

    // Compose the app
    api_routes
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
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
