//! Rolegate Portal
//!
//! Web front end that signs users in with Azure AD and shows content chosen
//! by the roles assigned to them in the configuration store.
//!
//! ## Routes
//!
//! - `GET /` - Login screen, or role-gated content when signed in
//! - `GET /auth/login` - Redirect to the identity provider
//! - `GET /auth/callback` - Complete sign-in and create a session
//! - `POST /auth/logout` - End the session
//! - `POST /roles/refresh` - Drop cached roles for the session
//! - `GET /api/v1/me` - Signed-in user and roles as JSON
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics (when enabled)

mod config;
mod error;
mod extractors;
mod gate;
mod handlers;
mod state;
mod views;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rolegate_appconfig::AppConfigClient;
use rolegate_auth_core::AzureAdProvider;
use rolegate_roles::{ConfigStore, MemoryConfigStore, RoleFile};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("portal=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rolegate Portal");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        role_cache_ttl_secs = config.role_cache_ttl.as_secs(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let store = build_store(&config).await?;
    let provider = Arc::new(AzureAdProvider::new(Arc::new(config.auth.clone())));
    let http_port = config.http_port;

    // Create application state
    let state = AppState::new(config, provider, store)?;

    let app = build_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Role store for the configured connection, or an in-memory store
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn ConfigStore>> {
    if let Some(connection) = &config.store {
        let client = AppConfigClient::connect(connection);
        tracing::info!(
            endpoint = %connection.endpoint(),
            auth = connection.auth_kind(),
            "Using App Configuration role store"
        );
        // Unreachable stores degrade to "no roles" per request
        if let Err(e) = client.probe().await {
            tracing::warn!(error = %e, "Role store probe failed");
        }
        return Ok(Arc::new(client));
    }

    let store = match &config.roles_file {
        Some(path) => {
            let file = RoleFile::load(path)?;
            MemoryConfigStore::from_assignments(file.assignments())
        }
        None => MemoryConfigStore::new(),
    };
    tracing::warn!(
        users = store.len(),
        "No App Configuration store configured, serving roles from memory"
    );
    Ok(Arc::new(store))
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    let pages = Router::new()
        .route("/", get(handlers::index))
        .route("/auth/login", get(handlers::login))
        .route("/auth/callback", get(handlers::callback))
        .route("/auth/logout", post(handlers::logout))
        .route("/roles/refresh", post(handlers::refresh_roles))
        .route("/api/v1/me", get(handlers::me));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(pages)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "rolegate_role_cache_hits",
        "Role lookups served from a session cache"
    );
    metrics::describe_counter!(
        "rolegate_role_cache_misses",
        "Role lookups that read the configuration store"
    );
    metrics::describe_counter!(
        "rolegate_role_lookup_failures",
        "Role lookups that failed, by reason"
    );
    metrics::describe_counter!("rolegate_logins_total", "Sign-in attempts by outcome");

    Ok(handle)
}

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
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
