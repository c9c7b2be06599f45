//! SubTrack Backend
//!
//! REST backend with MongoDB persistence, JWT auth and an in-process request shield.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod shield;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::TokenService;
use config::{Config, CorsOrigins, LogFormat};
use db::{DbHandle, MongoUserRepository, UserRepository};
use shield::Shield;

/// How often idle rate limit buckets are swept.
const SHIELD_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<TokenService>,
    pub shield: Arc<Shield>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    init_tracing(&config);

    tracing::info!("Starting SubTrack Backend");
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.mongo_uri.is_empty() {
        tracing::warn!("MONGO_URI is not set. Database-backed routes will be unavailable!");
    }

    // Connect in the background; the server starts either way
    let db = DbHandle::new();
    db::spawn_connect(config.clone(), db.clone());

    let state = AppState {
        users: Arc::new(MongoUserRepository::new(db)),
        tokens: Arc::new(TokenService::from_config(&config)),
        shield: Arc::new(Shield::new(&config.shield)),
        config: config.clone(),
    };
    shield::spawn_cleanup(state.shield.clone(), SHIELD_SWEEP_INTERVAL);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        "Server is running on http://localhost:{}",
        config.bind_addr.port()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over `LOG_LEVEL`.
fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Create the application router with all routes.
///
/// Middleware runs outermost first: trace, body limit, request log, CORS,
/// shield, then the routes. The body limit is enforced when a handler reads
/// the body, so oversized requests get the JSON error envelope.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let auth_routes = Router::new()
        .route("/sign-up", post(api::sign_up))
        .route("/sign-in", post(api::sign_in))
        .route("/sign-out", post(api::sign_out));

    let user_routes = Router::new()
        .route("/", get(api::list_users))
        .merge(
            Router::new()
                .route(
                    "/{id}",
                    get(api::get_user)
                        .put(api::update_user)
                        .delete(api::delete_user),
                )
                .route_layer(from_fn_with_state(state.clone(), auth::require_auth)),
        );

    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(from_fn(middleware::request_log::log_request))
        .layer(cors_layer(&config.cors_origins))
        .layer(from_fn_with_state(state.shield.clone(), shield::protect));

    Router::new()
        .route("/api/example", get(api::get_example))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/users", user_routes)
        .route("/health", get(health_check))
        .fallback(api::not_found)
        .layer(layers)
        .with_state(state)
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
