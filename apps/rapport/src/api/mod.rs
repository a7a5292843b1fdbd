//! # Rapport HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET /progressions` - List progressions
//! - `POST /progressions` - Open the progression for an organization
//! - `GET /progressions/{id}` - One progression
//! - `DELETE /progressions/{id}` - Delete a progression and its records
//! - `GET /progressions/{id}/stage` - Progress toward the next stage
//! - `GET /progressions/{id}/history` - Milestones, activities, interactions, patterns
//! - `POST /progressions/{id}/milestones` - Record a milestone
//! - `POST /progressions/{id}/trust-activities` - Record a trust activity
//! - `POST /progressions/{id}/communication-patterns` - Record a communication pattern
//! - `GET|POST /progressions/{id}/health-snapshots` - List / record health snapshots
//! - `POST /progressions/{id}/notes` - Annotate
//! - `POST /progressions/{id}/deactivate` - Deactivate
//! - `POST /interactions` - Log an interaction
//! - `POST /export` - Canonical export (base64 + checksum)
//! - `GET /hash` - BLAKE3 hash of the canonical export
//!
//! ## Security
//!
//! Configured through [`SecurityConfig`]: optional bearer API key, global
//! rate limit, CORS origins. Request bodies are capped at 2 MiB.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, keys_match};
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    ApiResponse, ExportResponse, HashResponse, HealthResponse, OpenRequest, status_for,
};

use crate::config::SecurityConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use rapport_core::{RapportError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the session.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `Some("*")`: any origin
/// - `Some(list)`: the comma-separated origins that parse
/// - `None`, or a list with no valid origin: localhost only
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins.map(str::trim) {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins; do not use this in production");
            CorsLayer::permissive()
        }
        Some(list) => {
            let allowed: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: allowing origin {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed)
                    .allow_methods(ALLOWED_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if an API key is configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/progressions",
            get(handlers::list_progressions_handler).post(handlers::open_progression_handler),
        )
        .route(
            "/progressions/{id}",
            get(handlers::progression_handler).delete(handlers::delete_progression_handler),
        )
        .route("/progressions/{id}/stage", get(handlers::stage_handler))
        .route("/progressions/{id}/history", get(handlers::history_handler))
        .route(
            "/progressions/{id}/milestones",
            post(handlers::record_milestone_handler),
        )
        .route(
            "/progressions/{id}/trust-activities",
            post(handlers::record_trust_activity_handler),
        )
        .route(
            "/progressions/{id}/communication-patterns",
            post(handlers::record_pattern_handler),
        )
        .route(
            "/progressions/{id}/health-snapshots",
            get(handlers::list_snapshots_handler).post(handlers::record_snapshot_handler),
        )
        .route("/progressions/{id}/notes", post(handlers::annotate_handler))
        .route(
            "/progressions/{id}/deactivate",
            post(handlers::deactivate_handler),
        )
        .route("/interactions", post(handlers::record_interaction_handler))
        .route("/export", post(handlers::export_handler))
        .route("/hash", get(handlers::hash_handler));

    // Innermost: runs last on the way in.
    match security.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                ApiKey::new(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => {
            tracing::warn!(
                "API key authentication DISABLED - all endpoints are publicly accessible! \
                 Set RAPPORT_API_KEY or [security] api_key to enable it."
            );
        }
    }

    if security.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", security.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(security.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer(security.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `state` until Ctrl+C.
///
/// The caller keeps a clone of `state` to flush the session afterwards.
pub async fn run_server(
    addr: &str,
    state: AppState,
    security: &SecurityConfig,
) -> Result<(), RapportError> {
    let router = create_router(state, security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RapportError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Rapport HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RapportError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
