//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for the journal, balances and reconciliation
//! - The acting-user extractor
//! - JSON error rendering

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::HeaderName;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use ledgerline_shared::AppConfig;

pub use error::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Loaded application configuration.
    pub config: Arc<AppConfig>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TimeoutLayer::new(timeout))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
