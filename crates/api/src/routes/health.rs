//! Liveness endpoint.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `up` if the database answered a ping, otherwise `down`.
    pub database: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            "down"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
