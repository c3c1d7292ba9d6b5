//! Reconciliation routes.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use ledgerline_core::reconciliation::{DriftReport, HealthReport};
use ledgerline_db::repositories::{IntegrityReport, ReconciliationRepository};

use crate::{AppState, error::ApiError};

/// Creates the reconciliation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reconcile", post(validate_balances))
        .route("/reconcile/fix", post(fix_drift))
        .route("/reconcile/health", get(health_report))
        .route("/reconcile/integrity", get(integrity_report))
}

fn reconciliation(state: &AppState) -> ReconciliationRepository {
    ReconciliationRepository::new((*state.db).clone(), state.config.ledger.clone())
}

/// Result of a validate-then-fix run.
#[derive(Debug, Serialize)]
pub struct FixResponse {
    /// Accounts whose cache was rewritten.
    pub fixed: usize,
    /// The report the fixes were applied from.
    pub report: DriftReport,
}

async fn validate_balances(
    State(state): State<AppState>,
) -> Result<Json<DriftReport>, ApiError> {
    let report = reconciliation(&state).validate_balances().await?;
    Ok(Json(report))
}

async fn fix_drift(State(state): State<AppState>) -> Result<Json<FixResponse>, ApiError> {
    let repo = reconciliation(&state);
    let report = repo.validate_balances().await?;
    let fixed = repo.auto_fix_drift(&report).await?;
    Ok(Json(FixResponse { fixed, report }))
}

async fn health_report(State(state): State<AppState>) -> Result<Json<HealthReport>, ApiError> {
    let report = reconciliation(&state).health_report().await?;
    Ok(Json(report))
}

async fn integrity_report(
    State(state): State<AppState>,
) -> Result<Json<IntegrityReport>, ApiError> {
    let report = reconciliation(&state).integrity_report().await?;
    Ok(Json(report))
}
