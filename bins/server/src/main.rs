//! Ledgerline API Server
//!
//! Serves the HTTP API and, when enabled, runs the scheduled drift check.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledgerline_api::{AppState, create_router};
use ledgerline_db::{ReconciliationRepository, StoreError, connect};
use ledgerline_shared::{AppConfig, AppError, ReconcileConfig};

const DEFAULT_LOG_FILTER: &str = "ledgerline=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log.json);

    let db = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    if config.reconcile.enabled {
        let repo = ReconciliationRepository::new(db.clone(), config.ledger.clone());
        tokio::spawn(run_scheduled_reconciliation(repo, config.reconcile.clone()));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
    };
    let app = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Validates balances on a fixed interval, optionally repairing drift.
///
/// A failed run is logged and the loop carries on with the next tick.
async fn run_scheduled_reconciliation(repo: ReconciliationRepository, config: ReconcileConfig) {
    let period = Duration::from_secs(config.interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_secs = period.as_secs(),
        auto_fix = config.auto_fix,
        "Scheduled reconciliation started"
    );

    loop {
        ticker.tick().await;

        let report = match repo.validate_balances().await {
            Ok(report) => report,
            Err(e) => {
                log_run_failure("Scheduled balance validation failed", e);
                continue;
            }
        };

        if report.is_clean() {
            info!(run_id = %report.run_id, checked = report.checked, "Ledger in sync");
            continue;
        }

        warn!(
            run_id = %report.run_id,
            drifted = report.drifted,
            total_absolute_drift = %report.total_absolute_drift,
            "Balance drift detected"
        );

        if config.auto_fix {
            match repo.auto_fix_drift(&report).await {
                Ok(fixed) => info!(run_id = %report.run_id, fixed, "Drift repaired"),
                Err(e) => tracing::info_span!("drift_repair", run_id = %report.run_id)
                    .in_scope(|| log_run_failure("Drift repair failed", e)),
            }
        }
    }
}

/// Retryable lock conflicts log as warnings, everything else as errors.
fn failure_level(err: &AppError) -> Level {
    if err.is_retryable() {
        Level::WARN
    } else {
        Level::ERROR
    }
}

fn log_run_failure(message: &str, err: StoreError) {
    let err = AppError::from(err);
    if failure_level(&err) == Level::WARN {
        warn!(code = err.error_code(), error = %err, "{}", message);
    } else {
        error!(code = err.error_code(), error = %err, "{}", message);
    }
}
