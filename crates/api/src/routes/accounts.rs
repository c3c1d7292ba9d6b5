//! Chart-of-accounts and balance routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerline_core::audit::SyncEntityType;
use ledgerline_core::ledger::AccountType;
use ledgerline_core::reconciliation::{AccountDrift, BalanceComparison, DriftDetector};
use ledgerline_db::entities::{accounts, balance_sync_log};
use ledgerline_db::repositories::{
    AccountFilter, AccountRepository, AuditRepository, CreateAccountInput, SyncOutcome,
    SyncRepository,
};
use ledgerline_shared::types::{AccountId, ReconciliationRunId};

use crate::{AppState, error::ApiError};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/balances", get(list_balances))
        .route("/accounts/code/{code}", get(get_account_by_code))
        .route("/accounts/{account_id}", get(get_account))
        .route("/accounts/{account_id}/balance", get(get_account_balance))
        .route("/accounts/{account_id}/sync", post(sync_account))
        .route("/accounts/{account_id}/deactivate", post(deactivate_account))
        .route("/accounts/{account_id}/audit", get(list_account_audit))
}

/// Query parameters for listing accounts.
#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    /// Filter by account type.
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    /// Filter by active status.
    pub active: Option<bool>,
    /// Filter by header flag.
    pub header: Option<bool>,
}

/// Request body for creating an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Unique account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type: asset, liability, equity, revenue, expense.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Code of the parent header account.
    pub parent_code: Option<String>,
    /// Whether the account only rolls up its children (default: false).
    #[serde(default)]
    pub is_header: bool,
}

/// Response for an account.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: Uuid,
    /// Account code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Parent account ID.
    pub parent_id: Option<Uuid>,
    /// Depth in the hierarchy, 1 for top-level accounts.
    pub level: i32,
    /// Whether the account is a header.
    pub is_header: bool,
    /// Whether the account is active.
    pub is_active: bool,
    /// Cached balance.
    pub balance: Decimal,
    /// Optimistic lock version.
    pub version: i64,
}

impl From<accounts::Model> for AccountResponse {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            account_type: model.account_type.into(),
            parent_id: model.parent_id,
            level: model.level,
            is_header: model.is_header,
            is_active: model.is_active,
            balance: model.balance,
            version: model.version,
        }
    }
}

/// Cached balance entry for the bulk listing.
#[derive(Debug, Serialize)]
pub struct BalanceEntry {
    /// Account ID.
    pub account_id: Uuid,
    /// Account code.
    pub code: String,
    /// Whether the account is a header.
    pub is_header: bool,
    /// Cached balance.
    pub balance: Decimal,
}

async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let accounts = repo
        .list_accounts(AccountFilter {
            account_type: query.account_type,
            is_active: query.active,
            is_header: query.header,
        })
        .await?;
    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let account = repo
        .create_account(CreateAccountInput {
            code: payload.code,
            name: payload.name,
            account_type: payload.account_type,
            parent_code: payload.parent_code,
            is_header: payload.is_header,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn list_balances(
    State(state): State<AppState>,
) -> Result<Json<Vec<BalanceEntry>>, ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let balances = repo
        .get_balances()
        .await?
        .into_iter()
        .map(|a| BalanceEntry {
            account_id: a.id,
            code: a.code,
            is_header: a.is_header,
            balance: a.balance,
        })
        .collect();
    Ok(Json(balances))
}

async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let account = repo.get_by_id(AccountId::from_uuid(account_id)).await?;
    Ok(Json(account.into()))
}

async fn get_account_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let account = repo.get_by_code(&code).await?;
    Ok(Json(account.into()))
}

/// Cached balance next to the value derived from the ledger.
async fn get_account_balance(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountDrift>, ApiError> {
    let id = AccountId::from_uuid(account_id);
    let account = AccountRepository::new((*state.db).clone())
        .get_by_id(id)
        .await?;
    let derived = SyncRepository::new((*state.db).clone())
        .derive_account_balance(id, None)
        .await?;

    Ok(Json(DriftDetector::compare(
        BalanceComparison {
            account_id: account.id,
            code: account.code,
            name: account.name,
            is_header: account.is_header,
            cached: account.balance,
            derived,
        },
        state.config.ledger.balance_tolerance,
    )))
}

async fn sync_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<SyncOutcome>, ApiError> {
    let outcome = SyncRepository::new((*state.db).clone())
        .sync_account(AccountId::from_uuid(account_id), ReconciliationRunId::new())
        .await?;
    Ok(Json(outcome))
}

async fn deactivate_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let repo = AccountRepository::new((*state.db).clone());
    let account = repo.deactivate(AccountId::from_uuid(account_id)).await?;
    Ok(Json(account.into()))
}

async fn list_account_audit(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Vec<balance_sync_log::Model>>, ApiError> {
    let records = AuditRepository::new((*state.db).clone())
        .list_for_entity(SyncEntityType::Account, account_id)
        .await?;
    Ok(Json(records))
}
