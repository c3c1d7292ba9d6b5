//! Journal entry routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerline_core::ledger::{AccountRef, CreateJournalInput, JournalLineInput, LedgerError};
use ledgerline_db::repositories::{
    EntryWithLines, JournalRepository, ReversalEligibility, ReversalHistory,
};
use ledgerline_shared::types::{ActorId, JournalEntryId, PageRequest};

use crate::{AppState, error::ApiError, middleware::Actor};

/// Creates the journal entry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entries", post(create_entry).get(list_entries))
        .route("/entries/{entry_id}", get(get_entry))
        .route("/entries/{entry_id}/post", post(post_entry))
        .route("/entries/{entry_id}/reverse", post(reverse_entry))
        .route("/entries/{entry_id}/discard", post(discard_entry))
        .route("/entries/{entry_id}/reversal", get(get_reversal))
}

fn journal(state: &AppState) -> JournalRepository {
    JournalRepository::new((*state.db).clone(), state.config.ledger.clone())
}

/// Request body for creating a draft entry.
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    /// Originating business process, e.g. `SALE`.
    pub source_type: String,
    /// The collaborator's record reference.
    pub source_id: String,
    /// Accounting date (YYYY-MM-DD).
    pub entry_date: NaiveDate,
    /// Entry description.
    #[serde(default)]
    pub description: String,
    /// Entry lines.
    pub lines: Vec<CreateLineRequest>,
    /// Whether a collaborator generated the entry (default: false).
    #[serde(default)]
    pub is_auto_generated: bool,
}

/// One requested line. Exactly one of `account_id` or `account_code` must be set.
#[derive(Debug, Deserialize)]
pub struct CreateLineRequest {
    /// Account primary key.
    pub account_id: Option<Uuid>,
    /// Account chart code.
    pub account_code: Option<String>,
    /// Line description.
    pub description: Option<String>,
    /// Debit amount as a decimal string.
    #[serde(default)]
    pub debit_amount: Decimal,
    /// Credit amount as a decimal string.
    #[serde(default)]
    pub credit_amount: Decimal,
}

impl CreateEntryRequest {
    /// Converts the request into a store input, resolving each line's account reference.
    fn into_input(self, created_by: ActorId) -> Result<CreateJournalInput, LedgerError> {
        let lines = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let account = AccountRef::from_parts(line.account_id, line.account_code.as_deref())
                    .ok_or(LedgerError::InvalidAccountReference {
                        line: i32::try_from(idx + 1).unwrap_or(i32::MAX),
                    })?;
                Ok(JournalLineInput {
                    account,
                    description: line.description,
                    debit: line.debit_amount,
                    credit: line.credit_amount,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(CreateJournalInput {
            source_type: self.source_type,
            source_id: self.source_id,
            entry_date: self.entry_date,
            description: self.description,
            lines,
            is_auto_generated: self.is_auto_generated,
            created_by: created_by.into_inner(),
        })
    }
}

/// Query parameters for listing entries.
///
/// With `source_type` and `source_id` the entries of one source record are
/// returned. Otherwise `from` and `to` select a page of entries by date.
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    /// Source type filter.
    pub source_type: Option<String>,
    /// Source record filter.
    pub source_id: Option<String>,
    /// First entry date (inclusive).
    pub from: Option<NaiveDate>,
    /// Last entry date (inclusive).
    pub to: Option<NaiveDate>,
    /// Page number (1-indexed, default: 1).
    pub page: Option<u32>,
    /// Entries per page (default: 50).
    pub per_page: Option<u32>,
}

/// Request body for reversing an entry.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    /// Why the entry is being reversed.
    pub reason: String,
}

/// Reversal history plus whether the entry can be reversed now.
#[derive(Debug, Serialize)]
pub struct ReversalInfoResponse {
    /// The original entry and its reversal, if any.
    #[serde(flatten)]
    pub history: ReversalHistory,
    /// Current eligibility.
    #[serde(flatten)]
    pub eligibility: ReversalEligibility,
}

async fn create_entry(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryWithLines>), ApiError> {
    let input = payload.into_input(actor.id())?;
    let entry = journal(&state).create_draft(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Response, ApiError> {
    let repo = journal(&state);

    match (query.source_type, query.source_id) {
        (Some(source_type), Some(source_id)) => {
            let entries = repo.get_by_source(&source_type, &source_id).await?;
            Ok(Json(entries).into_response())
        }
        (Some(_), None) | (None, Some(_)) => Err(ApiError::bad_request(
            "INVALID_QUERY",
            "source_type and source_id must be given together",
        )),
        (None, None) => {
            let (Some(from), Some(to)) = (query.from, query.to) else {
                return Err(ApiError::bad_request(
                    "INVALID_QUERY",
                    "Either source_type/source_id or from/to is required",
                ));
            };
            if from > to {
                return Err(ApiError::bad_request(
                    "INVALID_DATE_RANGE",
                    "from must not be after to",
                ));
            }
            let page = PageRequest::from_query(query.page, query.per_page);
            let entries = repo.list_by_date_range(from, to, page).await?;
            Ok(Json(entries).into_response())
        }
    }
}

async fn get_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryWithLines>, ApiError> {
    let entry = journal(&state)
        .get_by_id(JournalEntryId::from_uuid(entry_id))
        .await?;
    Ok(Json(entry))
}

async fn post_entry(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<EntryWithLines>, ApiError> {
    let entry = journal(&state)
        .post(JournalEntryId::from_uuid(entry_id), actor.id())
        .await?;
    Ok(Json(entry))
}

async fn reverse_entry(
    State(state): State<AppState>,
    actor: Actor,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<ReverseRequest>,
) -> Result<(StatusCode, Json<EntryWithLines>), ApiError> {
    let result = journal(&state)
        .reverse(
            JournalEntryId::from_uuid(entry_id),
            &payload.reason,
            actor.id(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(result.reversal)))
}

async fn discard_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    journal(&state)
        .discard(JournalEntryId::from_uuid(entry_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_reversal(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<ReversalInfoResponse>, ApiError> {
    let repo = journal(&state);
    let id = JournalEntryId::from_uuid(entry_id);

    let history = repo.get_reversal_history(id).await?;
    let eligibility = repo.can_reverse(id).await?;

    Ok(Json(ReversalInfoResponse {
        history,
        eligibility,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::test_support::{send, test_router};

    fn line(
        id: Option<Uuid>,
        code: Option<&str>,
        debit: Decimal,
        credit: Decimal,
    ) -> CreateLineRequest {
        CreateLineRequest {
            account_id: id,
            account_code: code.map(str::to_string),
            description: None,
            debit_amount: debit,
            credit_amount: credit,
        }
    }

    fn request(lines: Vec<CreateLineRequest>) -> CreateEntryRequest {
        CreateEntryRequest {
            source_type: "SALE".to_string(),
            source_id: "INV-1".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            description: "Invoice".to_string(),
            lines,
            is_auto_generated: false,
        }
    }

    #[test]
    fn test_into_input_resolves_references() {
        let id = Uuid::new_v4();
        let actor = ActorId::from_uuid(Uuid::new_v4());
        let input = request(vec![
            line(Some(id), None, dec!(10), Decimal::ZERO),
            line(None, Some(" 4101 "), Decimal::ZERO, dec!(10)),
        ])
        .into_input(actor)
        .unwrap();

        assert_eq!(input.lines[0].account, AccountRef::Id(id));
        assert_eq!(input.lines[1].account, AccountRef::Code("4101".to_string()));
        assert_eq!(input.lines[1].credit, dec!(10));
        assert_eq!(input.created_by, actor.into_inner());
    }

    #[test]
    fn test_into_input_rejects_ambiguous_reference() {
        let err = request(vec![
            line(None, Some("1101"), dec!(10), Decimal::ZERO),
            line(Some(Uuid::new_v4()), Some("4101"), Decimal::ZERO, dec!(10)),
        ])
        .into_input(ActorId::system())
        .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidAccountReference { line: 2 }));
    }

    #[test]
    fn test_amounts_deserialize_from_strings() {
        let payload: CreateEntryRequest = serde_json::from_value(json!({
            "source_type": "SALE",
            "source_id": "INV-7",
            "entry_date": "2026-10-19",
            "lines": [
                {"account_code": "1103", "debit_amount": "1000000.00"},
                {"account_code": "4101", "credit_amount": "1000000.00"}
            ]
        }))
        .unwrap();

        assert_eq!(payload.lines[0].debit_amount, dec!(1000000));
        assert_eq!(payload.lines[0].credit_amount, Decimal::ZERO);
        assert!(payload.description.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_missing_reference_is_400() {
        let body = json!({
            "source_type": "SALE",
            "source_id": "INV-8",
            "entry_date": "2026-10-19",
            "lines": [{"debit_amount": "5.00"}]
        });
        let (status, body) = send(
            test_router(),
            Request::post("/api/v1/entries")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ACCOUNT_REFERENCE");
    }

    #[tokio::test]
    async fn test_list_requires_complete_filter() {
        let (status, body) = send(
            test_router(),
            Request::get("/api/v1/entries?source_type=SALE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_QUERY");

        let (status, body) = send(
            test_router(),
            Request::get("/api/v1/entries?from=2026-10-20&to=2026-10-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_DATE_RANGE");
    }

    #[tokio::test]
    async fn test_storage_failure_renders_500() {
        let (status, body) = send(
            test_router(),
            Request::get(format!("/api/v1/entries/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "DATABASE_ERROR");
    }
}
