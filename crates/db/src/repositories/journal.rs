//! Journal entry store: drafts, posting, reversal and discard.
//!
//! Lines are only ever inserted. Posting and reversal never touch stored
//! lines; they change the entry status and push the resulting deltas into
//! the cached balances inside the same transaction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    Statement, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use ledgerline_core::audit::{EntrySnapshot, SyncAction, SyncLogRecord};
use ledgerline_core::ledger::{
    AccountInfo, AccountRef, CreateJournalInput, EntryStatus, EntryTotals, JournalService,
    LedgerError, ReversalInput, ReversalService, StoredLine, ValidatedLine, posting_deltas,
};
use ledgerline_shared::LedgerConfig;
use ledgerline_shared::types::{ActorId, JournalEntryId, PageRequest, PageResponse};

use crate::entities::sea_orm_active_enums::JournalStatus;
use crate::entities::{accounts, journal_entries, journal_lines};

use super::account::{AccountRepository, account_info};
use super::audit::AuditRepository;
use super::error::StoreError;
use super::sync::SyncRepository;

/// A journal entry with its lines in line order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryWithLines {
    /// Entry header.
    #[serde(flatten)]
    pub entry: journal_entries::Model,
    /// Lines ordered by line number.
    pub lines: Vec<journal_lines::Model>,
}

/// Result of reversing an entry.
#[derive(Debug, Clone, Serialize)]
pub struct ReversalResult {
    /// The original entry, now `REVERSED`.
    pub original: EntryWithLines,
    /// The posted reversal entry.
    pub reversal: EntryWithLines,
}

/// An entry and the entry that reversed it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ReversalHistory {
    /// The original entry.
    pub original: EntryWithLines,
    /// Its reversal.
    pub reversal: Option<EntryWithLines>,
}

/// Whether an entry can be reversed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReversalEligibility {
    /// True if `reverse` would accept the entry.
    pub can_reverse: bool,
    /// Human-readable explanation.
    pub reason: String,
}

/// Journal entry repository.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
    ledger: LedgerConfig,
}

impl JournalRepository {
    /// Creates a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Creates a draft entry.
    ///
    /// Drafts have no balance effect. Their totals are stored for display,
    /// and balance is only enforced by [`Self::post`].
    ///
    /// # Errors
    ///
    /// Returns a validation error if the request is malformed or references
    /// an unknown, inactive or header account.
    pub async fn create_draft(
        &self,
        input: CreateJournalInput,
    ) -> Result<EntryWithLines, StoreError> {
        let accounts = self.resolve_accounts(&input).await?;
        let validated = JournalService::validate_draft(&input, |account| {
            let found = match account {
                AccountRef::Id(id) => accounts.by_id.get(id),
                AccountRef::Code(code) => accounts.by_code.get(code),
            };
            found
                .cloned()
                .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
        })?;

        let totals = EntryTotals::new(
            validated.iter().map(|l| l.debit).sum(),
            validated.iter().map(|l| l.credit).sum(),
            self.ledger.balance_tolerance,
        );

        let txn = self.db.begin().await?;

        let entry_number = next_entry_number(&txn, input.entry_date).await?;
        let entry = insert_entry(
            &txn,
            NewEntry {
                entry_number,
                source_type: JournalService::normalize_source_type(&input.source_type),
                source_id: input.source_id.trim().to_string(),
                entry_date: input.entry_date,
                description: input.description,
                totals,
                is_auto_generated: input.is_auto_generated,
                created_by: input.created_by,
                reversal_of_id: None,
            },
            &validated,
        )
        .await?;

        txn.commit().await?;

        tracing::info!(
            entry_id = %entry.entry.id,
            entry_number = %entry.entry.entry_number,
            source_type = %entry.entry.source_type,
            source_id = %entry.entry.source_id,
            "Draft journal entry created"
        );

        Ok(entry)
    }

    /// Posts a draft entry and updates the cached balances atomically.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `EntryNotFound` if the entry does not exist or was discarded
    /// - `CannotPost` if the entry is not a draft
    /// - `Unbalanced` if debits and credits differ beyond the tolerance
    /// - `ConcurrentModification` on lock conflicts (retryable)
    pub async fn post(
        &self,
        id: JournalEntryId,
        posted_by: ActorId,
    ) -> Result<EntryWithLines, StoreError> {
        let txn = self.db.begin().await?;

        let entry = find_live_entry_locked(&txn, id.into_inner()).await?;
        let posted = self
            .apply_posting(&txn, entry, posted_by.into_inner(), Utc::now())
            .await?;
        let lines = load_lines(&txn, posted.id).await?;

        txn.commit().await?;

        tracing::info!(
            entry_id = %posted.id,
            entry_number = %posted.entry_number,
            total = %posted.total_debit,
            posted_by = %posted_by,
            "Journal entry posted"
        );

        Ok(EntryWithLines {
            entry: posted,
            lines,
        })
    }

    /// Reverses a posted entry with a new entry carrying the inverted lines.
    ///
    /// The reversal is created and posted in the same transaction that marks
    /// the original `REVERSED`. The original's lines are left untouched.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `EntryNotFound` if the entry does not exist or was discarded
    /// - `AlreadyReversed` / `CannotReverse` if the entry is not posted
    /// - `MissingReversalReason` if the reason is blank
    pub async fn reverse(
        &self,
        id: JournalEntryId,
        reason: &str,
        reversed_by: ActorId,
    ) -> Result<ReversalResult, StoreError> {
        let txn = self.db.begin().await?;

        let original = find_live_entry_locked(&txn, id.into_inner()).await?;
        JournalService::validate_can_reverse(original.id, original.status.into(), reason)?;

        let original_lines = load_lines(&txn, original.id).await?;
        let stored: Vec<StoredLine> = original_lines.iter().map(stored_line).collect();
        if !ReversalService::validate_reversal(&stored, self.ledger.balance_tolerance) {
            return Err(LedgerError::Internal(format!(
                "Lines of entry {} no longer balance",
                original.entry_number
            ))
            .into());
        }

        let now = Utc::now();
        let output = ReversalService::create_reversing_entry(&ReversalInput {
            original_entry_id: original.id,
            original_entry_number: original.entry_number.clone(),
            original_description: original.description.clone(),
            original_lines: stored,
            reason: reason.trim().to_string(),
            reversed_at: now,
        });

        let totals = EntryTotals::new(
            output.lines.iter().map(|l| l.debit).sum(),
            output.lines.iter().map(|l| l.credit).sum(),
            self.ledger.balance_tolerance,
        );
        let draft = insert_entry(
            &txn,
            NewEntry {
                entry_number: output.entry_number,
                source_type: output.source_type.to_string(),
                source_id: output.source_id,
                entry_date: now.date_naive(),
                description: output.description,
                totals,
                is_auto_generated: true,
                created_by: reversed_by.into_inner(),
                reversal_of_id: Some(original.id),
            },
            &output.lines,
        )
        .await?;

        let reversal = self
            .apply_posting(&txn, draft.entry, reversed_by.into_inner(), now)
            .await?;

        let before = entry_snapshot(&original);
        let mut active: journal_entries::ActiveModel = original.into();
        active.status = Set(JournalStatus::Reversed);
        active.reversed_by = Set(Some(reversed_by.into_inner()));
        active.reversed_at = Set(Some(now.into()));
        active.reversal_reason = Set(Some(reason.trim().to_string()));
        active.reversed_by_entry_id = Set(Some(reversal.id));
        active.updated_at = Set(now.into());
        let original = active.update(&txn).await?;

        AuditRepository::append(
            &txn,
            &SyncLogRecord::entry_transition(
                original.id,
                SyncAction::Update,
                reversal.id,
                Some(&before),
                Some(&entry_snapshot(&original)),
            ),
        )
        .await?;

        txn.commit().await?;

        tracing::info!(
            entry_id = %original.id,
            reversal_id = %reversal.id,
            reversal_number = %reversal.entry_number,
            reversed_by = %reversed_by,
            "Journal entry reversed"
        );

        Ok(ReversalResult {
            original: EntryWithLines {
                entry: original,
                lines: original_lines,
            },
            reversal: EntryWithLines {
                entry: reversal,
                lines: draft.lines,
            },
        })
    }

    /// Discards a draft. Discarded drafts are no longer visible.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist or was already
    /// discarded, or `CanOnlyDiscardDraft` if it was posted.
    pub async fn discard(&self, id: JournalEntryId) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;

        let entry = find_live_entry_locked(&txn, id.into_inner()).await?;
        JournalService::validate_can_discard(entry.id, entry.status.into())?;

        let before = entry_snapshot(&entry);
        let now = Utc::now().into();
        let mut active: journal_entries::ActiveModel = entry.into();
        active.discarded_at = Set(Some(now));
        active.updated_at = Set(now);
        let entry = active.update(&txn).await?;

        AuditRepository::append(
            &txn,
            &SyncLogRecord::entry_transition(
                entry.id,
                SyncAction::Delete,
                entry.id,
                Some(&before),
                None,
            ),
        )
        .await?;

        txn.commit().await?;

        tracing::info!(entry_id = %entry.id, entry_number = %entry.entry_number, "Draft discarded");
        Ok(())
    }

    /// Gets an entry with its lines.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist or was discarded.
    pub async fn get_by_id(&self, id: JournalEntryId) -> Result<EntryWithLines, StoreError> {
        let entry = journal_entries::Entity::find_by_id(id.into_inner())
            .filter(journal_entries::Column::DiscardedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or(LedgerError::EntryNotFound(id.into_inner()))?;
        let lines = load_lines(&self.db, entry.id).await?;

        Ok(EntryWithLines { entry, lines })
    }

    /// Lists the entries recorded for a collaborator's source document,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_by_source(
        &self,
        source_type: &str,
        source_id: &str,
    ) -> Result<Vec<EntryWithLines>, StoreError> {
        let entries = journal_entries::Entity::find()
            .filter(
                journal_entries::Column::SourceType
                    .eq(JournalService::normalize_source_type(source_type)),
            )
            .filter(journal_entries::Column::SourceId.eq(source_id.trim()))
            .filter(journal_entries::Column::DiscardedAt.is_null())
            .order_by_asc(journal_entries::Column::CreatedAt)
            .order_by_asc(journal_entries::Column::Id)
            .all(&self.db)
            .await?;

        attach_lines(&self.db, entries).await
    }

    /// Lists entries dated within `[from, to]`, paginated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        page: PageRequest,
    ) -> Result<PageResponse<EntryWithLines>, StoreError> {
        let query = journal_entries::Entity::find()
            .filter(journal_entries::Column::EntryDate.gte(from))
            .filter(journal_entries::Column::EntryDate.lte(to))
            .filter(journal_entries::Column::DiscardedAt.is_null());

        let total = query.clone().count(&self.db).await?;
        let entries = query
            .order_by_asc(journal_entries::Column::EntryDate)
            .order_by_asc(journal_entries::Column::EntryNumber)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        let data = attach_lines(&self.db, entries).await?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Returns an entry and its reversal.
    ///
    /// Given the id of a reversal entry, returns the entry it reversed.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist.
    pub async fn get_reversal_history(
        &self,
        id: JournalEntryId,
    ) -> Result<ReversalHistory, StoreError> {
        let entry = self.get_by_id(id).await?;

        if let Some(original_id) = entry.entry.reversal_of_id {
            let original = self.get_by_id(JournalEntryId::from_uuid(original_id)).await?;
            return Ok(ReversalHistory {
                original,
                reversal: Some(entry),
            });
        }

        let reversal = match entry.entry.reversed_by_entry_id {
            Some(reversal_id) => Some(
                self.get_by_id(JournalEntryId::from_uuid(reversal_id))
                    .await?,
            ),
            None => None,
        };

        Ok(ReversalHistory {
            original: entry,
            reversal,
        })
    }

    /// Reports whether an entry can be reversed.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if the entry does not exist.
    pub async fn can_reverse(&self, id: JournalEntryId) -> Result<ReversalEligibility, StoreError> {
        let entry = journal_entries::Entity::find_by_id(id.into_inner())
            .filter(journal_entries::Column::DiscardedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or(LedgerError::EntryNotFound(id.into_inner()))?;

        let (can_reverse, reason) = match EntryStatus::from(entry.status) {
            EntryStatus::Posted => (true, "Entry is posted and can be reversed".to_string()),
            EntryStatus::Reversed => (
                false,
                match entry.reversed_by_entry_id {
                    Some(reversal_id) => format!("Entry was already reversed by {reversal_id}"),
                    None => "Entry was already reversed".to_string(),
                },
            ),
            EntryStatus::Draft => (false, "Only posted entries can be reversed".to_string()),
        };

        Ok(ReversalEligibility {
            can_reverse,
            reason,
        })
    }

    /// Posts a locked draft inside the caller's transaction.
    ///
    /// Shared by `post` and `reverse`: totals are recomputed from the stored
    /// lines, accounts are re-validated, and the deltas (ancestors included)
    /// are applied under account locks taken in ascending id order.
    async fn apply_posting(
        &self,
        txn: &DatabaseTransaction,
        entry: journal_entries::Model,
        posted_by: Uuid,
        posted_at: DateTime<Utc>,
    ) -> Result<journal_entries::Model, StoreError> {
        let lines: Vec<StoredLine> = load_lines(txn, entry.id)
            .await?
            .iter()
            .map(stored_line)
            .collect();

        let totals = JournalService::validate_can_post(
            entry.id,
            entry.status.into(),
            &lines,
            self.ledger.balance_tolerance,
        )?;

        let line_accounts: Vec<Uuid> = lines
            .iter()
            .map(|l| l.account_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let infos = AccountRepository::load_with_ancestors(txn, &line_accounts).await?;
        for account_id in &line_accounts {
            let info = infos
                .get(account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
            JournalService::validate_postable(info)?;
        }

        let deltas = posting_deltas(&lines, &infos)
            .map_err(|missing| LedgerError::AccountNotFound(missing.to_string()))?;
        SyncRepository::apply_incremental_deltas(txn, &deltas, entry.id).await?;

        let before = entry_snapshot(&entry);
        let mut active: journal_entries::ActiveModel = entry.into();
        active.status = Set(JournalStatus::Posted);
        active.total_debit = Set(totals.total_debit);
        active.total_credit = Set(totals.total_credit);
        active.is_balanced = Set(true);
        active.posted_by = Set(Some(posted_by));
        active.posted_at = Set(Some(posted_at.into()));
        active.updated_at = Set(posted_at.into());
        let posted = active.update(txn).await?;

        AuditRepository::append(
            txn,
            &SyncLogRecord::entry_transition(
                posted.id,
                SyncAction::Update,
                posted.id,
                Some(&before),
                Some(&entry_snapshot(&posted)),
            ),
        )
        .await?;

        tracing::debug!(
            entry_id = %posted.id,
            accounts = deltas.len(),
            "Posting deltas applied"
        );

        Ok(posted)
    }

    async fn resolve_accounts(
        &self,
        input: &CreateJournalInput,
    ) -> Result<ResolvedAccounts, StoreError> {
        let mut ids = Vec::new();
        let mut codes = Vec::new();
        for line in &input.lines {
            match &line.account {
                AccountRef::Id(id) => ids.push(*id),
                AccountRef::Code(code) => codes.push(code.clone()),
            }
        }

        let found = accounts::Entity::find()
            .filter(
                Condition::any()
                    .add(accounts::Column::Id.is_in(ids))
                    .add(accounts::Column::Code.is_in(codes)),
            )
            .all(&self.db)
            .await?;

        let mut resolved = ResolvedAccounts::default();
        for account in &found {
            let info = account_info(account);
            resolved.by_code.insert(info.code.clone(), info.clone());
            resolved.by_id.insert(info.id, info);
        }
        Ok(resolved)
    }
}

#[derive(Debug, Default)]
struct ResolvedAccounts {
    by_id: HashMap<Uuid, AccountInfo>,
    by_code: HashMap<String, AccountInfo>,
}

/// Header fields of a new entry.
struct NewEntry {
    entry_number: String,
    source_type: String,
    source_id: String,
    entry_date: NaiveDate,
    description: String,
    totals: EntryTotals,
    is_auto_generated: bool,
    created_by: Uuid,
    reversal_of_id: Option<Uuid>,
}

/// Inserts a draft entry, its lines and its `INSERT` audit record.
async fn insert_entry(
    txn: &DatabaseTransaction,
    new: NewEntry,
    lines: &[ValidatedLine],
) -> Result<EntryWithLines, StoreError> {
    let entry_id = Uuid::now_v7();
    let now = Utc::now().into();

    let entry = journal_entries::ActiveModel {
        id: Set(entry_id),
        entry_number: Set(new.entry_number),
        source_type: Set(new.source_type),
        source_id: Set(new.source_id),
        entry_date: Set(new.entry_date),
        description: Set(new.description),
        total_debit: Set(new.totals.total_debit),
        total_credit: Set(new.totals.total_credit),
        status: Set(JournalStatus::Draft),
        is_balanced: Set(new.totals.is_balanced),
        is_auto_generated: Set(new.is_auto_generated),
        created_by: Set(new.created_by),
        reversal_of_id: Set(new.reversal_of_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut inserted = Vec::with_capacity(lines.len());
    for line in lines {
        let model = journal_lines::ActiveModel {
            id: Set(Uuid::now_v7()),
            entry_id: Set(entry_id),
            account_id: Set(line.account_id),
            line_number: Set(line.line_number),
            description: Set(line.description.clone()),
            debit_amount: Set(line.debit),
            credit_amount: Set(line.credit),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;
        inserted.push(model);
    }

    AuditRepository::append(
        txn,
        &SyncLogRecord::entry_transition(
            entry.id,
            SyncAction::Insert,
            entry.id,
            None,
            Some(&entry_snapshot(&entry)),
        ),
    )
    .await?;

    Ok(EntryWithLines {
        entry,
        lines: inserted,
    })
}

/// Allocates the next `JE-{YYYY}/{MM}/{seq:06}` number.
async fn next_entry_number(
    txn: &DatabaseTransaction,
    entry_date: NaiveDate,
) -> Result<String, StoreError> {
    let row = txn
        .query_one(Statement::from_string(
            txn.get_database_backend(),
            "SELECT nextval('journal_entry_number_seq') AS seq",
        ))
        .await?
        .ok_or_else(|| LedgerError::Internal("entry number sequence returned no row".to_string()))?;
    let seq: i64 = row.try_get("", "seq")?;

    Ok(format!(
        "JE-{}/{:02}/{seq:06}",
        entry_date.year(),
        entry_date.month()
    ))
}

/// Loads and row-locks a non-discarded entry.
async fn find_live_entry_locked(
    txn: &DatabaseTransaction,
    id: Uuid,
) -> Result<journal_entries::Model, StoreError> {
    journal_entries::Entity::find_by_id(id)
        .filter(journal_entries::Column::DiscardedAt.is_null())
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| LedgerError::EntryNotFound(id).into())
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> Result<Vec<journal_lines::Model>, StoreError> {
    let lines = journal_lines::Entity::find()
        .filter(journal_lines::Column::EntryId.eq(entry_id))
        .order_by_asc(journal_lines::Column::LineNumber)
        .all(conn)
        .await?;
    Ok(lines)
}

/// Loads the lines of many entries with one query.
async fn attach_lines<C: ConnectionTrait>(
    conn: &C,
    entries: Vec<journal_entries::Model>,
) -> Result<Vec<EntryWithLines>, StoreError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let mut grouped: HashMap<Uuid, Vec<journal_lines::Model>> = HashMap::new();
    for line in journal_lines::Entity::find()
        .filter(journal_lines::Column::EntryId.is_in(ids))
        .order_by_asc(journal_lines::Column::EntryId)
        .order_by_asc(journal_lines::Column::LineNumber)
        .all(conn)
        .await?
    {
        grouped.entry(line.entry_id).or_default().push(line);
    }

    Ok(entries
        .into_iter()
        .map(|entry| {
            let lines = grouped.remove(&entry.id).unwrap_or_default();
            EntryWithLines { entry, lines }
        })
        .collect())
}

fn stored_line(line: &journal_lines::Model) -> StoredLine {
    StoredLine {
        line_number: line.line_number,
        account_id: line.account_id,
        description: line.description.clone(),
        debit: line.debit_amount,
        credit: line.credit_amount,
    }
}

fn entry_snapshot(entry: &journal_entries::Model) -> EntrySnapshot {
    EntrySnapshot {
        entry_number: entry.entry_number.clone(),
        status: entry.status.into(),
        total_debit: entry.total_debit,
        total_credit: entry.total_credit,
    }
}
