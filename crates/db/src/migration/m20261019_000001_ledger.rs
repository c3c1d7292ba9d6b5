//! Ledger schema migration.
//!
//! Creates the enums, chart of accounts, journal tables, the append-only
//! balance sync log and the entry number sequence. There are no triggers:
//! every balance mutation is an explicit repository call.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;

        // ============================================================
        // PART 4: AUDIT LOG
        // ============================================================
        db.execute_unprepared(BALANCE_SYNC_LOG_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM (
    'asset',
    'liability',
    'equity',
    'revenue',
    'expense'
);

CREATE TYPE journal_status AS ENUM ('DRAFT', 'POSTED', 'REVERSED');

CREATE TYPE sync_action AS ENUM ('INSERT', 'UPDATE', 'DELETE', 'RECONCILE');

CREATE TYPE sync_entity_type AS ENUM ('ACCOUNT', 'JOURNAL_ENTRY');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    parent_id UUID REFERENCES accounts(id),
    level INTEGER NOT NULL DEFAULT 1,
    is_header BOOLEAN NOT NULL DEFAULT false,
    is_active BOOLEAN NOT NULL DEFAULT true,
    -- Materialized projection of the ledger; written only by the sync path
    balance NUMERIC(20, 4) NOT NULL DEFAULT 0,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
CREATE INDEX idx_accounts_type ON accounts(account_type) WHERE is_active = true;
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE SEQUENCE journal_entry_number_seq START 1;

CREATE TABLE journal_entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    entry_number VARCHAR(100) NOT NULL UNIQUE,
    source_type VARCHAR(50) NOT NULL,
    source_id VARCHAR(100) NOT NULL,
    entry_date DATE NOT NULL,
    description TEXT NOT NULL,
    total_debit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(20, 4) NOT NULL DEFAULT 0,
    status journal_status NOT NULL DEFAULT 'DRAFT',
    is_balanced BOOLEAN NOT NULL DEFAULT false,
    is_auto_generated BOOLEAN NOT NULL DEFAULT false,
    created_by UUID NOT NULL,
    posted_by UUID,
    posted_at TIMESTAMPTZ,
    reversed_by UUID,
    reversed_at TIMESTAMPTZ,
    reversal_reason TEXT,
    reversal_of_id UUID REFERENCES journal_entries(id),
    reversed_by_entry_id UUID REFERENCES journal_entries(id),
    discarded_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_journal_posted_balanced CHECK (status = 'DRAFT' OR is_balanced),
    CONSTRAINT chk_journal_discard_draft CHECK (discarded_at IS NULL OR status = 'DRAFT')
);

CREATE INDEX idx_journal_source ON journal_entries(source_type, source_id) WHERE discarded_at IS NULL;
CREATE INDEX idx_journal_date ON journal_entries(entry_date) WHERE discarded_at IS NULL;
CREATE INDEX idx_journal_status ON journal_entries(status);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE RESTRICT,
    account_id UUID NOT NULL REFERENCES accounts(id),
    line_number INTEGER NOT NULL,
    description TEXT,
    debit_amount NUMERIC(20, 4) NOT NULL DEFAULT 0,
    credit_amount NUMERIC(20, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (entry_id, line_number),
    CONSTRAINT chk_line_single_side CHECK (
        (debit_amount > 0 AND credit_amount = 0) OR
        (debit_amount = 0 AND credit_amount > 0)
    )
);

CREATE INDEX idx_lines_account ON journal_lines(account_id);
CREATE INDEX idx_lines_entry ON journal_lines(entry_id, line_number);
";

const BALANCE_SYNC_LOG_SQL: &str = r"
-- Append-only; rows are never updated
CREATE TABLE balance_sync_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    entity_type sync_entity_type NOT NULL,
    entity_id UUID NOT NULL,
    action sync_action NOT NULL,
    run_id UUID NOT NULL,
    before_snapshot JSONB,
    after_snapshot JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (entity_type, entity_id, action, run_id)
);

CREATE INDEX idx_sync_log_entity ON balance_sync_log(entity_type, entity_id, created_at DESC);
CREATE INDEX idx_sync_log_recent ON balance_sync_log(created_at DESC);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS balance_sync_log CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP SEQUENCE IF EXISTS journal_entry_number_seq;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TYPE IF EXISTS sync_entity_type;
DROP TYPE IF EXISTS sync_action;
DROP TYPE IF EXISTS journal_status;
DROP TYPE IF EXISTS account_type;
";
