//! Account registry: chart-of-accounts metadata and the cached balance column.
//!
//! The cached balance is only written through the crate-private
//! [`apply_balance_delta`] and [`overwrite_balance`], which the
//! synchronization path calls on rows it has already locked.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use ledgerline_core::audit::BalanceSnapshot;
use ledgerline_core::ledger::{AccountInfo, AccountType, LedgerError};
use ledgerline_core::reconciliation::{HierarchyNode, rollup_by_prefix};
use ledgerline_shared::types::AccountId;

use crate::entities::accounts;

use super::error::{StoreError, is_unique_violation};

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Account code (unique).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Code of the parent header account.
    pub parent_code: Option<String>,
    /// Whether this is a non-postable rollup account.
    pub is_header: bool,
}

/// Filter options for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Filter by account type.
    pub account_type: Option<AccountType>,
    /// Filter by active status.
    pub is_active: Option<bool>,
    /// Filter by header flag.
    pub is_header: Option<bool>,
}

/// Converts a stored account to the metadata the ledger rules need.
pub(crate) fn account_info(model: &accounts::Model) -> AccountInfo {
    AccountInfo {
        id: model.id,
        code: model.code.clone(),
        account_type: model.account_type.into(),
        parent_id: model.parent_id,
        is_header: model.is_header,
        is_active: model.is_active,
    }
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a new account with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The code already exists
    /// - The parent does not exist, is not a header, or has a different type
    pub async fn create_account(
        &self,
        input: CreateAccountInput,
    ) -> Result<accounts::Model, StoreError> {
        let code = input.code.trim().to_string();
        if code.is_empty() {
            return Err(LedgerError::InvalidParent("account code is required".to_string()).into());
        }

        let existing = accounts::Entity::find()
            .filter(accounts::Column::Code.eq(&code))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(LedgerError::DuplicateAccountCode(code).into());
        }

        let (parent_id, level) = match input.parent_code.as_deref() {
            None => (None, 1),
            Some(parent_code) => {
                let parent = self.get_by_code(parent_code).await.map_err(|_| {
                    LedgerError::InvalidParent(format!("parent {parent_code} does not exist"))
                })?;
                if !parent.is_header {
                    return Err(LedgerError::InvalidParent(format!(
                        "parent {parent_code} is not a header account"
                    ))
                    .into());
                }
                if AccountType::from(parent.account_type) != input.account_type {
                    return Err(LedgerError::InvalidParent(format!(
                        "parent {parent_code} has a different account type"
                    ))
                    .into());
                }
                (Some(parent.id), parent.level + 1)
            }
        };

        let now = Utc::now().into();
        let account = accounts::ActiveModel {
            id: Set(Uuid::now_v7()),
            code: Set(code.clone()),
            name: Set(input.name),
            account_type: Set(input.account_type.into()),
            parent_id: Set(parent_id),
            level: Set(level),
            is_header: Set(input.is_header),
            is_active: Set(true),
            balance: Set(Decimal::ZERO),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        account.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::from(LedgerError::DuplicateAccountCode(code))
            } else {
                StoreError::from(e)
            }
        })
    }

    /// Gets an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn get_by_id(&self, id: AccountId) -> Result<accounts::Model, StoreError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()).into())
    }

    /// Gets an account by code.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if no account has the code.
    pub async fn get_by_code(&self, code: &str) -> Result<accounts::Model, StoreError> {
        accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code.trim()))
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()).into())
    }

    /// Lists accounts ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(
        &self,
        filter: AccountFilter,
    ) -> Result<Vec<accounts::Model>, StoreError> {
        let mut query = accounts::Entity::find();

        if let Some(account_type) = filter.account_type {
            query = query.filter(
                accounts::Column::AccountType
                    .eq(crate::entities::sea_orm_active_enums::AccountType::from(account_type)),
            );
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(accounts::Column::IsActive.eq(is_active));
        }
        if let Some(is_header) = filter.is_header {
            query = query.filter(accounts::Column::IsHeader.eq(is_header));
        }

        let accounts = query
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await?;
        Ok(accounts)
    }

    /// Deactivates an account. Accounts are never deleted.
    ///
    /// A postable account must be at zero first, otherwise its balance would
    /// silently drop out of its headers' rollup.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist, or
    /// `AccountHasBalance` if a postable account still carries a balance.
    pub async fn deactivate(&self, id: AccountId) -> Result<accounts::Model, StoreError> {
        let account = self.get_by_id(id).await?;
        if !account.is_active {
            return Ok(account);
        }
        if !account.is_header && !account.balance.is_zero() {
            return Err(LedgerError::AccountHasBalance {
                code: account.code,
                balance: account.balance,
            }
            .into());
        }

        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&self.db).await?;

        tracing::info!(account_id = %id, code = %updated.code, "Account deactivated");
        Ok(updated)
    }

    /// Returns the cached balance of an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub async fn get_balance(&self, id: AccountId) -> Result<Decimal, StoreError> {
        Ok(self.get_by_id(id).await?.balance)
    }

    /// Returns the cached balances of all accounts, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_balances(&self) -> Result<Vec<accounts::Model>, StoreError> {
        self.list_accounts(AccountFilter::default()).await
    }

    /// Recomputes a header's balance from the accounts under its code prefix.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if no account has the code.
    pub async fn rollup_header(&self, header_code: &str) -> Result<Decimal, StoreError> {
        let header = self.get_by_code(header_code).await?;

        let nodes: Vec<HierarchyNode> = accounts::Entity::find()
            .filter(accounts::Column::IsActive.eq(true))
            .filter(accounts::Column::IsHeader.eq(false))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|a| HierarchyNode {
                id: a.id,
                code: a.code,
                account_type: a.account_type.into(),
                parent_id: a.parent_id,
                is_header: a.is_header,
                is_active: a.is_active,
                balance: a.balance,
                has_lines: false,
            })
            .collect();

        Ok(rollup_by_prefix(&header.code, &nodes))
    }

    /// Loads accounts and all of their ancestors, keyed by ID.
    pub(crate) async fn load_with_ancestors<C: ConnectionTrait>(
        conn: &C,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AccountInfo>, StoreError> {
        let mut loaded: HashMap<Uuid, AccountInfo> = HashMap::new();
        let mut pending: Vec<Uuid> = ids.to_vec();

        while !pending.is_empty() {
            let batch = accounts::Entity::find()
                .filter(accounts::Column::Id.is_in(pending.iter().copied()))
                .all(conn)
                .await?;

            pending = batch
                .iter()
                .filter_map(|a| a.parent_id)
                .filter(|p| !loaded.contains_key(p))
                .collect();
            for account in &batch {
                loaded.insert(account.id, account_info(account));
            }
            pending.retain(|p| !loaded.contains_key(p));
            pending.sort_unstable();
            pending.dedup();
        }

        Ok(loaded)
    }

    /// Locks accounts with `SELECT ... FOR UPDATE` in ascending ID order.
    ///
    /// Every transaction that touches more than one account goes through
    /// here, so all lockers agree on the same order.
    pub(crate) async fn lock_accounts(
        txn: &DatabaseTransaction,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, accounts::Model>, StoreError> {
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let locked = accounts::Entity::find()
            .filter(accounts::Column::Id.is_in(sorted))
            .order_by_asc(accounts::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await?;

        Ok(locked.into_iter().map(|a| (a.id, a)).collect())
    }

    /// Atomically adds `delta` to a locked account's cached balance.
    ///
    /// The update is guarded by the version read under the lock.
    pub(crate) async fn apply_balance_delta(
        txn: &DatabaseTransaction,
        account: &accounts::Model,
        delta: Decimal,
    ) -> Result<BalanceSnapshot, StoreError> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(delta),
            )
            .col_expr(
                accounts::Column::Version,
                Expr::col(accounts::Column::Version).add(1),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(accounts::Column::Id.eq(account.id))
            .filter(accounts::Column::Version.eq(account.version))
            .exec(txn)
            .await?;

        Self::check_version(txn, account, result.rows_affected).await?;
        Ok(BalanceSnapshot {
            balance: account.balance + delta,
            version: account.version + 1,
        })
    }

    /// Overwrites a locked account's cached balance with a derived value.
    pub(crate) async fn overwrite_balance(
        txn: &DatabaseTransaction,
        account: &accounts::Model,
        balance: Decimal,
    ) -> Result<BalanceSnapshot, StoreError> {
        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::Balance, Expr::value(balance))
            .col_expr(
                accounts::Column::Version,
                Expr::col(accounts::Column::Version).add(1),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(accounts::Column::Id.eq(account.id))
            .filter(accounts::Column::Version.eq(account.version))
            .exec(txn)
            .await?;

        Self::check_version(txn, account, result.rows_affected).await?;
        Ok(BalanceSnapshot {
            balance,
            version: account.version + 1,
        })
    }

    async fn check_version(
        txn: &DatabaseTransaction,
        account: &accounts::Model,
        rows_affected: u64,
    ) -> Result<(), StoreError> {
        if rows_affected == 1 {
            return Ok(());
        }

        let actual = accounts::Entity::find_by_id(account.id)
            .select_only()
            .column(accounts::Column::Version)
            .into_tuple::<i64>()
            .one(txn)
            .await?
            .unwrap_or_default();

        Err(LedgerError::AccountVersionMismatch {
            account_id: account.id,
            expected: account.version,
            actual,
        }
        .into())
    }
}
