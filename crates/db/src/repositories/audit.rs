//! Append-only balance sync log.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use ledgerline_core::audit::{SyncEntityType, SyncLogRecord};

use crate::entities::balance_sync_log;

use super::error::StoreError;

/// Audit repository for the balance sync log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends a record on the caller's connection or transaction.
    ///
    /// A record with the same `(entity_type, entity_id, action, run_id)` is
    /// skipped, so retried runs do not duplicate entries.
    pub(crate) async fn append<C: ConnectionTrait>(
        conn: &C,
        record: &SyncLogRecord,
    ) -> Result<(), StoreError> {
        let row = balance_sync_log::ActiveModel {
            id: Set(Uuid::now_v7()),
            entity_type: Set(record.entity_type.into()),
            entity_id: Set(record.entity_id),
            action: Set(record.action.into()),
            run_id: Set(record.run_id),
            before_snapshot: Set(record.before.clone()),
            after_snapshot: Set(record.after.clone()),
            created_at: Set(Utc::now().into()),
        };

        balance_sync_log::Entity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    balance_sync_log::Column::EntityType,
                    balance_sync_log::Column::EntityId,
                    balance_sync_log::Column::Action,
                    balance_sync_log::Column::RunId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(())
    }

    /// Lists the log records of one entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_entity(
        &self,
        entity_type: SyncEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<balance_sync_log::Model>, StoreError> {
        let records = balance_sync_log::Entity::find()
            .filter(
                balance_sync_log::Column::EntityType
                    .eq(crate::entities::sea_orm_active_enums::SyncEntityType::from(entity_type)),
            )
            .filter(balance_sync_log::Column::EntityId.eq(entity_id))
            .order_by_desc(balance_sync_log::Column::CreatedAt)
            .order_by_desc(balance_sync_log::Column::Id)
            .all(&self.db)
            .await?;
        Ok(records)
    }

    /// Lists the records written by one run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_run(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<balance_sync_log::Model>, StoreError> {
        let records = balance_sync_log::Entity::find()
            .filter(balance_sync_log::Column::RunId.eq(run_id))
            .order_by_asc(balance_sync_log::Column::Id)
            .all(&self.db)
            .await?;
        Ok(records)
    }

    /// Lists the most recent records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_recent(
        &self,
        limit: u64,
    ) -> Result<Vec<balance_sync_log::Model>, StoreError> {
        let records = balance_sync_log::Entity::find()
            .order_by_desc(balance_sync_log::Column::CreatedAt)
            .order_by_desc(balance_sync_log::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(records)
    }
}
