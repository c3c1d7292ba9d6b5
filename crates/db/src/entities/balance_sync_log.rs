//! `SeaORM` Entity for balance_sync_log table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{SyncAction, SyncEntityType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "balance_sync_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_type: SyncEntityType,
    pub entity_id: Uuid,
    pub action: SyncAction,
    pub run_id: Uuid,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub before_snapshot: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub after_snapshot: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
