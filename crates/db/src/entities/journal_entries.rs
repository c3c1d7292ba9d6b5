//! `SeaORM` Entity for journal_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::JournalStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub entry_number: String,
    pub source_type: String,
    pub source_id: String,
    pub entry_date: Date,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 4)))")]
    pub total_credit: Decimal,
    pub status: JournalStatus,
    pub is_balanced: bool,
    pub is_auto_generated: bool,
    pub created_by: Uuid,
    pub posted_by: Option<Uuid>,
    pub posted_at: Option<DateTimeWithTimeZone>,
    pub reversed_by: Option<Uuid>,
    pub reversed_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reversal_reason: Option<String>,
    pub reversal_of_id: Option<Uuid>,
    pub reversed_by_entry_id: Option<Uuid>,
    pub discarded_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
