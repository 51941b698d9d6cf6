//! Import batch entity - One bank statement import and its per-row outcome counts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Import batch database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "import_batches")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// File name or feed the rows came from
    pub source_name: String,
    /// Who ran the import
    pub imported_by: String,
    /// Rows in the statement
    pub total_rows: i32,
    /// Rows reconciled automatically
    pub reconciled_count: i32,
    /// Rows left for an operator
    pub manual_review_count: i32,
    /// Rows that could not be processed
    pub failed_count: i32,
    /// When the import ran
    pub imported_at: DateTimeUtc,
}

/// Defines relationships between `ImportBatch` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One batch has many transactions
    #[sea_orm(has_many = "super::bank_transaction::Entity")]
    Transactions,
}

impl Related<super::bank_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
