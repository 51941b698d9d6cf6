//! Bank transaction entity - One row of an imported bank statement and the outcome of
//! matching it against outstanding invoices.

use super::enums::{BankTransactionStatus, MatchOutcome, TransactionDirection};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bank transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_transactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Import batch the row arrived in
    pub batch_id: i64,
    /// 1-based position within the imported statement
    pub row_number: i32,
    /// Date on the statement
    pub transaction_date: Date,
    /// Statement narrative
    pub description: String,
    /// Normalised, always non-negative; see `direction`
    pub amount: Decimal,
    /// Whether money came in or went out
    pub direction: TransactionDirection,
    /// Reference column, if any
    pub reference: Option<String>,
    /// Account column, if any
    pub account: Option<String>,
    /// Tenant reference extracted from the description
    pub parsed_reference: Option<String>,
    /// Lease the transaction was resolved to
    pub lease_id: Option<i64>,
    /// First invoice the money was applied to
    pub invoice_id: Option<i64>,
    /// How the amount matched the invoices
    pub match_outcome: MatchOutcome,
    /// Processing state
    pub status: BankTransactionStatus,
    /// Amount applied to invoices or credit so far
    pub allocated_amount: Decimal,
    /// Why the row needs review, or the error that failed it
    pub notes: Option<String>,
    /// When the row was stored
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `BankTransaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one import batch
    #[sea_orm(
        belongs_to = "super::import_batch::Entity",
        from = "Column::BatchId",
        to = "super::import_batch::Column::Id"
    )]
    /// Each transaction belongs to an import batch
    Batch,
}

impl Related<super::import_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
