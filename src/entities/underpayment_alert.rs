//! Underpayment alert entity - Raised when reconciliation leaves an invoice
//! partially paid.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Underpayment alert database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "underpayment_alerts")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Oldest invoice still owing after the payment
    pub invoice_id: i64,
    /// Transaction that underpaid
    pub bank_transaction_id: i64,
    /// Total outstanding before the payment
    pub expected_amount: Decimal,
    /// Amount received
    pub actual_amount: Decimal,
    /// What is still owed
    pub shortfall_amount: Decimal,
    /// Human-readable summary
    pub message: String,
    /// Whether an operator has dealt with it
    pub is_resolved: bool,
    /// When it was raised
    pub created_at: DateTimeUtc,
}

/// `UnderpaymentAlert` is linked by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
