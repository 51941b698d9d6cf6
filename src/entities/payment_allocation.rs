//! Payment allocation entity - Audit link from a payment source (manual payment or
//! bank transaction) to the invoice, or tenant credit, that received the money.

use super::enums::AllocationType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment allocation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_allocations")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lease the money was received for
    pub lease_id: i64,
    /// Manual payment the money came from
    pub manual_payment_id: Option<i64>,
    /// Bank transaction the money came from
    pub bank_transaction_id: Option<i64>,
    /// None when the money went to tenant credit
    pub invoice_id: Option<i64>,
    /// Payment created for the invoice, if any
    pub payment_id: Option<i64>,
    /// Amount applied
    pub allocated_amount: Decimal,
    /// Automatic, manual or tenant credit
    pub allocation_type: AllocationType,
    /// Date of the allocation
    pub allocation_date: Date,
    /// Free-form notes
    pub notes: Option<String>,
    /// When it was recorded
    pub created_at: DateTimeUtc,
}

/// `PaymentAllocation` is linked to its sources by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
