//! Manual payment entity - A payment reported by an operator that is allocated to
//! invoices in one or more steps.

use super::enums::{ManualPaymentStatus, PaymentMethod};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Manual payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manual_payments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lease the payment is for
    pub lease_id: i64,
    /// Amount received
    pub amount: Decimal,
    /// Allocated to invoices or routed to tenant credit so far
    pub allocated_amount: Decimal,
    /// `amount - allocated_amount`
    pub remaining_amount: Decimal,
    /// How it was paid
    pub method: PaymentMethod,
    /// Date it was received
    pub payment_date: Date,
    /// Receipt reference
    pub reference: Option<String>,
    /// Allocation state
    pub status: ManualPaymentStatus,
    /// Operator who recorded it
    pub recorded_by: String,
    /// When it was recorded
    pub created_at: DateTimeUtc,
}

/// `ManualPayment` is linked to leases by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
