//! Adjustment entity - A manual credit, waiver or deduction recorded against an invoice.
//!
//! The monetary effect lives on an adjustment line item (`line_item_id`); this row is
//! the audit record statements are built from.

use super::enums::AdjustmentType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Adjustment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "adjustments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice the adjustment was requested against
    pub invoice_id: i64,
    /// Invoice carrying the adjustment line (an interim child when the target is locked)
    pub applied_invoice_id: i64,
    /// Adjustment line carrying the amount
    pub line_item_id: i64,
    /// Lease of the invoice
    pub lease_id: i64,
    /// Kind of adjustment
    pub adjustment_type: AdjustmentType,
    /// Signed: negative reduces what the tenant owes
    pub amount: Decimal,
    /// Reason given by the operator
    pub reason: String,
    /// Date the adjustment takes effect
    pub effective_date: Date,
    /// Operator who made it
    pub created_by: String,
    /// When it was recorded
    pub created_at: DateTimeUtc,
}

/// `Adjustment` is linked to invoices by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
