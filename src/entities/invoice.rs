//! Invoice entity - A billable document for a lease.
//!
//! Totals are never written directly by callers: they are derived from the invoice's
//! line items and payments by [`crate::core::ledger::recalculate_invoice`].

use super::enums::{InvoiceKind, InvoiceStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    /// Unique identifier for the invoice
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-facing number, `INV-<lease>-<yyyymm>-<seq>`
    #[sea_orm(unique)]
    pub invoice_number: String,
    /// Lease being billed
    pub lease_id: i64,
    /// Tenant being billed (denormalised from the lease)
    pub tenant_id: i64,
    /// Initial, regular or interim
    pub kind: InvoiceKind,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Date the invoice was issued
    pub issue_date: Date,
    /// Date payment is due
    pub due_date: Date,
    /// First day of the billed period
    pub period_start: Date,
    /// Last day of the billed period
    pub period_end: Date,
    /// Sum of all line totals
    pub subtotal: Decimal,
    /// Tax percentage applied to the taxable lines
    pub tax_rate: Decimal,
    /// Tax on the taxable subtotal
    pub tax_amount: Decimal,
    /// `subtotal + tax_amount`
    pub total: Decimal,
    /// Sum of allocated amounts of non-void payments
    pub amount_paid: Decimal,
    /// `total - amount_paid`, floored at zero
    pub balance_due: Decimal,
    /// Locked invoices keep their lines and totals forever
    pub is_locked: bool,
    /// When the invoice was locked
    pub locked_at: Option<DateTimeUtc>,
    /// Who locked it
    pub locked_by: Option<String>,
    /// Locked invoice this interim invoice adjusts
    pub parent_invoice_id: Option<i64>,
    /// When the invoice was created
    pub created_at: DateTimeUtc,
    /// Last change
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// `total - amount_paid` without the display floor; negative means overpaid.
    #[must_use]
    pub fn signed_balance(&self) -> Decimal {
        self.total - self.amount_paid
    }
}

/// Defines relationships between Invoice and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invoice belongs to one lease
    #[sea_orm(
        belongs_to = "super::lease::Entity",
        from = "Column::LeaseId",
        to = "super::lease::Column::Id"
    )]
    /// Each invoice bills one lease
    Lease,
    /// One invoice has many line items
    #[sea_orm(has_many = "super::line_item::Entity")]
    LineItems,
    /// One invoice has many payments
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lease.def()
    }
}

impl Related<super::line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
