//! Payment entity - Money applied to exactly one invoice.
//!
//! `amount` is what the source contributed to this payment record and
//! `allocated_amount` is the part counted against the invoice; they differ only when
//! an exact match forgives a sub-tolerance difference.

use super::enums::PaymentMethod;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice the payment settles
    pub invoice_id: i64,
    /// Full amount received from the source
    pub amount: Decimal,
    /// Part of the amount applied to this invoice
    pub allocated_amount: Decimal,
    /// Date the money was received
    pub payment_date: Date,
    /// How it was paid
    pub method: PaymentMethod,
    /// Bank or receipt reference
    pub reference: Option<String>,
    /// Who (or which process) recorded the payment
    pub recorded_by: String,
    /// Set when the source paid more than this invoice owed
    pub is_overpayment: bool,
    /// Voided payments no longer count towards `amount_paid`
    pub is_void: bool,
    /// When it was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Payment and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each payment belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id"
    )]
    /// Each payment settles one invoice
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
