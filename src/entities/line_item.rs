//! Line item entity - One charge on an invoice. Deleted together with its invoice.

use super::enums::LineItemCategory;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Line item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "line_items")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Invoice the line belongs to
    pub invoice_id: i64,
    /// Order of the line on the invoice
    pub position: i32,
    /// Text printed on the invoice
    pub description: String,
    /// What the line charges for
    pub category: LineItemCategory,
    /// Units billed
    pub quantity: Decimal,
    /// Price per unit
    pub unit_price: Decimal,
    /// `quantity * unit_price`, rounded to cents
    pub line_total: Decimal,
}

/// Defines relationships between `LineItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one invoice
    #[sea_orm(
        belongs_to = "super::invoice::Entity",
        from = "Column::InvoiceId",
        to = "super::invoice::Column::Id",
        on_delete = "Cascade"
    )]
    /// Each line belongs to one invoice
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
