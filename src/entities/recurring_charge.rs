//! Recurring charge entity - Lease-level lines repeated on every monthly invoice
//! (utilities, parking, service charges).

use super::enums::LineItemCategory;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recurring charge database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recurring_charges")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lease billed
    pub lease_id: i64,
    /// Text printed on each invoice
    pub description: String,
    /// Line category used
    pub category: LineItemCategory,
    /// Amount billed every month
    pub amount: Decimal,
    /// Inactive charges are no longer billed
    pub is_active: bool,
}

/// Defines relationships between `RecurringCharge` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each charge belongs to one lease
    #[sea_orm(
        belongs_to = "super::lease::Entity",
        from = "Column::LeaseId",
        to = "super::lease::Column::Id"
    )]
    /// Each charge belongs to one lease
    Lease,
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lease.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
