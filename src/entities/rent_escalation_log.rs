//! Rent escalation log entity - One applied rent increase.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Rent escalation log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rent_escalation_logs")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lease escalated
    pub lease_id: i64,
    /// Rent before the escalation
    pub previous_rent: Decimal,
    /// Rent after it
    pub new_rent: Decimal,
    /// Anniversary the escalation applies from
    pub effective_date: Date,
    /// Actor that applied it
    pub applied_by: String,
    /// When it was recorded
    pub created_at: DateTimeUtc,
}

/// `RentEscalationLog` is linked to leases by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
