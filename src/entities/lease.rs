//! Lease entity - The terms invoices are generated from.
//!
//! Rent, deposit and fee percentages drive invoice lines; the escalation columns
//! schedule yearly rent increases and the late fee columns describe the penalty
//! policy for overdue invoices.

use super::enums::RateType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lease database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leases")]
pub struct Model {
    /// Unique identifier for the lease
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant billed under this lease
    pub tenant_id: i64,
    /// Property being let
    pub property_id: i64,
    /// First day of occupation
    pub start_date: Date,
    /// Last day of occupation, if fixed-term
    pub end_date: Option<Date>,
    /// Current monthly rent
    pub monthly_rent: Decimal,
    /// Security deposit billed on the initial invoice
    pub deposit: Decimal,
    /// Day of month rent falls due (clamped to the month length)
    pub due_day: i32,
    /// Inactive leases are skipped by generation and matching
    pub is_active: bool,
    /// How rent escalates, if at all
    pub escalation_type: Option<RateType>,
    /// Percentage or fixed amount of each escalation
    pub escalation_amount: Decimal,
    /// When the next escalation takes effect
    pub next_escalation_date: Option<Date>,
    /// How late fees are computed, if at all
    pub late_fee_type: Option<RateType>,
    /// Percentage of the overdue balance or fixed fee per overdue invoice
    pub late_fee_amount: Decimal,
    /// Days after the due date before a late fee applies
    pub late_fee_grace_days: i32,
    /// Pro-rata fee as a percentage of monthly rent
    pub pro_rata_fee_percent: Option<Decimal>,
    /// Management fee as a percentage of monthly rent
    pub management_fee_percent: Option<Decimal>,
    /// Procurement fee as a percentage of monthly rent
    pub procurement_fee_percent: Option<Decimal>,
    /// Touched whenever any invoice of the lease is recalculated
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Lease and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each lease belongs to one tenant
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    /// The tenant renting
    Tenant,
    /// Each lease belongs to one property
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    /// The property rented
    Property,
    /// One lease has many invoices
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
    /// One lease has many recurring charges
    #[sea_orm(has_many = "super::recurring_charge::Entity")]
    RecurringCharges,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::recurring_charge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurringCharges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
