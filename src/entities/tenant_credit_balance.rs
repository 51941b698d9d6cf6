//! Tenant credit balance entity - Unapplied overpayment held for one tenant.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant credit balance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenant_credit_balances")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Tenant holding the credit
    #[sea_orm(unique)]
    pub tenant_id: i64,
    /// Never negative
    pub balance: Decimal,
    /// Last change
    pub updated_at: DateTimeUtc,
}

/// `TenantCreditBalance` is linked to tenants by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
