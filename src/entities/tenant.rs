//! Tenant entity - The party billed under a lease.
//!
//! Tenants are owned by the CRM side of the system; the ledger reads the tenant code
//! (used to recognise bank references) and name (used for fuzzy matching).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Short code tenants quote on bank transfers (e.g. `"T1001"`)
    #[sea_orm(unique)]
    pub code: String,
    /// Full name as it appears on statements
    pub name: String,
    /// Contact email, if known
    pub email: Option<String>,
    /// Inactive tenants are ignored by name matching
    pub is_active: bool,
}

/// Defines relationships between Tenant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One tenant has many leases
    #[sea_orm(has_many = "super::lease::Entity")]
    Leases,
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Leases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
