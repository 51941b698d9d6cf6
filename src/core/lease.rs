//! Read access to the lease terms owned by the property management side.

use crate::{
    entities::{
        Lease, LeaseModel, Property, PropertyModel, RecurringCharge, RecurringChargeModel,
        Tenant, TenantModel, lease, recurring_charge,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, prelude::*};

/// Finds a lease by id, failing with [`Error::NotFound`] when it does not exist.
pub async fn require_lease<C>(db: &C, lease_id: i64) -> Result<LeaseModel>
where
    C: ConnectionTrait,
{
    Lease::find_by_id(lease_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("lease", lease_id))
}

/// Loads a tenant or fails with not found.
pub async fn require_tenant<C>(db: &C, tenant_id: i64) -> Result<TenantModel>
where
    C: ConnectionTrait,
{
    Tenant::find_by_id(tenant_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("tenant", tenant_id))
}

/// Loads a property or fails with not found.
pub async fn require_property<C>(db: &C, property_id: i64) -> Result<PropertyModel>
where
    C: ConnectionTrait,
{
    Property::find_by_id(property_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("property", property_id))
}

/// All active leases, in id order.
pub async fn get_active_leases<C>(db: &C) -> Result<Vec<LeaseModel>>
where
    C: ConnectionTrait,
{
    Lease::find()
        .filter(lease::Column::IsActive.eq(true))
        .order_by_asc(lease::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active leases of one tenant.
pub async fn get_active_leases_for_tenant<C>(db: &C, tenant_id: i64) -> Result<Vec<LeaseModel>>
where
    C: ConnectionTrait,
{
    Lease::find()
        .filter(lease::Column::TenantId.eq(tenant_id))
        .filter(lease::Column::IsActive.eq(true))
        .order_by_asc(lease::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active recurring charges billed monthly on a lease.
pub async fn get_recurring_charges<C>(db: &C, lease_id: i64) -> Result<Vec<RecurringChargeModel>>
where
    C: ConnectionTrait,
{
    RecurringCharge::find()
        .filter(recurring_charge::Column::LeaseId.eq(lease_id))
        .filter(recurring_charge::Column::IsActive.eq(true))
        .order_by_asc(recurring_charge::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
