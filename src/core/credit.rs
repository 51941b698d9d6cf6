//! Tenant credit balances - money received beyond what was owed.

use crate::{
    core::money::round_money,
    entities::{TenantCreditBalance, tenant_credit_balance},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use tracing::debug;

/// Current credit held for a tenant; zero when no balance row exists.
pub async fn get_credit_balance<C>(db: &C, tenant_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    Ok(find_balance(db, tenant_id)
        .await?
        .map_or(Decimal::ZERO, |row| row.balance))
}

async fn find_balance<C>(db: &C, tenant_id: i64) -> Result<Option<tenant_credit_balance::Model>>
where
    C: ConnectionTrait,
{
    TenantCreditBalance::find()
        .filter(tenant_credit_balance::Column::TenantId.eq(tenant_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds `amount` to a tenant's credit, creating the balance row on first use.
pub async fn add_credit<C>(db: &C, tenant_id: i64, amount: Decimal) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let new_balance = match find_balance(db, tenant_id).await? {
        Some(existing) => {
            let new_balance = existing.balance + amount;
            let mut active_model: tenant_credit_balance::ActiveModel = existing.into();
            active_model.balance = Set(new_balance);
            active_model.updated_at = Set(Utc::now());
            active_model.update(db).await?;
            new_balance
        }
        None => {
            tenant_credit_balance::ActiveModel {
                tenant_id: Set(tenant_id),
                balance: Set(amount),
                updated_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            amount
        }
    };

    debug!("Tenant {} credit +{} -> {}", tenant_id, amount, new_balance);
    Ok(new_balance)
}

/// Takes up to `wanted` from a tenant's credit and returns how much was taken.
///
/// The balance never goes below zero.
pub async fn consume_credit<C>(db: &C, tenant_id: i64, wanted: Decimal) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    if wanted <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let Some(existing) = find_balance(db, tenant_id).await? else {
        return Ok(Decimal::ZERO);
    };

    let taken = existing.balance.min(round_money(wanted));
    if taken <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let remaining = existing.balance - taken;
    let mut active_model: tenant_credit_balance::ActiveModel = existing.into();
    active_model.balance = Set(remaining);
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await?;

    debug!("Tenant {} credit -{} -> {}", tenant_id, taken, remaining);
    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_credit_starts_at_zero_and_accumulates() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let tenant_id = fixture.tenant.id;
        assert_eq!(get_credit_balance(&fixture.db, tenant_id).await?, Decimal::ZERO);

        add_credit(&fixture.db, tenant_id, dec!(120.50)).await?;
        let balance = add_credit(&fixture.db, tenant_id, dec!(79.50)).await?;

        assert_eq!(balance, dec!(200.00));
        assert_eq!(get_credit_balance(&fixture.db, tenant_id).await?, dec!(200.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_never_goes_negative() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let tenant_id = fixture.tenant.id;
        add_credit(&fixture.db, tenant_id, dec!(300)).await?;

        assert_eq!(consume_credit(&fixture.db, tenant_id, dec!(120)).await?, dec!(120));
        assert_eq!(consume_credit(&fixture.db, tenant_id, dec!(500)).await?, dec!(180));
        assert_eq!(consume_credit(&fixture.db, tenant_id, dec!(10)).await?, Decimal::ZERO);
        assert_eq!(get_credit_balance(&fixture.db, tenant_id).await?, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_credit_rejects_non_positive() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let result = add_credit(&fixture.db, fixture.tenant.id, dec!(-5)).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        Ok(())
    }
}
