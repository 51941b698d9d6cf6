//! Scheduled rent escalations.

use crate::{
    core::money::{percent_of, round_money},
    entities::{LeaseModel, RateType, lease, rent_escalation_log},
    errors::{Error, Result},
};
use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{Set, prelude::*};
use tracing::info;

/// Rent after one escalation step.
#[must_use]
pub fn escalated_rent(rent: Decimal, rate_type: RateType, amount: Decimal) -> Decimal {
    match rate_type {
        RateType::Percentage => round_money(rent + percent_of(rent, amount)),
        RateType::Fixed => round_money(rent + amount),
    }
}

/// Applies every escalation due on or before `through`, one per year, logging each.
///
/// Returns the lease as persisted afterwards; a lease without a schedule is
/// returned unchanged.
pub async fn apply_due_escalations<C>(
    db: &C,
    lease: LeaseModel,
    through: NaiveDate,
    actor: &str,
) -> Result<LeaseModel>
where
    C: ConnectionTrait,
{
    let (Some(rate_type), Some(mut next_date)) = (lease.escalation_type, lease.next_escalation_date) else {
        return Ok(lease);
    };
    if lease.escalation_amount <= Decimal::ZERO || next_date > through {
        return Ok(lease);
    }

    let mut rent = lease.monthly_rent;
    while next_date <= through {
        let new_rent = escalated_rent(rent, rate_type, lease.escalation_amount);
        rent_escalation_log::ActiveModel {
            lease_id: Set(lease.id),
            previous_rent: Set(rent),
            new_rent: Set(new_rent),
            effective_date: Set(next_date),
            applied_by: Set(actor.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(
            "Lease {} rent escalated {} -> {} effective {}",
            lease.id, rent, new_rent, next_date
        );
        rent = new_rent;
        next_date = next_date
            .checked_add_months(Months::new(12))
            .ok_or_else(|| Error::Validation {
                message: format!("Escalation date {next_date} cannot be advanced"),
            })?;
    }

    let mut active_model: lease::ActiveModel = lease.into();
    active_model.monthly_rent = Set(rent);
    active_model.next_escalation_date = Set(Some(next_date));
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}
