//! Invoice generation from lease terms.
//!
//! Every invoice is built inside one unit of work while the lease's lock is held:
//! the duplicate check, escalation, arrears carry-over, line items and credit
//! application either all persist or none do.

use crate::{
    config::settings::BillingSettings,
    core::{
        allocation::outstanding_invoices,
        credit,
        escalation::apply_due_escalations,
        invoice::{self as invoice_ops, NewInvoice, apply_lock},
        lease::{get_active_leases, get_recurring_charges, require_lease, require_property},
        ledger::{self, NewLineItem, NewPayment, compute_totals},
        locks::LeaseLocks,
        money::{percent_of, round_money},
        unit_of_work::UnitOfWork,
    },
    entities::{
        Invoice, InvoiceKind, InvoiceModel, InvoiceStatus, LeaseModel, LineItemCategory,
        PaymentMethod, PropertyModel, RateType, invoice, line_item,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// An invoice together with its lines. `created` is false when an existing invoice
/// for the same period was returned instead.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedInvoice {
    /// The invoice after recalculation
    pub invoice: InvoiceModel,
    /// Its lines in billing order
    pub line_items: Vec<line_item::Model>,
    /// False when an existing invoice was returned
    pub created: bool,
}

/// Outcome of a monthly run over all active leases.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    /// Invoices created
    pub created: usize,
    /// Leases already billed for the month
    pub skipped: usize,
    /// Leases whose generation failed
    pub failed: usize,
    /// Lease id and error text of each failure
    pub errors: Vec<(i64, String)>,
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| Error::Validation {
        message: format!("{year}-{month:02} is not a valid month"),
    })?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next
        .and_then(|n| n.pred_opt())
        .ok_or_else(|| Error::Validation {
            message: format!("{year}-{month:02} has no end"),
        })?;
    Ok((start, end))
}

/// The lease's due day in the month of `month_start`, clamped to the month length.
#[must_use]
pub fn due_date_in_month(month_start: NaiveDate, month_end: NaiveDate, due_day: i32) -> NaiveDate {
    let day = u32::try_from(due_day.max(1)).unwrap_or(1).min(month_end.day());
    month_start.with_day(day).unwrap_or(month_end)
}

/// Rent for the part of the month from `start` to month end, by day count.
#[must_use]
pub fn prorated_rent(monthly_rent: Decimal, start: NaiveDate, month_end: NaiveDate) -> Decimal {
    if start.day() == 1 {
        return round_money(monthly_rent);
    }
    let days_in_month = Decimal::from(month_end.day());
    let days_billed = Decimal::from(month_end.day() - start.day() + 1);
    round_money(monthly_rent * days_billed / days_in_month)
}

/// Late fee charged for one overdue invoice.
#[must_use]
pub fn late_fee(rate_type: RateType, amount: Decimal, balance_due: Decimal) -> Decimal {
    match rate_type {
        RateType::Percentage => percent_of(balance_due, amount),
        RateType::Fixed => round_money(amount),
    }
}

/// Tax rate applying to invoices of a property.
#[must_use]
pub fn tax_rate_for(property: &PropertyModel, settings: &BillingSettings) -> Decimal {
    if property.is_commercial {
        settings.tax_rate
    } else {
        Decimal::ZERO
    }
}

/// Builds initial and monthly invoices.
pub struct InvoiceGenerator {
    db: DatabaseConnection,
    settings: BillingSettings,
    locks: LeaseLocks,
}

impl InvoiceGenerator {
    /// Creates a generator with a settings snapshot and the shared lease locks.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: BillingSettings, locks: LeaseLocks) -> Self {
        Self { db, settings, locks }
    }

    /// Generates the first invoice of a lease, covering its start date to the end
    /// of that month. The invoice is issued and locked straight away.
    ///
    /// Calling it again returns the existing invoice.
    #[instrument(skip(self))]
    pub async fn generate_initial_invoice(&self, lease_id: i64, actor: &str) -> Result<GeneratedInvoice> {
        let _guard = self.locks.lock(lease_id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let lease = require_lease(uow.conn(), lease_id).await?;
        let (month_start, month_end) = month_bounds(lease.start_date.year(), lease.start_date.month())?;

        if let Some(existing) = find_period_invoice(uow.conn(), lease.id, month_start, month_end).await? {
            debug!("Initial invoice for lease {} already exists", lease.id);
            return existing_result(&uow, existing).await;
        }

        let property = require_property(uow.conn(), lease.property_id).await?;
        let due_date = due_date_in_month(month_start, month_end, lease.due_day).max(lease.start_date);
        let header = NewInvoice {
            lease_id: lease.id,
            tenant_id: lease.tenant_id,
            kind: InvoiceKind::Initial,
            status: InvoiceStatus::Sent,
            issue_date: lease.start_date,
            due_date,
            period_start: lease.start_date,
            period_end: month_end,
            tax_rate: tax_rate_for(&property, &self.settings),
            parent_invoice_id: None,
        };
        let created = invoice_ops::insert_invoice(&mut uow, header).await?;

        let mut line_items = Vec::new();
        let prior = prior_outstanding(&uow, &lease, lease.start_date, created.id).await?;
        if let Some(arrears) = carry_over_arrears(&mut uow, created.id, &prior).await? {
            line_items.push(arrears);
        }

        for line in initial_lines(&lease, month_end) {
            line_items.push(ledger::insert_line_item_unchecked(&mut uow, created.id, line).await?);
        }

        let mut active_model: invoice::ActiveModel = created.into();
        apply_lock(&mut active_model, InvoiceStatus::Sent, actor);
        let locked = active_model.update(uow.conn()).await?;

        let invoice = committed(uow, locked).await?;
        info!(
            "Initial invoice {} generated for lease {}: total {}",
            invoice.invoice_number, lease.id, invoice.total
        );
        Ok(GeneratedInvoice {
            invoice,
            line_items,
            created: true,
        })
    }

    /// Generates the invoice for one billing month. Without `force`, an existing
    /// regular or initial invoice for that month is returned instead.
    #[instrument(skip(self))]
    pub async fn generate_monthly_invoice(
        &self,
        lease_id: i64,
        year: i32,
        month: u32,
        force: bool,
    ) -> Result<GeneratedInvoice> {
        let (period_start, period_end) = month_bounds(year, month)?;
        let _guard = self.locks.lock(lease_id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let lease = require_lease(uow.conn(), lease_id).await?;

        if !force {
            if let Some(existing) = find_period_invoice(uow.conn(), lease.id, period_start, period_end).await? {
                debug!("Invoice for lease {} {}-{:02} already exists", lease.id, year, month);
                return existing_result(&uow, existing).await;
            }
        }
        if !lease.is_active {
            return Err(Error::InvalidState {
                message: format!("Lease {} is not active", lease.id),
            });
        }
        if lease.start_date > period_end {
            return Err(Error::Validation {
                message: format!("Lease {} starts after {year}-{month:02}", lease.id),
            });
        }

        let lease = apply_due_escalations(uow.conn(), lease, period_end, &self.settings.system_actor).await?;
        let property = require_property(uow.conn(), lease.property_id).await?;
        let header = NewInvoice {
            lease_id: lease.id,
            tenant_id: lease.tenant_id,
            kind: InvoiceKind::Regular,
            status: InvoiceStatus::Sent,
            issue_date: period_start,
            due_date: due_date_in_month(period_start, period_end, lease.due_day),
            period_start,
            period_end,
            tax_rate: tax_rate_for(&property, &self.settings),
            parent_invoice_id: None,
        };
        let created = invoice_ops::insert_invoice(&mut uow, header).await?;

        let prior = prior_outstanding(&uow, &lease, period_start, created.id).await?;
        let late_fees = late_fee_line(&lease, &prior, period_start);

        let mut line_items = Vec::new();
        if let Some(arrears) = carry_over_arrears(&mut uow, created.id, &prior).await? {
            line_items.push(arrears);
        }
        line_items.push(
            ledger::insert_line_item_unchecked(
                &mut uow,
                created.id,
                NewLineItem::single(
                    format!("Rent {year}-{month:02}"),
                    LineItemCategory::Rent,
                    lease.monthly_rent,
                ),
            )
            .await?,
        );
        for charge in get_recurring_charges(uow.conn(), lease.id).await? {
            line_items.push(
                ledger::insert_line_item_unchecked(
                    &mut uow,
                    created.id,
                    NewLineItem::single(charge.description, charge.category, charge.amount),
                )
                .await?,
            );
        }
        if let Some(fee) = late_fees {
            line_items.push(ledger::insert_line_item_unchecked(&mut uow, created.id, fee).await?);
        }

        let totals = compute_totals(&line_items, &[], created.tax_rate);
        let applied_credit = credit::consume_credit(uow.conn(), lease.tenant_id, totals.total).await?;
        if applied_credit > Decimal::ZERO {
            ledger::insert_payment(
                &mut uow,
                NewPayment {
                    invoice_id: created.id,
                    amount: applied_credit,
                    allocated_amount: applied_credit,
                    payment_date: period_start,
                    method: PaymentMethod::CreditBalance,
                    reference: Some("Tenant credit".to_string()),
                    recorded_by: self.settings.system_actor.clone(),
                    is_overpayment: false,
                },
            )
            .await?;
            debug!("Applied {} tenant credit to invoice {}", applied_credit, created.invoice_number);
        }

        let invoice = committed(uow, created).await?;
        info!(
            "Invoice {} generated for lease {}: total {} balance {}",
            invoice.invoice_number, lease.id, invoice.total, invoice.balance_due
        );
        Ok(GeneratedInvoice {
            invoice,
            line_items,
            created: true,
        })
    }

    /// Runs monthly generation for every active lease. A failing lease is logged
    /// and counted; the run continues with the next one.
    #[instrument(skip(self))]
    pub async fn generate_monthly_invoices(&self, year: i32, month: u32, force: bool) -> Result<GenerationSummary> {
        month_bounds(year, month)?;
        let leases = get_active_leases(&self.db).await?;
        let mut summary = GenerationSummary::default();

        for lease in leases {
            match self.generate_monthly_invoice(lease.id, year, month, force).await {
                Ok(generated) if generated.created => summary.created += 1,
                Ok(_) => summary.skipped += 1,
                Err(e) => {
                    warn!("Invoice generation failed for lease {}: {}", lease.id, e);
                    summary.failed += 1;
                    summary.errors.push((lease.id, e.to_string()));
                }
            }
        }

        info!(
            "Monthly generation {}-{:02}: {} created, {} skipped, {} failed",
            year, month, summary.created, summary.skipped, summary.failed
        );
        Ok(summary)
    }
}

/// Rent, deposit and fee lines of an initial invoice, in billing order.
fn initial_lines(lease: &LeaseModel, month_end: NaiveDate) -> Vec<NewLineItem> {
    let mut lines = Vec::new();
    let rent = prorated_rent(lease.monthly_rent, lease.start_date, month_end);
    let rent_label = if lease.start_date.day() == 1 {
        "Rent".to_string()
    } else {
        format!("Rent (pro-rated from {})", lease.start_date)
    };
    lines.push(NewLineItem::single(rent_label, LineItemCategory::Rent, rent));

    if lease.deposit > Decimal::ZERO {
        lines.push(NewLineItem::single(
            "Security deposit",
            LineItemCategory::SecurityDeposit,
            lease.deposit,
        ));
    }

    let fees = [
        (lease.pro_rata_fee_percent, "Pro-rata fee", LineItemCategory::ProRataFee),
        (lease.management_fee_percent, "Management fee", LineItemCategory::ManagementFee),
        (lease.procurement_fee_percent, "Procurement fee", LineItemCategory::ProcurementFee),
    ];
    for (percent, label, category) in fees {
        if let Some(percent) = percent.filter(|p| *p > Decimal::ZERO) {
            lines.push(NewLineItem::single(
                format!("{label} ({percent}%)"),
                category,
                percent_of(lease.monthly_rent, percent),
            ));
        }
    }
    lines
}

/// Summed late fee over prior invoices still unpaid after their grace period.
fn late_fee_line(lease: &LeaseModel, prior: &[InvoiceModel], period_start: NaiveDate) -> Option<NewLineItem> {
    let rate_type = lease.late_fee_type?;
    if lease.late_fee_amount <= Decimal::ZERO {
        return None;
    }
    let grace = Days::new(u64::try_from(lease.late_fee_grace_days.max(0)).unwrap_or(0));

    let overdue: Vec<&InvoiceModel> = prior
        .iter()
        .filter(|i| i.due_date.checked_add_days(grace).is_some_and(|d| d < period_start))
        .collect();
    if overdue.is_empty() {
        return None;
    }

    let total: Decimal = overdue
        .iter()
        .map(|i| late_fee(rate_type, lease.late_fee_amount, i.balance_due))
        .sum();
    Some(NewLineItem::single(
        format!("Late fee ({} overdue invoice(s))", overdue.len()),
        LineItemCategory::LateFee,
        total,
    ))
}

/// Outstanding invoices of the lease due before `before`, excluding the invoice
/// being built. Other leases of the same tenant are never touched.
async fn prior_outstanding(
    uow: &UnitOfWork,
    lease: &LeaseModel,
    before: NaiveDate,
    exclude_id: i64,
) -> Result<Vec<InvoiceModel>> {
    Ok(outstanding_invoices(uow.conn(), lease.id)
        .await?
        .into_iter()
        .filter(|i| i.id != exclude_id && i.due_date < before)
        .collect())
}

/// Moves the balances of `prior` onto one arrears line and closes them as carried forward.
async fn carry_over_arrears(
    uow: &mut UnitOfWork,
    invoice_id: i64,
    prior: &[InvoiceModel],
) -> Result<Option<line_item::Model>> {
    let arrears: Decimal = prior.iter().map(|i| i.balance_due).sum();
    if arrears <= Decimal::ZERO {
        return Ok(None);
    }

    let numbers: Vec<&str> = prior.iter().map(|i| i.invoice_number.as_str()).collect();
    let line = ledger::insert_line_item_unchecked(
        uow,
        invoice_id,
        NewLineItem::single(
            format!("Arrears brought forward ({})", numbers.join(", ")),
            LineItemCategory::Arrears,
            arrears,
        ),
    )
    .await?;

    for source in prior {
        let mut active_model: invoice::ActiveModel = source.clone().into();
        active_model.status = Set(InvoiceStatus::CarriedForward);
        active_model.update(uow.conn()).await?;
    }
    debug!("Carried {} arrears from {} invoice(s)", arrears, prior.len());
    Ok(Some(line))
}

/// A live (not cancelled, not interim) invoice of the lease whose period starts in the month.
async fn find_period_invoice<C>(
    db: &C,
    lease_id: i64,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> Result<Option<InvoiceModel>>
where
    C: ConnectionTrait,
{
    Invoice::find()
        .filter(invoice::Column::LeaseId.eq(lease_id))
        .filter(invoice::Column::Kind.is_in([InvoiceKind::Initial, InvoiceKind::Regular]))
        .filter(invoice::Column::Status.ne(InvoiceStatus::Cancelled))
        .filter(invoice::Column::PeriodStart.between(month_start, month_end))
        .order_by_asc(invoice::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn existing_result(uow: &UnitOfWork, existing: InvoiceModel) -> Result<GeneratedInvoice> {
    let line_items = invoice_ops::get_line_items(uow.conn(), existing.id).await?;
    Ok(GeneratedInvoice {
        invoice: existing,
        line_items,
        created: false,
    })
}

/// Commits and returns the recalculated state of `invoice`.
async fn committed(uow: UnitOfWork, invoice: InvoiceModel) -> Result<InvoiceModel> {
    let id = invoice.id;
    let recalculated = uow.commit().await?;
    Ok(recalculated
        .into_iter()
        .find(|i| i.id == id)
        .unwrap_or(invoice))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::credit::{add_credit, get_credit_balance};
    use crate::core::invoice::{get_invoices_for_lease, get_payments, require_invoice};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn generator(db: &DatabaseConnection, tax_rate: Decimal) -> InvoiceGenerator {
        let settings = BillingSettings {
            tax_rate,
            ..BillingSettings::default()
        };
        InvoiceGenerator::new(db.clone(), settings, LeaseLocks::new())
    }

    #[test]
    fn test_month_bounds_and_due_date_clamp() {
        let (start, end) = month_bounds(2024, 2).unwrap();
        assert_eq!(start, date(2024, 2, 1));
        assert_eq!(end, date(2024, 2, 29));
        assert_eq!(due_date_in_month(start, end, 31), date(2024, 2, 29));
        assert_eq!(due_date_in_month(start, end, 7), date(2024, 2, 7));

        let (_, december_end) = month_bounds(2025, 12).unwrap();
        assert_eq!(december_end, date(2025, 12, 31));
        assert!(month_bounds(2025, 13).is_err());
    }

    #[test]
    fn test_prorated_rent_by_day_count() {
        assert_eq!(prorated_rent(dec!(3000), date(2025, 4, 1), date(2025, 4, 30)), dec!(3000.00));
        assert_eq!(prorated_rent(dec!(3000), date(2025, 4, 16), date(2025, 4, 30)), dec!(1500.00));
        assert_eq!(prorated_rent(dec!(3100), date(2025, 1, 31), date(2025, 1, 31)), dec!(100.00));
    }

    #[test]
    fn test_late_fee_policies() {
        assert_eq!(late_fee(RateType::Percentage, dec!(10), dec!(850)), dec!(85.00));
        assert_eq!(late_fee(RateType::Fixed, dec!(150), dec!(850)), dec!(150.00));
    }

    #[tokio::test]
    async fn test_initial_invoice_is_prorated_sent_and_locked() -> Result<()> {
        let db = setup_test_db().await?;
        let tenant = create_test_tenant(&db, "T1001", "Ada Mokoena").await?;
        let property = create_test_property(&db, "Unit 4", true).await?;
        let lease = create_custom_lease(
            &db,
            tenant.id,
            property.id,
            date(2025, 4, 16),
            dec!(3000),
            dec!(3000),
        )
        .await?;
        set_fee_percentages(&db, lease.id, Some(dec!(10)), None, None).await?;

        let generated = generator(&db, dec!(15)).generate_initial_invoice(lease.id, "agent").await?;
        let invoice = generated.invoice;

        assert!(generated.created);
        assert_eq!(invoice.kind, InvoiceKind::Initial);
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert!(invoice.is_locked);
        assert_eq!(invoice.locked_by.as_deref(), Some("agent"));
        assert_eq!(invoice.period_start, date(2025, 4, 16));
        assert_eq!(invoice.period_end, date(2025, 4, 30));
        assert_eq!(invoice.due_date, date(2025, 4, 16));

        let categories: Vec<_> = generated.line_items.iter().map(|l| l.category).collect();
        assert_eq!(
            categories,
            vec![
                LineItemCategory::Rent,
                LineItemCategory::SecurityDeposit,
                LineItemCategory::ProRataFee
            ]
        );
        assert_eq!(generated.line_items[0].line_total, dec!(1500.00));
        assert_eq!(generated.line_items[2].line_total, dec!(300.00));
        assert_eq!(invoice.subtotal, dec!(4800.00));
        assert_eq!(invoice.tax_amount, dec!(720.00));
        assert_eq!(invoice.total, invoice.subtotal + invoice.tax_amount);
        Ok(())
    }

    #[tokio::test]
    async fn test_initial_invoice_generated_once() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let generator = generator(&fixture.db, Decimal::ZERO);

        let first = generator.generate_initial_invoice(fixture.lease.id, "agent").await?;
        let second = generator.generate_initial_invoice(fixture.lease.id, "agent").await?;

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.invoice.id, second.invoice.id);
        assert_eq!(get_invoices_for_lease(&fixture.db, fixture.lease.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_generation_is_idempotent_unless_forced() -> Result<()> {
        init_test_tracing();
        let fixture = setup_with_lease().await?;
        let generator = generator(&fixture.db, Decimal::ZERO);

        let first = generator.generate_monthly_invoice(fixture.lease.id, 2025, 3, false).await?;
        let again = generator.generate_monthly_invoice(fixture.lease.id, 2025, 3, false).await?;
        assert!(first.created);
        assert!(!again.created);
        assert_eq!(first.invoice.id, again.invoice.id);

        let forced = generator.generate_monthly_invoice(fixture.lease.id, 2025, 3, true).await?;
        assert!(forced.created);
        assert_ne!(forced.invoice.id, first.invoice.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_skips_month_billed_by_initial_invoice() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let generator = generator(&fixture.db, Decimal::ZERO);
        let initial = generator.generate_initial_invoice(fixture.lease.id, "agent").await?;

        let start = fixture.lease.start_date;
        let monthly = generator
            .generate_monthly_invoice(fixture.lease.id, start.year(), start.month(), false)
            .await?;
        assert!(!monthly.created);
        assert_eq!(monthly.invoice.id, initial.invoice.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_arrears_carried_once_and_conserved() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let generator = generator(&fixture.db, Decimal::ZERO);

        let january = generator.generate_monthly_invoice(fixture.lease.id, 2025, 1, false).await?;
        record_test_payment(&fixture.db, january.invoice.id, dec!(400)).await?;

        let february = generator.generate_monthly_invoice(fixture.lease.id, 2025, 2, false).await?;
        let arrears: Vec<_> = february
            .line_items
            .iter()
            .filter(|l| l.category == LineItemCategory::Arrears)
            .collect();
        assert_eq!(arrears.len(), 1);
        assert_eq!(arrears[0].line_total, dec!(600.00));
        assert_eq!(february.line_items[0].category, LineItemCategory::Arrears);
        assert_eq!(february.invoice.total, dec!(1600.00));
        assert_eq!(
            require_invoice(&fixture.db, january.invoice.id).await?.status,
            InvoiceStatus::CarriedForward
        );

        record_test_payment(&fixture.db, february.invoice.id, dec!(1600)).await?;
        let march = generator.generate_monthly_invoice(fixture.lease.id, 2025, 3, false).await?;
        assert!(march.line_items.iter().all(|l| l.category != LineItemCategory::Arrears));
        assert_eq!(march.invoice.total, dec!(1000.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_monthly_lines_recurring_charges_and_late_fee() -> Result<()> {
        let fixture = setup_with_lease().await?;
        add_recurring_charge(&fixture.db, fixture.lease.id, "Parking", dec!(250)).await?;
        set_late_fee(&fixture.db, fixture.lease.id, RateType::Percentage, dec!(10), 3).await?;
        let generator = generator(&fixture.db, Decimal::ZERO);

        generator.generate_monthly_invoice(fixture.lease.id, 2025, 1, false).await?;
        let february = generator.generate_monthly_invoice(fixture.lease.id, 2025, 2, false).await?;

        let categories: Vec<_> = february.line_items.iter().map(|l| l.category).collect();
        assert_eq!(
            categories,
            vec![
                LineItemCategory::Arrears,
                LineItemCategory::Rent,
                LineItemCategory::Recurring,
                LineItemCategory::LateFee
            ]
        );
        // January: 1000 rent + 250 parking, unpaid; 10% late fee on 1250.
        assert_eq!(february.line_items[0].line_total, dec!(1250.00));
        assert_eq!(february.line_items[3].line_total, dec!(125.00));
        assert_eq!(february.invoice.total, dec!(2625.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_covering_invoice_pays_it_in_full() -> Result<()> {
        let fixture = setup_with_lease().await?;
        add_credit(&fixture.db, fixture.tenant.id, dec!(1500)).await?;

        let generated = generator(&fixture.db, Decimal::ZERO)
            .generate_monthly_invoice(fixture.lease.id, 2025, 3, false)
            .await?;

        assert_eq!(generated.invoice.status, InvoiceStatus::Paid);
        assert_eq!(generated.invoice.balance_due, Decimal::ZERO);
        assert_eq!(get_credit_balance(&fixture.db, fixture.tenant.id).await?, dec!(500));

        let payments = get_payments(&fixture.db, generated.invoice.id).await?;
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].method, PaymentMethod::CreditBalance);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_credit_is_exhausted() -> Result<()> {
        let fixture = setup_with_lease().await?;
        add_credit(&fixture.db, fixture.tenant.id, dec!(300)).await?;

        let generated = generator(&fixture.db, Decimal::ZERO)
            .generate_monthly_invoice(fixture.lease.id, 2025, 3, false)
            .await?;

        assert_eq!(generated.invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(generated.invoice.balance_due, dec!(700.00));
        assert_eq!(get_credit_balance(&fixture.db, fixture.tenant.id).await?, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_escalation_applied_before_billing() -> Result<()> {
        let fixture = setup_with_lease().await?;
        set_escalation(&fixture.db, fixture.lease.id, RateType::Fixed, dec!(100), date(2025, 3, 1)).await?;
        let generator = generator(&fixture.db, Decimal::ZERO);

        let february = generator.generate_monthly_invoice(fixture.lease.id, 2025, 2, false).await?;
        assert_eq!(february.invoice.total, dec!(1000.00));
        record_test_payment(&fixture.db, february.invoice.id, dec!(1000)).await?;

        let march = generator.generate_monthly_invoice(fixture.lease.id, 2025, 3, false).await?;
        assert_eq!(march.invoice.total, dec!(1100.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_for_all_active_leases_counts_outcomes() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let second = create_test_lease(&fixture.db, fixture.tenant.id, fixture.property.id).await?;
        let generator = generator(&fixture.db, Decimal::ZERO);
        generator.generate_monthly_invoice(second.id, 2025, 5, false).await?;

        let summary = generator.generate_monthly_invoices(2025, 5, false).await?;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        Ok(())
    }
}
