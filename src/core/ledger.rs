//! Money ledger model - the single source of truth for invoice totals.
//!
//! [`compute_totals`] and [`derive_status`] are pure; [`recalculate_invoice`] applies
//! them to a stored invoice. The `insert_*` helpers are the only writers of line items
//! and payments, and they queue recalculation on the unit of work rather than
//! recomputing per row.

use crate::{
    core::{money::round_money, unit_of_work::UnitOfWork},
    entities::{
        Invoice, InvoiceStatus, Lease, LineItem, LineItemCategory, Payment, PaymentMethod,
        invoice, invoice::Model as InvoiceModel, lease, line_item, payment,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, instrument};

/// Totals derived from an invoice's lines and payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    /// Sum of every line total
    pub subtotal: Decimal,
    /// Sum of the taxable line totals
    pub taxable_subtotal: Decimal,
    /// Tax on the taxable subtotal
    pub tax_amount: Decimal,
    /// `subtotal + tax_amount`
    pub total: Decimal,
    /// Sum of allocated amounts of non-void payments
    pub amount_paid: Decimal,
    /// `total - amount_paid`, negative when overpaid
    pub signed_balance: Decimal,
}

impl InvoiceTotals {
    /// Balance shown to the tenant, never below zero.
    #[must_use]
    pub fn balance_due(&self) -> Decimal {
        self.signed_balance.max(Decimal::ZERO)
    }
}

/// Computes invoice totals from its lines and payments.
///
/// Tax applies to taxable lines only; arrears and adjustment lines were taxed on
/// the invoice they originate from.
#[must_use]
pub fn compute_totals(
    lines: &[line_item::Model],
    payments: &[payment::Model],
    tax_rate: Decimal,
) -> InvoiceTotals {
    let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
    let taxable_subtotal: Decimal = lines
        .iter()
        .filter(|l| l.category.is_taxable())
        .map(|l| l.line_total)
        .sum();
    let tax_amount = round_money(taxable_subtotal * tax_rate / Decimal::ONE_HUNDRED);
    let total = subtotal + tax_amount;
    let amount_paid: Decimal = payments
        .iter()
        .filter(|p| !p.is_void)
        .map(|p| p.allocated_amount)
        .sum();

    InvoiceTotals {
        subtotal,
        taxable_subtotal,
        tax_amount,
        total,
        amount_paid,
        signed_balance: total - amount_paid,
    }
}

/// Derives the payment-driven status of an invoice.
///
/// Draft, cancelled and carried-forward invoices are never changed here.
#[must_use]
pub fn derive_status(
    current: InvoiceStatus,
    is_locked: bool,
    totals: &InvoiceTotals,
) -> InvoiceStatus {
    match current {
        InvoiceStatus::Draft | InvoiceStatus::Cancelled | InvoiceStatus::CarriedForward => current,
        _ if totals.signed_balance <= Decimal::ZERO => InvoiceStatus::Paid,
        _ if totals.amount_paid > Decimal::ZERO => InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Paid | InvoiceStatus::PartiallyPaid if is_locked => InvoiceStatus::Locked,
        InvoiceStatus::Paid | InvoiceStatus::PartiallyPaid => InvoiceStatus::Sent,
        unpaid => unpaid,
    }
}

/// Totals of an invoice computed from the rows visible on `db`, including writes
/// of the current unit of work that have not been flushed yet.
pub async fn current_totals<C>(db: &C, invoice: &InvoiceModel) -> Result<InvoiceTotals>
where
    C: ConnectionTrait,
{
    let lines = LineItem::find()
        .filter(line_item::Column::InvoiceId.eq(invoice.id))
        .all(db)
        .await?;
    let payments = Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice.id))
        .all(db)
        .await?;
    Ok(compute_totals(&lines, &payments, invoice.tax_rate))
}

/// Recomputes and stores an invoice's totals and status, and touches the owning
/// lease's `updated_at`. Calling it repeatedly yields the same totals.
#[instrument(skip(db))]
pub async fn recalculate_invoice<C>(db: &C, invoice_id: i64) -> Result<InvoiceModel>
where
    C: ConnectionTrait,
{
    let invoice = Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invoice", invoice_id))?;

    let totals = current_totals(db, &invoice).await?;
    let status = derive_status(invoice.status, invoice.is_locked, &totals);
    let now = Utc::now();
    let lease_id = invoice.lease_id;

    let mut active_model: invoice::ActiveModel = invoice.into();
    active_model.subtotal = Set(totals.subtotal);
    active_model.tax_amount = Set(totals.tax_amount);
    active_model.total = Set(totals.total);
    active_model.amount_paid = Set(totals.amount_paid);
    active_model.balance_due = Set(totals.balance_due());
    active_model.status = Set(status);
    active_model.updated_at = Set(now);
    let updated = active_model.update(db).await?;

    Lease::update_many()
        .col_expr(lease::Column::UpdatedAt, Expr::value(now))
        .filter(lease::Column::Id.eq(lease_id))
        .exec(db)
        .await?;

    debug!(
        "Invoice {} recalculated: total={} paid={} balance={} status={:?}",
        updated.invoice_number, updated.total, updated.amount_paid, updated.balance_due, status
    );
    Ok(updated)
}

/// A line to append to an invoice.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    /// Text printed on the invoice
    pub description: String,
    /// What the line charges for
    pub category: LineItemCategory,
    /// Units billed
    pub quantity: Decimal,
    /// Price per unit
    pub unit_price: Decimal,
}

impl NewLineItem {
    /// A quantity-one line.
    pub fn single(description: impl Into<String>, category: LineItemCategory, amount: Decimal) -> Self {
        Self {
            description: description.into(),
            category,
            quantity: Decimal::ONE,
            unit_price: amount,
        }
    }

    /// `quantity * unit_price`, rounded to cents.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.quantity * self.unit_price)
    }
}

/// Appends a line to `invoice` and queues its recalculation.
///
/// Locked invoices are rejected with [`Error::InvoiceLocked`].
pub async fn insert_line_item(
    uow: &mut UnitOfWork,
    invoice: &InvoiceModel,
    line: NewLineItem,
) -> Result<line_item::Model> {
    if invoice.is_locked {
        return Err(Error::InvoiceLocked {
            invoice_id: invoice.id,
        });
    }
    insert_line_item_unchecked(uow, invoice.id, line).await
}

/// Adds a line without checking the invoice lock. Generation uses it while building a new invoice.
pub(crate) async fn insert_line_item_unchecked(
    uow: &mut UnitOfWork,
    invoice_id: i64,
    line: NewLineItem,
) -> Result<line_item::Model> {
    if line.quantity <= Decimal::ZERO {
        return Err(Error::Validation {
            message: format!("Line '{}' must have a positive quantity", line.description),
        });
    }

    let position = LineItem::find()
        .filter(line_item::Column::InvoiceId.eq(invoice_id))
        .order_by_desc(line_item::Column::Position)
        .one(uow.conn())
        .await?
        .map_or(0, |last| last.position + 1);

    let model = line_item::ActiveModel {
        invoice_id: Set(invoice_id),
        position: Set(position),
        line_total: Set(line.line_total()),
        description: Set(line.description),
        category: Set(line.category),
        quantity: Set(line.quantity),
        unit_price: Set(round_money(line.unit_price)),
        ..Default::default()
    };
    let inserted = model.insert(uow.conn()).await?;
    uow.mark_dirty(invoice_id);
    Ok(inserted)
}

/// A payment to record against one invoice.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Invoice the payment settles
    pub invoice_id: i64,
    /// Full amount received from the source
    pub amount: Decimal,
    /// Part of the amount applied to this invoice
    pub allocated_amount: Decimal,
    /// Date the money was received
    pub payment_date: NaiveDate,
    /// How it was paid
    pub method: PaymentMethod,
    /// Bank or receipt reference
    pub reference: Option<String>,
    /// Who recorded the payment
    pub recorded_by: String,
    /// Whether the source paid more than was owed
    pub is_overpayment: bool,
}

/// Records a payment and queues its invoice for recalculation.
pub async fn insert_payment(uow: &mut UnitOfWork, payment: NewPayment) -> Result<payment::Model> {
    if payment.allocated_amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount {
            amount: payment.allocated_amount,
        });
    }

    let model = payment::ActiveModel {
        invoice_id: Set(payment.invoice_id),
        amount: Set(round_money(payment.amount)),
        allocated_amount: Set(round_money(payment.allocated_amount)),
        payment_date: Set(payment.payment_date),
        method: Set(payment.method),
        reference: Set(payment.reference),
        recorded_by: Set(payment.recorded_by),
        is_overpayment: Set(payment.is_overpayment),
        is_void: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let inserted = model.insert(uow.conn()).await?;
    uow.mark_dirty(payment.invoice_id);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn line(category: LineItemCategory, total: Decimal) -> line_item::Model {
        line_item::Model {
            id: 0,
            invoice_id: 1,
            position: 0,
            description: "line".to_string(),
            category,
            quantity: Decimal::ONE,
            unit_price: total,
            line_total: total,
        }
    }

    fn paid(allocated: Decimal, is_void: bool) -> payment::Model {
        payment::Model {
            id: 0,
            invoice_id: 1,
            amount: allocated,
            allocated_amount: allocated,
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            method: PaymentMethod::BankTransfer,
            reference: None,
            recorded_by: "test".to_string(),
            is_overpayment: false,
            is_void,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_compute_totals_taxes_only_taxable_lines() {
        let lines = vec![
            line(LineItemCategory::Rent, dec!(1000)),
            line(LineItemCategory::Arrears, dec!(200)),
            line(LineItemCategory::Recurring, dec!(100)),
        ];
        let totals = compute_totals(&lines, &[], dec!(15));

        assert_eq!(totals.subtotal, dec!(1300));
        assert_eq!(totals.taxable_subtotal, dec!(1100));
        assert_eq!(totals.tax_amount, dec!(165.00));
        assert_eq!(totals.total, totals.subtotal + totals.tax_amount);
        assert_eq!(totals.balance_due(), dec!(1465.00));
    }

    #[test]
    fn test_compute_totals_ignores_void_payments() {
        let lines = vec![line(LineItemCategory::Rent, dec!(1000))];
        let payments = vec![paid(dec!(400), false), paid(dec!(600), true)];
        let totals = compute_totals(&lines, &payments, Decimal::ZERO);

        assert_eq!(totals.amount_paid, dec!(400));
        assert_eq!(totals.balance_due(), dec!(600));
    }

    #[test]
    fn test_overpaid_balance_is_floored_but_signed_value_kept() {
        let lines = vec![line(LineItemCategory::Rent, dec!(1000))];
        let payments = vec![paid(dec!(1200), false)];
        let totals = compute_totals(&lines, &payments, Decimal::ZERO);

        assert_eq!(totals.signed_balance, dec!(-200));
        assert_eq!(totals.balance_due(), Decimal::ZERO);
    }

    #[test]
    fn test_derive_status_transitions() {
        let lines = vec![line(LineItemCategory::Rent, dec!(1000))];
        let unpaid = compute_totals(&lines, &[], Decimal::ZERO);
        let partial = compute_totals(&lines, &[paid(dec!(300), false)], Decimal::ZERO);
        let full = compute_totals(&lines, &[paid(dec!(1000), false)], Decimal::ZERO);

        assert_eq!(derive_status(InvoiceStatus::Sent, false, &unpaid), InvoiceStatus::Sent);
        assert_eq!(
            derive_status(InvoiceStatus::Overdue, false, &partial),
            InvoiceStatus::PartiallyPaid
        );
        assert_eq!(derive_status(InvoiceStatus::Locked, true, &full), InvoiceStatus::Paid);
        assert_eq!(derive_status(InvoiceStatus::Paid, true, &unpaid), InvoiceStatus::Locked);
        assert_eq!(derive_status(InvoiceStatus::Paid, false, &unpaid), InvoiceStatus::Sent);
        assert_eq!(derive_status(InvoiceStatus::Draft, false, &full), InvoiceStatus::Draft);
        assert_eq!(
            derive_status(InvoiceStatus::CarriedForward, false, &partial),
            InvoiceStatus::CarriedForward
        );
    }

    #[tokio::test]
    async fn test_recalculate_invoice_is_idempotent() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_test_invoice(&fixture.db, &fixture.lease, dec!(1000)).await?;

        let first = recalculate_invoice(&fixture.db, invoice.id).await?;
        let second = recalculate_invoice(&fixture.db, invoice.id).await?;

        assert_eq!(first.total, second.total);
        assert_eq!(first.balance_due, second.balance_due);
        assert_eq!(first.status, second.status);
        assert_eq!(second.total, dec!(1000));
        assert_eq!(second.balance_due, dec!(1000));
        Ok(())
    }

    #[tokio::test]
    async fn test_recalculate_touches_lease() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_test_invoice(&fixture.db, &fixture.lease, dec!(500)).await?;
        let before = Lease::find_by_id(fixture.lease.id).one(&fixture.db).await?.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        recalculate_invoice(&fixture.db, invoice.id).await?;

        let after = Lease::find_by_id(fixture.lease.id).one(&fixture.db).await?.unwrap();
        assert!(after.updated_at > before.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_line_item_rejects_locked_invoice() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_test_invoice(&fixture.db, &fixture.lease, dec!(500)).await?;
        let locked = crate::core::invoice::lock_invoice(&fixture.db, invoice.id, "tester").await?;

        let mut uow = UnitOfWork::begin(&fixture.db).await?;
        let result = insert_line_item(
            &mut uow,
            &locked,
            NewLineItem::single("Late addition", LineItemCategory::Admin, dec!(10)),
        )
        .await;
        assert!(matches!(result, Err(Error::InvoiceLocked { .. })));
        Ok(())
    }
}
