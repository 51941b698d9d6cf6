//! Account statements for a lease over a date window.
//!
//! A statement is a read-only fold over the ledger. Every movement is turned into a
//! dated row; rows before the window collapse into the opening balance and rows
//! inside it are listed with a running balance.
//!
//! Only movements between the tenant and the landlord are rows: arrears and
//! adjustment lines, credit-balance payments and credit-note payments just move
//! amounts between ledger records and would be counted twice. A tolerance write-off
//! is shown as an adjustment.

use crate::{
    core::{
        allocation::outstanding_invoices,
        invoice::get_invoices_for_lease,
        lease::{require_lease, require_tenant},
    },
    entities::{
        Adjustment, AllocationType, InvoiceModel, InvoiceStatus, LeaseModel, LineItem, Payment,
        PaymentAllocation, PaymentMethod, TenantModel, adjustment, line_item, payment, payment_allocation,
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// Kind of statement row; also the order of rows sharing a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Balance brought forward from before the window
    OpeningBalance,
    /// A billed line
    Charge,
    /// Tax on an invoice
    Tax,
    /// A correction or write-off
    Adjustment,
    /// Money received
    Payment,
}

/// One row of the transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    /// Date the movement took effect
    pub date: NaiveDate,
    /// What kind of movement this is
    pub kind: EntryKind,
    /// Text shown on the statement
    pub description: String,
    /// Invoice number, when the row belongs to one
    pub reference: Option<String>,
    /// Amount billed
    pub charge: Decimal,
    /// Amount received
    pub payment: Decimal,
    /// Signed
    pub adjustment: Decimal,
    /// Balance after this row
    pub running_balance: Decimal,
}

impl StatementLine {
    fn new(date: NaiveDate, kind: EntryKind, description: String, reference: Option<String>) -> Self {
        Self {
            date,
            kind,
            description,
            reference,
            charge: Decimal::ZERO,
            payment: Decimal::ZERO,
            adjustment: Decimal::ZERO,
            running_balance: Decimal::ZERO,
        }
    }

    /// Effect of the row on what the tenant owes.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.charge - self.payment + self.adjustment
    }
}

/// Inclusive date window of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatementPeriod {
    /// First day covered
    pub start: NaiveDate,
    /// Last day covered
    pub end: NaiveDate,
}

/// Totals of a statement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatementSummary {
    /// Balance owed before the window
    pub opening_balance: Decimal,
    /// Charges and tax in the window
    pub total_charges: Decimal,
    /// Money received in the window
    pub total_payments: Decimal,
    /// Signed adjustments in the window
    pub total_adjustments: Decimal,
    /// Balance owed at the end of the window
    pub closing_balance: Decimal,
    /// `max(0, closing_balance)`
    pub outstanding_balance: Decimal,
    /// `max(0, -closing_balance)`
    pub overpayment_credit: Decimal,
}

/// Statement of account for one lease.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatement {
    /// Currency code every amount is expressed in
    pub currency: String,
    /// Tenant of the lease
    pub tenant: TenantModel,
    /// Lease the statement covers
    pub lease: LeaseModel,
    /// Window covered
    pub period: StatementPeriod,
    /// Totals of the window
    pub summary: StatementSummary,
    /// Opening balance row first, then movements in date order
    pub transactions: Vec<StatementLine>,
    /// Invoices with a balance at the time the statement was produced
    pub outstanding_invoices: Vec<InvoiceModel>,
}

/// Generates the statement of a lease for `[start, end]`.
///
/// # Arguments
/// * `db` - Database connection
/// * `lease_id` - Lease to report on
/// * `start`, `end` - Inclusive window
/// * `currency` - Currency code printed with the amounts
///
/// # Returns
/// The statement; calling it again with the same ledger yields the same result.
#[instrument(skip(db))]
pub async fn generate_statement<C>(
    db: &C,
    lease_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    currency: &str,
) -> Result<AccountStatement>
where
    C: ConnectionTrait,
{
    if start > end {
        return Err(Error::Validation {
            message: format!("Statement start {start} is after end {end}"),
        });
    }
    let lease = require_lease(db, lease_id).await?;
    let tenant = require_tenant(db, lease.tenant_id).await?;

    let mut rows = ledger_rows(db, &lease, end).await?;
    rows.sort_by(row_order);

    let (before, within): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.date < start);
    let opening_balance: Decimal = before.iter().map(StatementLine::net).sum();

    let mut opening = StatementLine::new(start, EntryKind::OpeningBalance, "Opening balance".to_string(), None);
    opening.running_balance = opening_balance;

    let mut transactions = Vec::with_capacity(within.len() + 1);
    transactions.push(opening);
    let mut running = opening_balance;
    for mut row in within {
        running += row.net();
        row.running_balance = running;
        transactions.push(row);
    }

    let movements = &transactions[1..];
    let total_charges: Decimal = movements.iter().map(|r| r.charge).sum();
    let total_payments: Decimal = movements.iter().map(|r| r.payment).sum();
    let total_adjustments: Decimal = movements.iter().map(|r| r.adjustment).sum();
    let closing_balance = opening_balance + total_charges - total_payments + total_adjustments;

    debug!(
        "Statement for lease {}: opening {} closing {} over {} row(s)",
        lease.id,
        opening_balance,
        closing_balance,
        movements.len()
    );

    Ok(AccountStatement {
        outstanding_invoices: outstanding_invoices(db, lease.id).await?,
        currency: currency.to_string(),
        tenant,
        lease,
        period: StatementPeriod { start, end },
        summary: StatementSummary {
            opening_balance,
            total_charges,
            total_payments,
            total_adjustments,
            closing_balance,
            outstanding_balance: closing_balance.max(Decimal::ZERO),
            overpayment_credit: (-closing_balance).max(Decimal::ZERO),
        },
        transactions,
    })
}

fn row_order(a: &StatementLine, b: &StatementLine) -> Ordering {
    let group = |kind: EntryKind| match kind {
        EntryKind::OpeningBalance => 0,
        EntryKind::Charge | EntryKind::Tax => 1,
        EntryKind::Adjustment => 2,
        EntryKind::Payment => 3,
    };
    a.date.cmp(&b.date).then(group(a.kind).cmp(&group(b.kind)))
}

/// Every movement of the lease dated on or before `end`.
async fn ledger_rows<C>(db: &C, lease: &LeaseModel, end: NaiveDate) -> Result<Vec<StatementLine>>
where
    C: ConnectionTrait,
{
    let invoices: Vec<InvoiceModel> = get_invoices_for_lease(db, lease.id)
        .await?
        .into_iter()
        .filter(|i| !matches!(i.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled))
        .collect();
    let invoice_ids: Vec<i64> = invoices.iter().map(|i| i.id).collect();
    let mut rows = Vec::new();

    let lines = LineItem::find()
        .filter(line_item::Column::InvoiceId.is_in(invoice_ids.clone()))
        .order_by_asc(line_item::Column::InvoiceId)
        .order_by_asc(line_item::Column::Position)
        .all(db)
        .await?;
    for invoice in invoices.iter().filter(|i| i.issue_date <= end) {
        for line in lines
            .iter()
            .filter(|l| l.invoice_id == invoice.id && l.category.is_taxable())
        {
            let mut row = StatementLine::new(
                invoice.issue_date,
                EntryKind::Charge,
                line.description.clone(),
                Some(invoice.invoice_number.clone()),
            );
            row.charge = line.line_total;
            rows.push(row);
        }
        if !invoice.tax_amount.is_zero() {
            let mut row = StatementLine::new(
                invoice.issue_date,
                EntryKind::Tax,
                format!("Tax at {}%", invoice.tax_rate.normalize()),
                Some(invoice.invoice_number.clone()),
            );
            row.charge = invoice.tax_amount;
            rows.push(row);
        }
    }

    let payments = Payment::find()
        .filter(payment::Column::InvoiceId.is_in(invoice_ids))
        .filter(payment::Column::IsVoid.eq(false))
        .filter(payment::Column::PaymentDate.lte(end))
        .order_by_asc(payment::Column::PaymentDate)
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await?;
    for paid in payments {
        let number = invoices
            .iter()
            .find(|i| i.id == paid.invoice_id)
            .map(|i| i.invoice_number.clone());
        if paid.method == PaymentMethod::WriteOff {
            let mut row = StatementLine::new(
                paid.payment_date,
                EntryKind::Adjustment,
                "Balance written off within tolerance".to_string(),
                number,
            );
            row.adjustment = -paid.allocated_amount;
            rows.push(row);
            continue;
        }
        if !paid.method.is_cash_receipt() {
            continue;
        }
        let mut row = StatementLine::new(
            paid.payment_date,
            EntryKind::Payment,
            format!("Payment received{}", paid.reference.map(|r| format!(" ({r})")).unwrap_or_default()),
            number,
        );
        row.payment = paid.allocated_amount;
        rows.push(row);
    }

    let credited = PaymentAllocation::find()
        .filter(payment_allocation::Column::LeaseId.eq(lease.id))
        .filter(payment_allocation::Column::AllocationType.eq(AllocationType::TenantCredit))
        .filter(payment_allocation::Column::InvoiceId.is_null())
        .filter(payment_allocation::Column::AllocationDate.lte(end))
        .all(db)
        .await?;
    for allocation in credited {
        let mut row = StatementLine::new(
            allocation.allocation_date,
            EntryKind::Payment,
            "Payment held as credit".to_string(),
            None,
        );
        row.payment = allocation.allocated_amount;
        rows.push(row);
    }

    let adjustments = Adjustment::find()
        .filter(adjustment::Column::LeaseId.eq(lease.id))
        .filter(adjustment::Column::EffectiveDate.lte(end))
        .order_by_asc(adjustment::Column::EffectiveDate)
        .order_by_asc(adjustment::Column::Id)
        .all(db)
        .await?;
    for adj in adjustments {
        let mut row = StatementLine::new(adj.effective_date, EntryKind::Adjustment, adj.reason, None);
        row.adjustment = adj.amount;
        rows.push(row);
    }

    Ok(rows)
}
