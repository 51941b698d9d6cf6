//! Invoice lifecycle - lookups, state transitions and line edits.
//!
//! Totals are only ever written by the ledger recalculation; the operations here change
//! status, lock state and line items, each inside its own unit of work.

use crate::{
    core::{
        ledger::{self, NewLineItem},
        unit_of_work::UnitOfWork,
    },
    entities::{
        Invoice, InvoiceKind, InvoiceStatus, LineItem, Payment, invoice,
        invoice::Model as InvoiceModel, line_item, payment,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

/// Finds an invoice by id.
pub async fn get_invoice<C>(db: &C, invoice_id: i64) -> Result<Option<InvoiceModel>>
where
    C: ConnectionTrait,
{
    Invoice::find_by_id(invoice_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an invoice by id, failing with [`Error::NotFound`] when it does not exist.
pub async fn require_invoice<C>(db: &C, invoice_id: i64) -> Result<InvoiceModel>
where
    C: ConnectionTrait,
{
    get_invoice(db, invoice_id)
        .await?
        .ok_or_else(|| Error::not_found("invoice", invoice_id))
}

/// Lines of an invoice in display order.
pub async fn get_line_items<C>(db: &C, invoice_id: i64) -> Result<Vec<line_item::Model>>
where
    C: ConnectionTrait,
{
    LineItem::find()
        .filter(line_item::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(line_item::Column::Position)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Payments recorded against an invoice, including void ones.
pub async fn get_payments<C>(db: &C, invoice_id: i64) -> Result<Vec<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find()
        .filter(payment::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(payment::Column::PaymentDate)
        .order_by_asc(payment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All invoices of a lease, oldest billing period first.
pub async fn get_invoices_for_lease<C>(db: &C, lease_id: i64) -> Result<Vec<InvoiceModel>>
where
    C: ConnectionTrait,
{
    Invoice::find()
        .filter(invoice::Column::LeaseId.eq(lease_id))
        .order_by_asc(invoice::Column::PeriodStart)
        .order_by_asc(invoice::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Header fields of an invoice about to be created.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Lease being billed
    pub lease_id: i64,
    /// Tenant of the lease
    pub tenant_id: i64,
    /// Initial, regular or interim
    pub kind: InvoiceKind,
    /// Starting status
    pub status: InvoiceStatus,
    /// Date the invoice is issued
    pub issue_date: NaiveDate,
    /// Date payment is due
    pub due_date: NaiveDate,
    /// First day billed
    pub period_start: NaiveDate,
    /// Last day billed
    pub period_end: NaiveDate,
    /// Tax percentage applied to taxable lines
    pub tax_rate: Decimal,
    /// Locked invoice an interim invoice adjusts
    pub parent_invoice_id: Option<i64>,
}

/// Inserts an empty invoice with zero totals and queues it for recalculation.
pub(crate) async fn insert_invoice(
    uow: &mut UnitOfWork,
    new_invoice: NewInvoice,
) -> Result<InvoiceModel> {
    let invoice_number =
        next_invoice_number(uow.conn(), new_invoice.lease_id, new_invoice.period_start).await?;
    let now = Utc::now();

    let model = invoice::ActiveModel {
        invoice_number: Set(invoice_number),
        lease_id: Set(new_invoice.lease_id),
        tenant_id: Set(new_invoice.tenant_id),
        kind: Set(new_invoice.kind),
        status: Set(new_invoice.status),
        issue_date: Set(new_invoice.issue_date),
        due_date: Set(new_invoice.due_date),
        period_start: Set(new_invoice.period_start),
        period_end: Set(new_invoice.period_end),
        subtotal: Set(Decimal::ZERO),
        tax_rate: Set(new_invoice.tax_rate),
        tax_amount: Set(Decimal::ZERO),
        total: Set(Decimal::ZERO),
        amount_paid: Set(Decimal::ZERO),
        balance_due: Set(Decimal::ZERO),
        is_locked: Set(false),
        locked_at: Set(None),
        locked_by: Set(None),
        parent_invoice_id: Set(new_invoice.parent_invoice_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let inserted = model.insert(uow.conn()).await?;
    uow.mark_dirty(inserted.id);
    Ok(inserted)
}

/// `INV-<lease>-<yyyymm>-<seq>`, where `seq` counts invoices of the lease for the month.
async fn next_invoice_number<C>(db: &C, lease_id: i64, period_start: NaiveDate) -> Result<String>
where
    C: ConnectionTrait,
{
    let prefix = format!(
        "INV-{lease_id:04}-{:04}{:02}-",
        period_start.year(),
        period_start.month()
    );
    let existing = Invoice::find()
        .filter(invoice::Column::InvoiceNumber.starts_with(&prefix))
        .count(db)
        .await?;
    Ok(format!("{prefix}{:02}", existing + 1))
}

/// Marks a draft invoice as delivered.
#[instrument(skip(db))]
pub async fn send_invoice(db: &DatabaseConnection, invoice_id: i64) -> Result<InvoiceModel> {
    let invoice = require_invoice(db, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(Error::InvalidState {
            message: format!(
                "Invoice {} is {:?}; only drafts can be sent",
                invoice.invoice_number, invoice.status
            ),
        });
    }

    let mut active_model: invoice::ActiveModel = invoice.into();
    active_model.status = Set(InvoiceStatus::Sent);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;
    info!("Invoice {} sent", updated.invoice_number);
    Ok(updated)
}

/// Sets the lock columns on an invoice model. Drafts move to `locked`.
pub(crate) fn apply_lock(active_model: &mut invoice::ActiveModel, status: InvoiceStatus, actor: &str) {
    let now = Utc::now();
    active_model.is_locked = Set(true);
    active_model.locked_at = Set(Some(now));
    active_model.locked_by = Set(Some(actor.to_string()));
    if status == InvoiceStatus::Draft {
        active_model.status = Set(InvoiceStatus::Locked);
    }
    active_model.updated_at = Set(now);
}

/// Freezes an invoice's lines and totals. Locking an already locked invoice is a no-op.
#[instrument(skip(db))]
pub async fn lock_invoice(db: &DatabaseConnection, invoice_id: i64, actor: &str) -> Result<InvoiceModel> {
    let invoice = require_invoice(db, invoice_id).await?;
    if invoice.is_locked {
        return Ok(invoice);
    }
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(Error::InvalidState {
            message: format!("Invoice {} is cancelled", invoice.invoice_number),
        });
    }

    let status = invoice.status;
    let mut active_model: invoice::ActiveModel = invoice.into();
    apply_lock(&mut active_model, status, actor);
    let updated = active_model.update(db).await?;
    info!("Invoice {} locked by {}", updated.invoice_number, actor);
    Ok(updated)
}

/// Withdraws an invoice nobody has paid anything towards.
#[instrument(skip(db))]
pub async fn cancel_invoice(db: &DatabaseConnection, invoice_id: i64) -> Result<InvoiceModel> {
    let invoice = require_invoice(db, invoice_id).await?;
    if invoice.status.is_terminal() {
        return Err(Error::InvalidState {
            message: format!(
                "Invoice {} is already {:?}",
                invoice.invoice_number, invoice.status
            ),
        });
    }
    if invoice.amount_paid > Decimal::ZERO {
        return Err(Error::InvalidState {
            message: format!(
                "Invoice {} has {} paid; void the payments first",
                invoice.invoice_number, invoice.amount_paid
            ),
        });
    }

    let mut active_model: invoice::ActiveModel = invoice.into();
    active_model.status = Set(InvoiceStatus::Cancelled);
    active_model.updated_at = Set(Utc::now());
    let updated = active_model.update(db).await?;
    info!("Invoice {} cancelled", updated.invoice_number);
    Ok(updated)
}

/// Moves every unpaid delivered invoice whose due date is before `as_of` to `overdue`.
#[instrument(skip(db))]
pub async fn mark_overdue_invoices(db: &DatabaseConnection, as_of: NaiveDate) -> Result<Vec<InvoiceModel>> {
    let uow = UnitOfWork::begin(db).await?;
    let candidates = Invoice::find()
        .filter(invoice::Column::Status.is_in([
            InvoiceStatus::Sent,
            InvoiceStatus::Locked,
            InvoiceStatus::PartiallyPaid,
        ]))
        .filter(invoice::Column::DueDate.lt(as_of))
        .filter(invoice::Column::BalanceDue.gt(Decimal::ZERO))
        .all(uow.conn())
        .await?;

    let mut updated = Vec::with_capacity(candidates.len());
    for invoice in candidates {
        let mut active_model: invoice::ActiveModel = invoice.into();
        active_model.status = Set(InvoiceStatus::Overdue);
        active_model.updated_at = Set(Utc::now());
        updated.push(active_model.update(uow.conn()).await?);
    }
    uow.commit().await?;

    info!("Marked {} invoice(s) overdue as of {}", updated.len(), as_of);
    Ok(updated)
}

/// Appends a line to an unlocked invoice and recalculates it.
#[instrument(skip(db, line))]
pub async fn add_line_item(
    db: &DatabaseConnection,
    invoice_id: i64,
    line: NewLineItem,
) -> Result<line_item::Model> {
    let mut uow = UnitOfWork::begin(db).await?;
    let invoice = require_invoice(uow.conn(), invoice_id).await?;
    if matches!(
        invoice.status,
        InvoiceStatus::Cancelled | InvoiceStatus::CarriedForward
    ) {
        return Err(Error::InvalidState {
            message: format!("Invoice {} is {:?}", invoice.invoice_number, invoice.status),
        });
    }

    let inserted = ledger::insert_line_item(&mut uow, &invoice, line).await?;
    uow.commit().await?;
    Ok(inserted)
}

/// Removes a line from an unlocked invoice and recalculates it.
#[instrument(skip(db))]
pub async fn remove_line_item(db: &DatabaseConnection, line_item_id: i64) -> Result<InvoiceModel> {
    let mut uow = UnitOfWork::begin(db).await?;
    let line = LineItem::find_by_id(line_item_id)
        .one(uow.conn())
        .await?
        .ok_or_else(|| Error::not_found("line item", line_item_id))?;
    let invoice = require_invoice(uow.conn(), line.invoice_id).await?;
    if invoice.is_locked {
        return Err(Error::InvoiceLocked {
            invoice_id: invoice.id,
        });
    }

    line.delete(uow.conn()).await?;
    uow.mark_dirty(invoice.id);
    uow.commit().await?;
    require_invoice(db, invoice.id).await
}

/// Voids a payment so it no longer counts towards its invoice, and recalculates.
#[instrument(skip(db))]
pub async fn void_payment(db: &DatabaseConnection, payment_id: i64) -> Result<InvoiceModel> {
    let mut uow = UnitOfWork::begin(db).await?;
    let payment = Payment::find_by_id(payment_id)
        .one(uow.conn())
        .await?
        .ok_or_else(|| Error::not_found("payment", payment_id))?;
    if payment.is_void {
        return Err(Error::InvalidState {
            message: format!("Payment {payment_id} is already void"),
        });
    }

    let invoice_id = payment.invoice_id;
    let mut active_model: payment::ActiveModel = payment.into();
    active_model.is_void = Set(true);
    active_model.update(uow.conn()).await?;
    uow.mark_dirty(invoice_id);
    uow.commit().await?;

    info!("Payment {} voided", payment_id);
    require_invoice(db, invoice_id).await
}
