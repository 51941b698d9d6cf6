//! Payment allocation - applying received money to invoices.
//!
//! Automatic allocation always walks a lease's outstanding invoices oldest first
//! (due date, then id). Operators can instead name the invoices and amounts
//! themselves. Whatever is left over can be held as tenant credit.

use crate::{
    core::{
        credit,
        invoice::{self as invoice_ops, NewInvoice},
        lease::require_lease,
        ledger::{self, NewLineItem, NewPayment},
        locks::LeaseLocks,
        money::round_money,
        unit_of_work::UnitOfWork,
    },
    entities::{
        AdjustmentModel, AdjustmentType, AllocationType, BankTransaction, BankTransactionStatus,
        Invoice, InvoiceKind, InvoiceModel, InvoiceStatus, LineItemCategory, ManualPayment,
        ManualPaymentModel, ManualPaymentStatus, MatchOutcome, PaymentAllocation, PaymentMethod,
        TransactionDirection, adjustment, bank_transaction, invoice, manual_payment,
        payment_allocation,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Outstanding invoices of a lease, oldest due date first.
pub async fn outstanding_invoices<C>(db: &C, lease_id: i64) -> Result<Vec<InvoiceModel>>
where
    C: ConnectionTrait,
{
    Invoice::find()
        .filter(invoice::Column::LeaseId.eq(lease_id))
        .filter(invoice::Column::Status.is_in(InvoiceStatus::OUTSTANDING))
        .filter(invoice::Column::BalanceDue.gt(Decimal::ZERO))
        .order_by_asc(invoice::Column::DueDate)
        .order_by_asc(invoice::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// One step of an oldest-first allocation plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedAllocation {
    /// Invoice receiving the money
    pub invoice_id: i64,
    /// Balance of the invoice before this allocation
    pub balance_before: Decimal,
    /// Amount applied to it
    pub amount: Decimal,
}

impl PlannedAllocation {
    /// Balance left once this step is applied
    #[must_use]
    pub fn balance_after(&self) -> Decimal {
        self.balance_before - self.amount
    }
}

/// Oldest-first allocation of one amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// Steps in allocation order
    pub allocations: Vec<PlannedAllocation>,
    /// Money left once every invoice is settled
    pub remainder: Decimal,
}

/// Spreads `amount` over `invoices` in the given order, settling each before moving on.
#[must_use]
pub fn plan_oldest_first(invoices: &[InvoiceModel], amount: Decimal) -> AllocationPlan {
    let mut remaining = round_money(amount);
    let mut allocations = Vec::new();

    for invoice in invoices {
        if remaining <= Decimal::ZERO {
            break;
        }
        if invoice.balance_due <= Decimal::ZERO {
            continue;
        }
        let applied = remaining.min(invoice.balance_due);
        allocations.push(PlannedAllocation {
            invoice_id: invoice.id,
            balance_before: invoice.balance_due,
            amount: applied,
        });
        remaining -= applied;
    }

    AllocationPlan {
        allocations,
        remainder: remaining.max(Decimal::ZERO),
    }
}

/// Where allocated money came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSource {
    /// A manually reported payment
    ManualPayment(i64),
    /// A bank statement transaction
    BankTransaction(i64),
}

impl PaymentSource {
    const fn ids(self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::ManualPayment(id) => (Some(id), None),
            Self::BankTransaction(id) => (None, Some(id)),
        }
    }
}

/// Shared details of every payment created from one source.
#[derive(Debug, Clone)]
pub(crate) struct Receipt {
    /// Lease the money was received for
    pub lease_id: i64,
    /// Tenant any credit is held for
    pub tenant_id: i64,
    /// Record the money came from
    pub source: PaymentSource,
    /// Full amount received from the source
    pub amount: Decimal,
    /// How the money was paid
    pub method: PaymentMethod,
    /// Date the money was received
    pub payment_date: NaiveDate,
    /// Bank or receipt reference
    pub reference: Option<String>,
    /// Who the payments are attributed to
    pub actor: String,
}

/// Applies `amount` of a receipt to one invoice: records a payment and its audit link.
///
/// The amount may not exceed the invoice's balance as it stands inside this unit of
/// work, so earlier allocations in the same unit count against it.
pub(crate) async fn apply_allocation(
    uow: &mut UnitOfWork,
    receipt: &Receipt,
    invoice: &InvoiceModel,
    amount: Decimal,
    allocation_type: AllocationType,
    is_overpayment: bool,
) -> Result<payment_allocation::Model> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    if !invoice.status.is_outstanding() && invoice.status != InvoiceStatus::Paid {
        return Err(Error::InvalidState {
            message: format!(
                "Invoice {} is {:?} and cannot receive payments",
                invoice.invoice_number, invoice.status
            ),
        });
    }

    let balance_due = ledger::current_totals(uow.conn(), invoice).await?.balance_due();
    if amount > balance_due {
        return Err(Error::OverAllocation {
            invoice_id: invoice.id,
            requested: amount,
            balance_due,
        });
    }

    let payment = ledger::insert_payment(
        uow,
        NewPayment {
            invoice_id: invoice.id,
            amount: receipt.amount,
            allocated_amount: amount,
            payment_date: receipt.payment_date,
            method: receipt.method,
            reference: receipt.reference.clone(),
            recorded_by: receipt.actor.clone(),
            is_overpayment,
        },
    )
    .await?;

    let (manual_payment_id, bank_transaction_id) = receipt.source.ids();
    let allocation = payment_allocation::ActiveModel {
        lease_id: Set(receipt.lease_id),
        manual_payment_id: Set(manual_payment_id),
        bank_transaction_id: Set(bank_transaction_id),
        invoice_id: Set(Some(invoice.id)),
        payment_id: Set(Some(payment.id)),
        allocated_amount: Set(amount),
        allocation_type: Set(allocation_type),
        allocation_date: Set(receipt.payment_date),
        notes: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(uow.conn())
    .await?;

    debug!(
        "Allocated {} to invoice {} (balance before {})",
        amount, invoice.invoice_number, balance_due
    );
    Ok(allocation)
}

/// Holds `amount` of a receipt as tenant credit and records the audit link.
pub(crate) async fn credit_remainder(
    uow: &mut UnitOfWork,
    receipt: &Receipt,
    amount: Decimal,
    notes: &str,
) -> Result<payment_allocation::Model> {
    let amount = round_money(amount);
    credit::add_credit(uow.conn(), receipt.tenant_id, amount).await?;

    let (manual_payment_id, bank_transaction_id) = receipt.source.ids();
    let allocation = payment_allocation::ActiveModel {
        lease_id: Set(receipt.lease_id),
        manual_payment_id: Set(manual_payment_id),
        bank_transaction_id: Set(bank_transaction_id),
        invoice_id: Set(None),
        payment_id: Set(None),
        allocated_amount: Set(amount),
        allocation_type: Set(AllocationType::TenantCredit),
        allocation_date: Set(receipt.payment_date),
        notes: Set(Some(notes.to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(uow.conn())
    .await?;
    Ok(allocation)
}

/// Runs an oldest-first plan against the stored invoices.
pub(crate) async fn apply_plan(
    uow: &mut UnitOfWork,
    receipt: &Receipt,
    invoices: &[InvoiceModel],
    plan: &AllocationPlan,
) -> Result<Vec<payment_allocation::Model>> {
    let mut created = Vec::with_capacity(plan.allocations.len());
    for step in &plan.allocations {
        let Some(target) = invoices.iter().find(|i| i.id == step.invoice_id) else {
            return Err(Error::not_found("invoice", step.invoice_id));
        };
        created.push(
            apply_allocation(
                uow,
                receipt,
                target,
                step.amount,
                AllocationType::AutoMatch,
                plan.remainder > Decimal::ZERO,
            )
            .await?,
        );
    }
    Ok(created)
}

/// A manually reported payment.
#[derive(Debug, Clone)]
pub struct ManualPaymentRequest {
    /// Lease the payment is for
    pub lease_id: i64,
    /// Amount received
    pub amount: Decimal,
    /// How it was paid
    pub method: PaymentMethod,
    /// Date it was received
    pub payment_date: NaiveDate,
    /// Receipt or bank reference
    pub reference: Option<String>,
    /// Operator recording the payment
    pub recorded_by: String,
}

/// One operator-chosen allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationEntry {
    /// Invoice to pay
    pub invoice_id: i64,
    /// Amount to apply to it
    pub amount: Decimal,
}

/// Result of recording or allocating a payment.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    /// Audit links created, one per invoice paid
    pub allocations: Vec<payment_allocation::Model>,
    /// Amount moved to tenant credit
    pub credited: Decimal,
    /// Amount of the source still unallocated
    pub remaining: Decimal,
}

/// Request to adjust what an invoice bills.
#[derive(Debug, Clone)]
pub struct AdjustmentRequest {
    /// Invoice the adjustment is requested against
    pub invoice_id: i64,
    /// Kind of adjustment
    pub adjustment_type: AdjustmentType,
    /// Signed: negative reduces what the tenant owes
    pub amount: Decimal,
    /// Why the adjustment was made
    pub reason: String,
    /// Date the adjustment takes effect
    pub effective_date: NaiveDate,
    /// Operator making the adjustment
    pub created_by: String,
}

/// Result of an adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentOutcome {
    /// The stored audit record
    pub adjustment: AdjustmentModel,
    /// Invoice carrying the adjustment line
    pub applied_invoice: InvoiceModel,
    /// Part of a credit that exceeded the parent's balance and went to tenant credit
    pub credited: Decimal,
}

/// Manual payments, operator allocations and adjustments.
pub struct PaymentAllocator {
    db: DatabaseConnection,
    locks: LeaseLocks,
}

impl PaymentAllocator {
    /// Creates an allocator sharing `locks` with the other services.
    #[must_use]
    pub const fn new(db: DatabaseConnection, locks: LeaseLocks) -> Self {
        Self { db, locks }
    }

    /// Records a reported payment and allocates it oldest first across the lease's
    /// outstanding invoices. Any remainder becomes tenant credit; with nothing
    /// outstanding the payment stays pending for an operator to allocate.
    #[instrument(skip(self, request), fields(lease_id = request.lease_id, amount = %request.amount))]
    pub async fn record_manual_payment(
        &self,
        request: ManualPaymentRequest,
    ) -> Result<(ManualPaymentModel, AllocationOutcome)> {
        let amount = round_money(request.amount);
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount { amount });
        }

        let _guard = self.locks.lock(request.lease_id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let lease = require_lease(uow.conn(), request.lease_id).await?;

        let manual_payment = manual_payment::ActiveModel {
            lease_id: Set(lease.id),
            amount: Set(amount),
            allocated_amount: Set(Decimal::ZERO),
            remaining_amount: Set(amount),
            method: Set(request.method),
            payment_date: Set(request.payment_date),
            reference: Set(request.reference.clone()),
            status: Set(ManualPaymentStatus::Pending),
            recorded_by: Set(request.recorded_by.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(uow.conn())
        .await?;

        let invoices = outstanding_invoices(uow.conn(), lease.id).await?;
        if invoices.is_empty() {
            uow.commit().await?;
            info!(
                "Manual payment {} of {} held pending: nothing outstanding on lease {}",
                manual_payment.id, amount, lease.id
            );
            return Ok((
                manual_payment,
                AllocationOutcome {
                    allocations: Vec::new(),
                    credited: Decimal::ZERO,
                    remaining: amount,
                },
            ));
        }

        let receipt = Receipt {
            lease_id: lease.id,
            tenant_id: lease.tenant_id,
            source: PaymentSource::ManualPayment(manual_payment.id),
            amount,
            method: request.method,
            payment_date: request.payment_date,
            reference: request.reference,
            actor: request.recorded_by,
        };
        let plan = plan_oldest_first(&invoices, amount);
        let mut allocations = apply_plan(&mut uow, &receipt, &invoices, &plan).await?;
        if plan.remainder > Decimal::ZERO {
            allocations.push(
                credit_remainder(&mut uow, &receipt, plan.remainder, "Manual payment remainder")
                    .await?,
            );
        }

        let mut active_model: manual_payment::ActiveModel = manual_payment.into();
        active_model.allocated_amount = Set(amount);
        active_model.remaining_amount = Set(Decimal::ZERO);
        active_model.status = Set(ManualPaymentStatus::Allocated);
        let manual_payment = active_model.update(uow.conn()).await?;
        uow.commit().await?;

        info!(
            "Manual payment {} of {} allocated to {} invoice(s), {} credited",
            manual_payment.id,
            amount,
            plan.allocations.len(),
            plan.remainder
        );
        Ok((
            manual_payment,
            AllocationOutcome {
                allocations,
                credited: plan.remainder,
                remaining: Decimal::ZERO,
            },
        ))
    }

    /// Applies operator-chosen amounts from a manual payment or bank transaction to
    /// specific invoices. With `credit_leftover` set, whatever the entries leave
    /// unallocated becomes tenant credit.
    #[instrument(skip(self, entries))]
    pub async fn allocate_payment_manually(
        &self,
        source: PaymentSource,
        entries: &[AllocationEntry],
        credit_leftover: bool,
        actor: &str,
    ) -> Result<AllocationOutcome> {
        let Some(first) = entries.first() else {
            return Err(Error::Validation {
                message: "At least one allocation is required".to_string(),
            });
        };
        if let Some(bad) = entries.iter().find(|e| e.amount <= Decimal::ZERO) {
            return Err(Error::InvalidAmount { amount: bad.amount });
        }

        let lease_id = match source {
            PaymentSource::ManualPayment(id) => find_manual_payment(&self.db, id).await?.lease_id,
            PaymentSource::BankTransaction(id) => match find_bank_transaction(&self.db, id).await?.lease_id {
                Some(lease_id) => lease_id,
                None => invoice_ops::require_invoice(&self.db, first.invoice_id).await?.lease_id,
            },
        };

        let _guard = self.locks.lock(lease_id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let lease = require_lease(uow.conn(), lease_id).await?;
        let (available, receipt) = self.load_receipt(&uow, source, lease.id, lease.tenant_id, actor).await?;

        let requested: Decimal = entries.iter().map(|e| round_money(e.amount)).sum();
        if requested > available {
            return Err(Error::Validation {
                message: format!("Allocations total {requested} but only {available} is available"),
            });
        }

        let mut allocations = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = invoice_ops::require_invoice(uow.conn(), entry.invoice_id).await?;
            if target.lease_id != lease.id {
                return Err(Error::Validation {
                    message: format!(
                        "Invoice {} does not belong to lease {}",
                        target.invoice_number, lease.id
                    ),
                });
            }
            allocations.push(
                apply_allocation(&mut uow, &receipt, &target, entry.amount, AllocationType::Manual, false)
                    .await?,
            );
        }

        let leftover = available - requested;
        let credited = if credit_leftover && leftover > Decimal::ZERO {
            allocations.push(
                credit_remainder(&mut uow, &receipt, leftover, "Unallocated remainder").await?,
            );
            leftover
        } else {
            Decimal::ZERO
        };
        let used = requested + credited;
        let remaining = available - used;

        match source {
            PaymentSource::ManualPayment(id) => {
                let existing = find_manual_payment(uow.conn(), id).await?;
                let allocated = existing.allocated_amount + used;
                let mut active_model: manual_payment::ActiveModel = existing.into();
                active_model.allocated_amount = Set(allocated);
                active_model.remaining_amount = Set(remaining);
                if remaining <= Decimal::ZERO {
                    active_model.status = Set(ManualPaymentStatus::Allocated);
                }
                active_model.update(uow.conn()).await?;
            }
            PaymentSource::BankTransaction(id) => {
                let existing = find_bank_transaction(uow.conn(), id).await?;
                let allocated = existing.allocated_amount + used;
                let mut active_model: bank_transaction::ActiveModel = existing.into();
                active_model.allocated_amount = Set(allocated);
                active_model.lease_id = Set(Some(lease.id));
                active_model.invoice_id = Set(Some(first.invoice_id));
                active_model.match_outcome = Set(MatchOutcome::Manual);
                active_model.status = Set(BankTransactionStatus::Reconciled);
                active_model.notes = Set(Some(format!("Allocated manually by {actor}")));
                active_model.update(uow.conn()).await?;
            }
        }
        uow.commit().await?;

        info!(
            "Manually allocated {} across {} invoice(s) from {:?}, {} credited",
            requested,
            entries.len(),
            source,
            credited
        );
        Ok(AllocationOutcome {
            allocations,
            credited,
            remaining,
        })
    }

    /// Loads an allocation source, checks it can still be allocated and returns the
    /// amount it has left.
    async fn load_receipt(
        &self,
        uow: &UnitOfWork,
        source: PaymentSource,
        lease_id: i64,
        tenant_id: i64,
        actor: &str,
    ) -> Result<(Decimal, Receipt)> {
        match source {
            PaymentSource::ManualPayment(id) => {
                let manual = find_manual_payment(uow.conn(), id).await?;
                if manual.status != ManualPaymentStatus::Pending || manual.remaining_amount <= Decimal::ZERO {
                    return Err(Error::InvalidState {
                        message: format!("Manual payment {id} is {:?} with nothing left to allocate", manual.status),
                    });
                }
                Ok((
                    manual.remaining_amount,
                    Receipt {
                        lease_id,
                        tenant_id,
                        source,
                        amount: manual.amount,
                        method: manual.method,
                        payment_date: manual.payment_date,
                        reference: manual.reference,
                        actor: actor.to_string(),
                    },
                ))
            }
            PaymentSource::BankTransaction(id) => {
                let txn = find_bank_transaction(uow.conn(), id).await?;
                if txn.status == BankTransactionStatus::Reconciled {
                    return Err(Error::InvalidState {
                        message: format!("Bank transaction {id} is already reconciled"),
                    });
                }
                if txn.direction != TransactionDirection::Credit {
                    return Err(Error::Validation {
                        message: format!("Bank transaction {id} is outgoing money"),
                    });
                }
                Ok((
                    txn.amount - txn.allocated_amount,
                    Receipt {
                        lease_id,
                        tenant_id,
                        source,
                        amount: txn.amount,
                        method: PaymentMethod::BankTransfer,
                        payment_date: txn.transaction_date,
                        reference: txn.reference.or(txn.parsed_reference),
                        actor: actor.to_string(),
                    },
                ))
            }
        }
    }

    /// Cancels a pending manual payment that has not been allocated at all.
    #[instrument(skip(self))]
    pub async fn cancel_manual_payment(&self, manual_payment_id: i64) -> Result<ManualPaymentModel> {
        let existing = find_manual_payment(&self.db, manual_payment_id).await?;
        if existing.status != ManualPaymentStatus::Pending || existing.allocated_amount > Decimal::ZERO {
            return Err(Error::InvalidState {
                message: format!(
                    "Manual payment {manual_payment_id} is {:?} with {} allocated",
                    existing.status, existing.allocated_amount
                ),
            });
        }

        let mut active_model: manual_payment::ActiveModel = existing.into();
        active_model.status = Set(ManualPaymentStatus::Cancelled);
        let cancelled = active_model.update(&self.db).await?;
        info!("Manual payment {} cancelled", manual_payment_id);
        Ok(cancelled)
    }

    /// Adds a signed adjustment line to an invoice.
    ///
    /// An unlocked invoice gets the line directly; a credit may not exceed its balance.
    /// A locked invoice is left untouched: the line goes on a new interim invoice
    /// referencing it, and a credit is then applied to the locked invoice as a
    /// credit-note payment, with any excess held as tenant credit.
    #[instrument(skip(self, request), fields(invoice_id = request.invoice_id, amount = %request.amount))]
    pub async fn create_adjustment(&self, request: AdjustmentRequest) -> Result<AdjustmentOutcome> {
        let amount = round_money(request.amount);
        if amount.is_zero() {
            return Err(Error::InvalidAmount { amount });
        }
        if request.reason.trim().is_empty() {
            return Err(Error::Validation {
                message: "An adjustment needs a reason".to_string(),
            });
        }

        let lease_id = invoice_ops::require_invoice(&self.db, request.invoice_id).await?.lease_id;
        let _guard = self.locks.lock(lease_id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let target = invoice_ops::require_invoice(uow.conn(), request.invoice_id).await?;
        if matches!(target.status, InvoiceStatus::Cancelled | InvoiceStatus::CarriedForward) {
            return Err(Error::InvalidState {
                message: format!("Invoice {} is {:?}", target.invoice_number, target.status),
            });
        }

        let line = NewLineItem::single(
            format!("{}: {}", adjustment_label(request.adjustment_type), request.reason),
            LineItemCategory::Adjustment,
            amount,
        );
        let mut credited = Decimal::ZERO;

        let (applied_invoice_id, line_item) = if target.is_locked {
            let child = invoice_ops::insert_invoice(
                &mut uow,
                NewInvoice {
                    lease_id: target.lease_id,
                    tenant_id: target.tenant_id,
                    kind: InvoiceKind::Interim,
                    status: InvoiceStatus::Sent,
                    issue_date: request.effective_date,
                    due_date: request.effective_date.max(target.due_date),
                    period_start: target.period_start,
                    period_end: target.period_end,
                    tax_rate: target.tax_rate,
                    parent_invoice_id: Some(target.id),
                },
            )
            .await?;
            let line_item = ledger::insert_line_item_unchecked(&mut uow, child.id, line).await?;

            if amount < Decimal::ZERO {
                let credit_total = -amount;
                let parent_balance = ledger::current_totals(uow.conn(), &target).await?.balance_due();
                let applied = credit_total.min(parent_balance);
                if applied > Decimal::ZERO {
                    ledger::insert_payment(
                        &mut uow,
                        NewPayment {
                            invoice_id: target.id,
                            amount: credit_total,
                            allocated_amount: applied,
                            payment_date: request.effective_date,
                            method: PaymentMethod::CreditNote,
                            reference: Some(child.invoice_number.clone()),
                            recorded_by: request.created_by.clone(),
                            is_overpayment: false,
                        },
                    )
                    .await?;
                }
                credited = credit_total - applied;
                if credited > Decimal::ZERO {
                    credit::add_credit(uow.conn(), target.tenant_id, credited).await?;
                }
            }
            (child.id, line_item)
        } else {
            if amount < Decimal::ZERO {
                let balance_due = ledger::current_totals(uow.conn(), &target).await?.balance_due();
                if -amount > balance_due {
                    return Err(Error::OverAllocation {
                        invoice_id: target.id,
                        requested: -amount,
                        balance_due,
                    });
                }
            }
            (target.id, ledger::insert_line_item(&mut uow, &target, line).await?)
        };

        let adjustment = adjustment::ActiveModel {
            invoice_id: Set(target.id),
            applied_invoice_id: Set(applied_invoice_id),
            line_item_id: Set(line_item.id),
            lease_id: Set(target.lease_id),
            adjustment_type: Set(request.adjustment_type),
            amount: Set(amount),
            reason: Set(request.reason),
            effective_date: Set(request.effective_date),
            created_by: Set(request.created_by),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(uow.conn())
        .await?;

        let recalculated = uow.commit().await?;
        let applied_invoice = match recalculated.into_iter().find(|i| i.id == applied_invoice_id) {
            Some(found) => found,
            None => invoice_ops::require_invoice(&self.db, applied_invoice_id).await?,
        };

        info!(
            "Adjustment {} of {} applied to invoice {}",
            adjustment.id, amount, applied_invoice.invoice_number
        );
        Ok(AdjustmentOutcome {
            adjustment,
            applied_invoice,
            credited,
        })
    }
}

const fn adjustment_label(adjustment_type: AdjustmentType) -> &'static str {
    match adjustment_type {
        AdjustmentType::CreditNote => "Credit note",
        AdjustmentType::Waiver => "Waiver",
        AdjustmentType::DepositDeduction => "Deposit deduction",
        AdjustmentType::Correction => "Correction",
    }
}

async fn find_manual_payment<C>(db: &C, id: i64) -> Result<ManualPaymentModel>
where
    C: ConnectionTrait,
{
    ManualPayment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("manual payment", id))
}

async fn find_bank_transaction<C>(db: &C, id: i64) -> Result<bank_transaction::Model>
where
    C: ConnectionTrait,
{
    BankTransaction::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("bank transaction", id))
}

/// Allocations recorded for an invoice.
pub async fn get_allocations_for_invoice<C>(db: &C, invoice_id: i64) -> Result<Vec<payment_allocation::Model>>
where
    C: ConnectionTrait,
{
    PaymentAllocation::find()
        .filter(payment_allocation::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(payment_allocation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
