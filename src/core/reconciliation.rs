//! Bank statement reconciliation.
//!
//! Each statement row becomes a [`bank_transaction`] record and is matched against
//! the outstanding invoices of the lease its description points to. Rows are
//! processed one at a time, each in its own unit of work under the lease's lock;
//! a row that cannot be matched is left for manual review and a row that errors
//! is marked failed, without affecting the rest of the batch.

use crate::{
    config::settings::BillingSettings,
    core::{
        allocation::{
            AllocationPlan, PaymentSource, PlannedAllocation, Receipt, apply_plan,
            credit_remainder, outstanding_invoices, plan_oldest_first,
        },
        lease::{get_active_leases_for_tenant, require_lease},
        ledger::{self, NewPayment},
        locks::LeaseLocks,
        money::within_tolerance,
        reference::{ParsedReference, ReferenceParser, normalize_code},
        statement_import::{RawStatementRow, StatementRow, read_csv},
        unit_of_work::UnitOfWork,
    },
    entities::{
        BankTransaction, BankTransactionModel, BankTransactionStatus, ImportBatchModel,
        InvoiceModel, LeaseModel, MatchOutcome, PaymentMethod, Tenant, TransactionDirection,
        bank_transaction, import_batch, tenant, underpayment_alert,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// How a payment amount maps onto a lease's outstanding invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDecision {
    /// Exact, partial or overpayment
    pub outcome: MatchOutcome,
    /// Money received, spread over invoices
    pub allocations: Vec<PlannedAllocation>,
    /// Amount to hold as tenant credit
    pub credit: Decimal,
    /// Shortfall within the match tolerance, written off on the invoice it leaves open
    pub write_off: Option<PlannedAllocation>,
    /// Set on every partial outcome
    pub underpaid: Option<Underpayment>,
}

impl MatchDecision {
    /// Total applied to invoices and credit; always the amount received.
    #[must_use]
    pub fn applied(&self) -> Decimal {
        self.allocations.iter().map(|a| a.amount).sum::<Decimal>() + self.credit
    }
}

/// What a partial payment left owing across the lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underpayment {
    /// Oldest invoice still owing: the one left partially paid, or else the next unpaid one
    pub invoice_id: i64,
    /// Total outstanding before the payment
    pub expected: Decimal,
    /// Amount the payment brought in
    pub received: Decimal,
    /// What is still owed afterwards
    pub shortfall: Decimal,
}

/// Classifies an incoming `amount` against outstanding invoices (oldest first).
///
/// - equal (within `tolerance`) to one invoice's balance: that invoice is settled
/// - equal (within `tolerance`) to the total outstanding: every invoice is settled
/// - less than the total: oldest first, with an underpayment on the first invoice still owing
/// - more than the total: every invoice is settled and the rest becomes credit
///
/// Only the money received is allocated. A tolerated excess becomes credit and a
/// tolerated shortfall is returned as a write-off.
#[must_use]
pub fn decide_match(amount: Decimal, outstanding: &[InvoiceModel], tolerance: Decimal) -> MatchDecision {
    let total: Decimal = outstanding.iter().map(|i| i.balance_due).sum();

    let exact_single = outstanding
        .iter()
        .find(|i| within_tolerance(amount, i.balance_due, tolerance));
    let exact_targets = match exact_single {
        Some(single) => Some(std::slice::from_ref(single)),
        None if !outstanding.is_empty() && within_tolerance(amount, total, tolerance) => Some(outstanding),
        None => None,
    };
    if let Some(targets) = exact_targets {
        let due: Decimal = targets.iter().map(|i| i.balance_due).sum();
        let plan = plan_oldest_first(targets, amount);
        let write_off = first_unsettled(targets, &plan.allocations).map(|invoice| PlannedAllocation {
            invoice_id: invoice.id,
            balance_before: due - amount,
            amount: due - amount,
        });
        return MatchDecision {
            outcome: MatchOutcome::Exact,
            allocations: plan.allocations,
            credit: plan.remainder,
            write_off,
            underpaid: None,
        };
    }

    let plan = plan_oldest_first(outstanding, amount);
    if amount < total {
        let underpaid = first_unsettled(outstanding, &plan.allocations).map(|invoice| Underpayment {
            invoice_id: invoice.id,
            expected: total,
            received: amount,
            shortfall: total - amount,
        });
        MatchDecision {
            outcome: MatchOutcome::Partial,
            allocations: plan.allocations,
            credit: Decimal::ZERO,
            write_off: None,
            underpaid,
        }
    } else {
        MatchDecision {
            outcome: MatchOutcome::Overpayment,
            allocations: plan.allocations,
            credit: plan.remainder,
            write_off: None,
            underpaid: None,
        }
    }
}

/// Oldest invoice the allocations leave with a balance.
fn first_unsettled<'a>(invoices: &'a [InvoiceModel], allocations: &[PlannedAllocation]) -> Option<&'a InvoiceModel> {
    invoices.iter().find(|invoice| {
        let allocated: Decimal = allocations
            .iter()
            .filter(|a| a.invoice_id == invoice.id)
            .map(|a| a.amount)
            .sum();
        allocated < invoice.balance_due
    })
}

/// Lease a transaction resolved to, or why it needs an operator.
#[derive(Debug)]
enum Resolution {
    Lease(LeaseModel, String),
    Review(Option<String>, String),
}

/// A statement line as it arrives at the importer.
enum Incoming {
    Parsed(StatementRow),
    Rejected { raw: RawStatementRow, error: String },
}

/// Result of importing one statement.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// The stored batch with its final counts
    pub batch: ImportBatchModel,
    /// One stored transaction per statement row
    pub transactions: Vec<BankTransactionModel>,
}

/// Imports bank statements and matches their rows to invoices.
pub struct Reconciler {
    db: DatabaseConnection,
    settings: BillingSettings,
    locks: LeaseLocks,
    parser: ReferenceParser,
}

impl Reconciler {
    /// Creates a reconciler; fails if the reference patterns do not compile.
    pub fn new(db: DatabaseConnection, settings: BillingSettings, locks: LeaseLocks) -> Result<Self> {
        Ok(Self {
            db,
            settings,
            locks,
            parser: ReferenceParser::new()?,
        })
    }

    /// Imports a CSV statement. Rows that cannot be read are recorded as failed.
    #[instrument(skip(self, reader))]
    pub async fn import_csv(
        &self,
        reader: impl std::io::Read,
        source_name: &str,
        imported_by: &str,
    ) -> Result<ImportSummary> {
        let rows = read_csv(reader)?
            .into_iter()
            .map(|raw| match raw.normalize() {
                Ok(row) => Incoming::Parsed(row),
                Err(e) => Incoming::Rejected {
                    raw,
                    error: e.to_string(),
                },
            })
            .collect();
        self.import_rows(rows, source_name, imported_by).await
    }

    /// Imports already typed statement rows.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_statement(
        &self,
        rows: Vec<StatementRow>,
        source_name: &str,
        imported_by: &str,
    ) -> Result<ImportSummary> {
        let rows = rows.into_iter().map(Incoming::Parsed).collect();
        self.import_rows(rows, source_name, imported_by).await
    }

    async fn import_rows(
        &self,
        rows: Vec<Incoming>,
        source_name: &str,
        imported_by: &str,
    ) -> Result<ImportSummary> {
        let batch = import_batch::ActiveModel {
            source_name: Set(source_name.to_string()),
            imported_by: Set(imported_by.to_string()),
            total_rows: Set(i32::try_from(rows.len()).unwrap_or(i32::MAX)),
            reconciled_count: Set(0),
            manual_review_count: Set(0),
            failed_count: Set(0),
            imported_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for (index, incoming) in rows.into_iter().enumerate() {
            let row_number = i32::try_from(index + 1).unwrap_or(i32::MAX);
            let stored = match incoming {
                Incoming::Parsed(row) => {
                    let pending = self.store_row(batch.id, row_number, &row).await?;
                    match self.reconcile_transaction(pending.id).await {
                        Ok(done) => done,
                        Err(e) => {
                            warn!("Statement row {} failed: {}", row_number, e);
                            self.mark_failed(pending.id, &e.to_string()).await?
                        }
                    }
                }
                Incoming::Rejected { raw, error } => {
                    warn!("Statement row {} rejected: {}", row_number, error);
                    self.store_rejected(batch.id, row_number, &raw, &error).await?
                }
            };
            transactions.push(stored);
        }

        let count = |status: BankTransactionStatus| {
            i32::try_from(transactions.iter().filter(|t| t.status == status).count()).unwrap_or(i32::MAX)
        };
        let mut active_model: import_batch::ActiveModel = batch.into();
        active_model.reconciled_count = Set(count(BankTransactionStatus::Reconciled));
        active_model.manual_review_count = Set(count(BankTransactionStatus::ManualReview));
        active_model.failed_count = Set(count(BankTransactionStatus::Failed));
        let batch = active_model.update(&self.db).await?;

        info!(
            "Imported {} row(s) from {}: {} reconciled, {} for review, {} failed",
            batch.total_rows,
            batch.source_name,
            batch.reconciled_count,
            batch.manual_review_count,
            batch.failed_count
        );
        Ok(ImportSummary { batch, transactions })
    }

    async fn store_row(&self, batch_id: i64, row_number: i32, row: &StatementRow) -> Result<BankTransactionModel> {
        let (amount, direction) = row.resolved();
        bank_transaction::ActiveModel {
            batch_id: Set(batch_id),
            row_number: Set(row_number),
            transaction_date: Set(row.date),
            description: Set(row.description.clone()),
            amount: Set(amount),
            direction: Set(direction),
            reference: Set(row.reference.clone()),
            account: Set(row.account.clone()),
            parsed_reference: Set(None),
            lease_id: Set(None),
            invoice_id: Set(None),
            match_outcome: Set(MatchOutcome::Unmatched),
            status: Set(BankTransactionStatus::Pending),
            allocated_amount: Set(Decimal::ZERO),
            notes: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(Into::into)
    }

    async fn store_rejected(
        &self,
        batch_id: i64,
        row_number: i32,
        raw: &RawStatementRow,
        error: &str,
    ) -> Result<BankTransactionModel> {
        let description = if raw.description.trim().is_empty() {
            format!("(unreadable row {})", raw.row_number)
        } else {
            raw.description.clone()
        };
        bank_transaction::ActiveModel {
            batch_id: Set(batch_id),
            row_number: Set(row_number),
            transaction_date: Set(Utc::now().date_naive()),
            description: Set(description),
            amount: Set(Decimal::ZERO),
            direction: Set(TransactionDirection::Credit),
            reference: Set(None),
            account: Set(None),
            parsed_reference: Set(None),
            lease_id: Set(None),
            invoice_id: Set(None),
            match_outcome: Set(MatchOutcome::Unmatched),
            status: Set(BankTransactionStatus::Failed),
            allocated_amount: Set(Decimal::ZERO),
            notes: Set(Some(error.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(Into::into)
    }

    /// Matches one stored transaction. Reconciled transactions are returned as is.
    #[instrument(skip(self))]
    pub async fn reconcile_transaction(&self, transaction_id: i64) -> Result<BankTransactionModel> {
        let txn = find_transaction(&self.db, transaction_id).await?;
        if txn.status == BankTransactionStatus::Reconciled {
            return Ok(txn);
        }
        if txn.direction == TransactionDirection::Debit {
            return self.route_to_review(txn, None, "Outgoing payment").await;
        }
        if txn.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount { amount: txn.amount });
        }
        if let Some(original) = self.find_duplicate(&txn).await? {
            let note = format!("Duplicate of transaction {original}");
            warn!("Transaction {} is a duplicate of {}", txn.id, original);
            return self.mark_failed(txn.id, &note).await;
        }

        let (lease, parsed) = match self.resolve_lease(&txn).await? {
            Resolution::Lease(lease, parsed) => (lease, parsed),
            Resolution::Review(parsed, reason) => {
                return self.route_to_review(txn, parsed, &reason).await;
            }
        };

        let _guard = self.locks.lock(lease.id).await;
        let mut uow = UnitOfWork::begin(&self.db).await?;
        match self.apply_match(&mut uow, transaction_id, &lease, parsed).await {
            Ok(matched) => {
                uow.commit().await?;
                info!(
                    "Transaction {} of {} reconciled to lease {} ({:?})",
                    matched.id, matched.amount, lease.id, matched.match_outcome
                );
                Ok(matched)
            }
            Err(e) => {
                uow.rollback().await?;
                Err(e)
            }
        }
    }

    async fn apply_match(
        &self,
        uow: &mut UnitOfWork,
        transaction_id: i64,
        lease: &LeaseModel,
        parsed: String,
    ) -> Result<BankTransactionModel> {
        let txn = find_transaction(uow.conn(), transaction_id).await?;
        if txn.status == BankTransactionStatus::Reconciled {
            return Ok(txn);
        }

        let outstanding = outstanding_invoices(uow.conn(), lease.id).await?;
        let decision = decide_match(txn.amount, &outstanding, self.settings.match_tolerance);
        debug!("Transaction {} decision: {:?}", txn.id, decision);

        let receipt = Receipt {
            lease_id: lease.id,
            tenant_id: lease.tenant_id,
            source: PaymentSource::BankTransaction(txn.id),
            amount: txn.amount,
            method: PaymentMethod::BankTransfer,
            payment_date: txn.transaction_date,
            reference: txn.reference.clone().or_else(|| Some(parsed.clone())),
            actor: self.settings.system_actor.clone(),
        };
        let plan = AllocationPlan {
            allocations: decision.allocations.clone(),
            remainder: decision.credit,
        };
        apply_plan(uow, &receipt, &outstanding, &plan).await?;
        if decision.credit > Decimal::ZERO {
            credit_remainder(uow, &receipt, decision.credit, "Overpayment held as credit").await?;
        }

        if let Some(write_off) = decision.write_off {
            ledger::insert_payment(
                uow,
                NewPayment {
                    invoice_id: write_off.invoice_id,
                    amount: write_off.amount,
                    allocated_amount: write_off.amount,
                    payment_date: txn.transaction_date,
                    method: PaymentMethod::WriteOff,
                    reference: Some(format!("Within tolerance of transaction {}", txn.id)),
                    recorded_by: self.settings.system_actor.clone(),
                    is_overpayment: false,
                },
            )
            .await?;
            debug!("Wrote off {} on invoice {}", write_off.amount, write_off.invoice_id);
        }

        let mut notes = None;
        if let Some(underpaid) = decision.underpaid {
            let message = format!(
                "Payment of {} left {} outstanding, oldest on invoice {}",
                underpaid.received, underpaid.shortfall, underpaid.invoice_id
            );
            underpayment_alert::ActiveModel {
                invoice_id: Set(underpaid.invoice_id),
                bank_transaction_id: Set(txn.id),
                expected_amount: Set(underpaid.expected),
                actual_amount: Set(underpaid.received),
                shortfall_amount: Set(underpaid.shortfall),
                message: Set(message.clone()),
                is_resolved: Set(false),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(uow.conn())
            .await?;
            warn!("Underpayment on invoice {}: {}", underpaid.invoice_id, message);
            notes = Some(message);
        }

        let applied = decision.applied();
        let first_invoice = decision.allocations.first().map(|a| a.invoice_id);
        let mut active_model: bank_transaction::ActiveModel = txn.into();
        active_model.parsed_reference = Set(Some(parsed));
        active_model.lease_id = Set(Some(lease.id));
        active_model.invoice_id = Set(first_invoice);
        active_model.match_outcome = Set(decision.outcome);
        active_model.status = Set(BankTransactionStatus::Reconciled);
        active_model.allocated_amount = Set(applied);
        active_model.notes = Set(notes);
        active_model.update(uow.conn()).await.map_err(Into::into)
    }

    /// Works out which lease a transaction pays for.
    async fn resolve_lease(&self, txn: &BankTransactionModel) -> Result<Resolution> {
        if let Some(reference) = txn.reference.as_deref() {
            let code = normalize_code(reference);
            if let Some(found) = self.tenant_by_code(&code).await? {
                return self.single_lease(vec![found], code).await;
            }
        }

        let Some(parsed) = self.parser.parse(&txn.description) else {
            return Ok(Resolution::Review(None, "No tenant reference found".to_string()));
        };
        let label = parsed.as_str().to_string();
        let tenants = match &parsed {
            ParsedReference::TenantCode(code) => self.tenant_by_code(code).await?.into_iter().collect(),
            ParsedReference::TenantName(name) => {
                Tenant::find()
                    .filter(tenant::Column::Name.contains(name.as_str()))
                    .filter(tenant::Column::IsActive.eq(true))
                    .order_by_asc(tenant::Column::Id)
                    .all(&self.db)
                    .await?
            }
        };
        self.single_lease(tenants, label).await
    }

    async fn tenant_by_code(&self, code: &str) -> Result<Option<tenant::Model>> {
        Tenant::find()
            .filter(tenant::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// The one active lease among `tenants`, or a review reason.
    async fn single_lease(&self, tenants: Vec<tenant::Model>, label: String) -> Result<Resolution> {
        let mut leases = Vec::new();
        for found in &tenants {
            leases.extend(get_active_leases_for_tenant(&self.db, found.id).await?);
        }
        match leases.len() {
            0 => Ok(Resolution::Review(
                Some(label.clone()),
                format!("No active lease for '{label}'"),
            )),
            1 => {
                let lease_id = leases[0].id;
                Ok(Resolution::Lease(require_lease(&self.db, lease_id).await?, label))
            }
            n => Ok(Resolution::Review(
                Some(label.clone()),
                format!("'{label}' matches {n} active leases"),
            )),
        }
    }

    /// An already reconciled transaction with the same date, amount, description and reference.
    async fn find_duplicate(&self, txn: &BankTransactionModel) -> Result<Option<i64>> {
        let mut query = BankTransaction::find()
            .filter(bank_transaction::Column::Id.ne(txn.id))
            .filter(bank_transaction::Column::Status.eq(BankTransactionStatus::Reconciled))
            .filter(bank_transaction::Column::TransactionDate.eq(txn.transaction_date))
            .filter(bank_transaction::Column::Amount.eq(txn.amount))
            .filter(bank_transaction::Column::Description.eq(txn.description.as_str()));
        query = match txn.reference.as_deref() {
            Some(reference) => query.filter(bank_transaction::Column::Reference.eq(reference)),
            None => query.filter(bank_transaction::Column::Reference.is_null()),
        };
        Ok(query.one(&self.db).await?.map(|original| original.id))
    }

    async fn route_to_review(
        &self,
        txn: BankTransactionModel,
        parsed: Option<String>,
        reason: &str,
    ) -> Result<BankTransactionModel> {
        warn!("Transaction {} needs review: {}", txn.id, reason);
        let mut active_model: bank_transaction::ActiveModel = txn.into();
        active_model.parsed_reference = Set(parsed);
        active_model.match_outcome = Set(MatchOutcome::Unmatched);
        active_model.status = Set(BankTransactionStatus::ManualReview);
        active_model.notes = Set(Some(reason.to_string()));
        active_model.update(&self.db).await.map_err(Into::into)
    }

    async fn mark_failed(&self, transaction_id: i64, error: &str) -> Result<BankTransactionModel> {
        let txn = find_transaction(&self.db, transaction_id).await?;
        let mut active_model: bank_transaction::ActiveModel = txn.into();
        active_model.status = Set(BankTransactionStatus::Failed);
        active_model.notes = Set(Some(error.to_string()));
        active_model.update(&self.db).await.map_err(Into::into)
    }
}

async fn find_transaction<C>(db: &C, id: i64) -> Result<BankTransactionModel>
where
    C: ConnectionTrait,
{
    BankTransaction::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("bank transaction", id))
}

/// Transactions of a batch waiting for an operator, in statement order.
pub async fn transactions_for_review<C>(db: &C, batch_id: i64) -> Result<Vec<BankTransactionModel>>
where
    C: ConnectionTrait,
{
    BankTransaction::find()
        .filter(bank_transaction::Column::BatchId.eq(batch_id))
        .filter(bank_transaction::Column::Status.eq(BankTransactionStatus::ManualReview))
        .order_by_asc(bank_transaction::Column::RowNumber)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::credit::get_credit_balance;
    use crate::core::invoice::{get_payments, require_invoice};
    use crate::core::statement::generate_statement;
    use crate::entities::{InvoiceStatus, UnderpaymentAlert};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    fn reconciler(db: &DatabaseConnection) -> Reconciler {
        Reconciler::new(db.clone(), BillingSettings::default(), LeaseLocks::new()).unwrap()
    }

    fn row(description: &str, amount: Decimal) -> StatementRow {
        StatementRow {
            date: date(2025, 2, 10),
            description: description.to_string(),
            amount,
            direction: Some(TransactionDirection::Credit),
            reference: None,
            account: None,
        }
    }

    async fn alerts(db: &DatabaseConnection) -> Vec<underpayment_alert::Model> {
        UnderpaymentAlert::find().all(db).await.unwrap()
    }

    #[test]
    fn test_decide_match_branches() {
        let outstanding = vec![invoice_stub(1, dec!(500)), invoice_stub(2, dec!(600))];
        let tolerance = dec!(0.01);

        let exact = decide_match(dec!(600), &outstanding, tolerance);
        assert_eq!(exact.outcome, MatchOutcome::Exact);
        assert_eq!(exact.allocations.len(), 1);
        assert_eq!(exact.allocations[0].invoice_id, 2);
        assert_eq!(exact.allocations[0].amount, dec!(600));
        assert_eq!(exact.write_off, None);

        let all = decide_match(dec!(1100), &outstanding, tolerance);
        assert_eq!(all.outcome, MatchOutcome::Exact);
        assert_eq!(all.allocations.len(), 2);

        let partial = decide_match(dec!(700), &outstanding, tolerance);
        assert_eq!(partial.outcome, MatchOutcome::Partial);
        let underpaid = partial.underpaid.unwrap();
        assert_eq!(underpaid.invoice_id, 2);
        assert_eq!(underpaid.shortfall, dec!(400));

        let over = decide_match(dec!(1300), &outstanding, tolerance);
        assert_eq!(over.outcome, MatchOutcome::Overpayment);
        assert_eq!(over.credit, dec!(200));

        let nothing_owed = decide_match(dec!(50), &[], tolerance);
        assert_eq!(nothing_owed.outcome, MatchOutcome::Overpayment);
        assert_eq!(nothing_owed.credit, dec!(50));
    }

    #[test]
    fn test_partial_that_clears_whole_invoices_still_flags_shortfall() {
        let outstanding = vec![
            invoice_stub(1, dec!(500)),
            invoice_stub(2, dec!(600)),
            invoice_stub(3, dec!(200)),
        ];

        let decision = decide_match(dec!(1100), &outstanding, dec!(0.01));
        assert_eq!(decision.outcome, MatchOutcome::Partial);
        assert!(decision.allocations.iter().all(|a| a.balance_after().is_zero()));

        let underpaid = decision.underpaid.unwrap();
        assert_eq!(underpaid.invoice_id, 3);
        assert_eq!(underpaid.expected, dec!(1300));
        assert_eq!(underpaid.received, dec!(1100));
        assert_eq!(underpaid.shortfall, dec!(200));
    }

    #[test]
    fn test_tolerated_difference_is_not_lost() {
        let outstanding = vec![invoice_stub(1, dec!(1000))];
        let tolerance = dec!(0.01);

        let short = decide_match(dec!(999.99), &outstanding, tolerance);
        assert_eq!(short.outcome, MatchOutcome::Exact);
        assert_eq!(short.applied(), dec!(999.99));
        assert_eq!(short.allocations[0].amount, dec!(999.99));
        let write_off = short.write_off.unwrap();
        assert_eq!(write_off.invoice_id, 1);
        assert_eq!(write_off.amount, dec!(0.01));

        let long = decide_match(dec!(1000.01), &outstanding, tolerance);
        assert_eq!(long.outcome, MatchOutcome::Exact);
        assert_eq!(long.applied(), dec!(1000.01));
        assert_eq!(long.allocations[0].amount, dec!(1000));
        assert_eq!(long.credit, dec!(0.01));
        assert_eq!(long.write_off, None);
    }

    #[tokio::test]
    async fn test_exact_payment_settles_invoice() -> Result<()> {
        init_test_tracing();
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("EFT tenant T1001 February", dec!(1000.00))], "feb.csv", "clerk")
            .await?;

        let txn = &summary.transactions[0];
        assert_eq!(txn.status, BankTransactionStatus::Reconciled);
        assert_eq!(txn.match_outcome, MatchOutcome::Exact);
        assert_eq!(txn.invoice_id, Some(invoice.id));
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.status, InvoiceStatus::Paid);
        assert!(alerts(&fixture.db).await.is_empty());
        assert_eq!(summary.batch.reconciled_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_payment_raises_one_alert() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        reconciler(&fixture.db)
            .import_statement(vec![row("tenant T1001", dec!(700.00))], "feb.csv", "clerk")
            .await?;

        let invoice = require_invoice(&fixture.db, invoice.id).await?;
        assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(invoice.balance_due, dec!(300.00));

        let alerts = alerts(&fixture.db).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].expected_amount, dec!(1000.00));
        assert_eq!(alerts[0].actual_amount, dec!(700.00));
        assert_eq!(alerts[0].shortfall_amount, dec!(300.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_overpayment_credits_tenant() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("T1001-rent", dec!(1300.00))], "feb.csv", "clerk")
            .await?;

        assert_eq!(summary.transactions[0].match_outcome, MatchOutcome::Overpayment);
        assert_eq!(summary.transactions[0].allocated_amount, dec!(1300.00));
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.status, InvoiceStatus::Paid);
        assert_eq!(get_credit_balance(&fixture.db, fixture.tenant.id).await?, dec!(300.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_spanning_all_invoices_is_exact() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let older = create_custom_invoice(&fixture.db, &fixture.lease, dec!(500), date(2025, 1, 7), InvoiceStatus::Overdue).await?;
        let newer = create_custom_invoice(&fixture.db, &fixture.lease, dec!(600), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("tenant T1001", dec!(1100))], "feb.csv", "clerk")
            .await?;

        assert_eq!(summary.transactions[0].match_outcome, MatchOutcome::Exact);
        assert_eq!(require_invoice(&fixture.db, older.id).await?.status, InvoiceStatus::Paid);
        assert_eq!(require_invoice(&fixture.db, newer.id).await?.status, InvoiceStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_tolerance_settles_invoice_with_write_off() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("tenant T1001", dec!(999.99))], "feb.csv", "clerk")
            .await?;
        assert_eq!(summary.transactions[0].allocated_amount, dec!(999.99));

        let invoice = require_invoice(&fixture.db, invoice.id).await?;
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.balance_due, Decimal::ZERO);

        let payments = get_payments(&fixture.db, invoice.id).await?;
        let methods: Vec<_> = payments.iter().map(|p| (p.method, p.allocated_amount)).collect();
        assert!(methods.contains(&(PaymentMethod::BankTransfer, dec!(999.99))));
        assert!(methods.contains(&(PaymentMethod::WriteOff, dec!(0.01))));

        let statement = generate_statement(&fixture.db, fixture.lease.id, date(2025, 2, 1), date(2025, 2, 28), "ZAR").await?;
        assert_eq!(statement.summary.total_payments, dec!(999.99));
        assert_eq!(statement.summary.total_adjustments, dec!(-0.01));
        assert_eq!(statement.summary.closing_balance, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_tolerated_excess_becomes_credit() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("tenant T1001", dec!(1000.01))], "feb.csv", "clerk")
            .await?;

        assert_eq!(summary.transactions[0].match_outcome, MatchOutcome::Exact);
        assert_eq!(summary.transactions[0].allocated_amount, dec!(1000.01));
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.amount_paid, dec!(1000.00));
        assert_eq!(get_credit_balance(&fixture.db, fixture.tenant.id).await?, dec!(0.01));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_clearing_older_invoices_alerts_on_next_unpaid() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let january = create_custom_invoice(&fixture.db, &fixture.lease, dec!(500), date(2025, 1, 7), InvoiceStatus::Overdue).await?;
        let february = create_custom_invoice(&fixture.db, &fixture.lease, dec!(600), date(2025, 2, 7), InvoiceStatus::Sent).await?;
        let march = create_custom_invoice(&fixture.db, &fixture.lease, dec!(200), date(2025, 3, 7), InvoiceStatus::Sent).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("tenant T1001", dec!(1100))], "mar.csv", "clerk")
            .await?;

        assert_eq!(summary.transactions[0].match_outcome, MatchOutcome::Partial);
        assert_eq!(require_invoice(&fixture.db, january.id).await?.status, InvoiceStatus::Paid);
        assert_eq!(require_invoice(&fixture.db, february.id).await?.status, InvoiceStatus::Paid);
        assert_eq!(require_invoice(&fixture.db, march.id).await?.balance_due, dec!(200.00));

        let alerts = alerts(&fixture.db).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].invoice_id, march.id);
        assert_eq!(alerts[0].shortfall_amount, dec!(200.00));
        assert!(summary.transactions[0].notes.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_unmatched_rows_go_to_review() -> Result<()> {
        let fixture = setup_with_lease().await?;
        create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let mut debit = row("tenant T1001 refund", dec!(100));
        debit.direction = Some(TransactionDirection::Debit);
        let summary = reconciler(&fixture.db)
            .import_statement(
                vec![
                    row("Cash deposit", dec!(1000)),
                    row("tenant Z9999", dec!(1000)),
                    debit,
                ],
                "feb.csv",
                "clerk",
            )
            .await?;

        assert!(summary
            .transactions
            .iter()
            .all(|t| t.status == BankTransactionStatus::ManualReview));
        assert_eq!(summary.batch.manual_review_count, 3);
        assert_eq!(summary.transactions[1].parsed_reference.as_deref(), Some("Z9999"));
        assert_eq!(transactions_for_review(&fixture.db, summary.batch.id).await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_reference_and_name_matching() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;

        let mut with_reference = row("Internet transfer", dec!(400));
        with_reference.reference = Some("t1001".to_string());
        reconciler(&fixture.db)
            .import_statement(
                vec![with_reference, row("Payment from Mokoena", dec!(600))],
                "feb.csv",
                "clerk",
            )
            .await?;

        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.status, InvoiceStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_ambiguous_name_goes_to_review() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let other = create_test_tenant(&fixture.db, "T2002", "Ada Smith").await?;
        create_test_lease(&fixture.db, other.id, fixture.property.id).await?;

        let summary = reconciler(&fixture.db)
            .import_statement(vec![row("Payment from Ada", dec!(100))], "feb.csv", "clerk")
            .await?;

        let txn = &summary.transactions[0];
        assert_eq!(txn.status, BankTransactionStatus::ManualReview);
        assert!(txn.notes.as_deref().unwrap().contains("2 active leases"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reimported_row_is_failed_as_duplicate() -> Result<()> {
        let fixture = setup_with_lease().await?;
        create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;
        let reconciler = reconciler(&fixture.db);

        reconciler
            .import_statement(vec![row("tenant T1001", dec!(1000))], "feb.csv", "clerk")
            .await?;
        let again = reconciler
            .import_statement(vec![row("tenant T1001", dec!(1000))], "feb-copy.csv", "clerk")
            .await?;

        assert_eq!(again.transactions[0].status, BankTransactionStatus::Failed);
        assert_eq!(again.batch.failed_count, 1);
        assert_eq!(get_credit_balance(&fixture.db, fixture.tenant.id).await?, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_for_reconciled_rows() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;
        let reconciler = reconciler(&fixture.db);

        let summary = reconciler
            .import_statement(vec![row("tenant T1001", dec!(1000))], "feb.csv", "clerk")
            .await?;
        let again = reconciler.reconcile_transaction(summary.transactions[0].id).await?;

        assert_eq!(again.status, BankTransactionStatus::Reconciled);
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.amount_paid, dec!(1000));
        Ok(())
    }

    #[tokio::test]
    async fn test_csv_import_isolates_bad_rows() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;
        let data = "date,description,amount,direction\n\
                    garbage,tenant T1001,100,credit\n\
                    10/02/2025,tenant T1001,\"R 1,000.00\",cr\n\
                    2025-02-11,Bank fees,-25.00,\n";

        let summary = reconciler(&fixture.db)
            .import_csv(data.as_bytes(), "feb.csv", "clerk")
            .await?;

        assert_eq!(summary.batch.total_rows, 3);
        assert_eq!(summary.batch.failed_count, 1);
        assert_eq!(summary.batch.reconciled_count, 1);
        assert_eq!(summary.batch.manual_review_count, 1);
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.status, InvoiceStatus::Paid);
        assert_eq!(summary.transactions[1].lease_id, Some(fixture.lease.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_bytes_fail_one_row_only() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_custom_invoice(&fixture.db, &fixture.lease, dec!(1000), date(2025, 2, 7), InvoiceStatus::Sent).await?;
        let mut data = b"date,description,amount\n2025-02-10,tenant T1001,1000.00\n2025-02-11,".to_vec();
        data.extend_from_slice(&[0xFF, 0xFE]);
        data.extend_from_slice(b",50.00\n");

        let summary = reconciler(&fixture.db)
            .import_csv(data.as_slice(), "feb.csv", "clerk")
            .await?;

        assert_eq!(summary.batch.total_rows, 2);
        assert_eq!(summary.batch.reconciled_count, 1);
        assert_eq!(summary.batch.failed_count, 1);
        assert_eq!(summary.transactions[1].status, BankTransactionStatus::Failed);
        assert!(summary.transactions[1].notes.as_deref().unwrap().contains("UTF-8"));
        assert_eq!(require_invoice(&fixture.db, invoice.id).await?.status, InvoiceStatus::Paid);
        Ok(())
    }
}
