//! Shared test utilities for the billing ledger.
//!
//! This module provides helpers for setting up an in-memory database and
//! creating tenants, leases and invoices with sensible defaults.

use crate::{
    core::{
        generation::month_bounds,
        invoice::{NewInvoice, insert_invoice},
        ledger::{NewLineItem, NewPayment, insert_line_item_unchecked, insert_payment},
        unit_of_work::UnitOfWork,
    },
    entities::{
        self, InvoiceKind, InvoiceModel, InvoiceStatus, LeaseModel, LineItemCategory,
        ManualPaymentStatus, PaymentMethod, RateType, lease, manual_payment, property,
        recurring_charge, tenant,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, EntityTrait, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// opens its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output to the test harness. Safe to call more than once.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rent_ledger=debug")
        .with_test_writer()
        .try_init();
}

/// Shorthand for a calendar date in tests.
///
/// # Panics
/// On an impossible date.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A database with one tenant, property and active lease.
pub struct LeaseFixture {
    /// In-memory database
    pub db: DatabaseConnection,
    /// Tenant `T1001`
    pub tenant: entities::TenantModel,
    /// Residential property
    pub property: entities::PropertyModel,
    /// Active lease of the tenant
    pub lease: LeaseModel,
}

/// Sets up a complete test environment with a lease.
///
/// # Defaults
/// * tenant `T1001` "Ada Mokoena"
/// * residential property "Unit 4"
/// * lease from 2025-01-01, rent 1000, no deposit, due on the 7th
pub async fn setup_with_lease() -> Result<LeaseFixture> {
    let db = setup_test_db().await?;
    let tenant = create_test_tenant(&db, "T1001", "Ada Mokoena").await?;
    let property = create_test_property(&db, "Unit 4", false).await?;
    let lease = create_test_lease(&db, tenant.id, property.id).await?;
    Ok(LeaseFixture {
        db,
        tenant,
        property,
        lease,
    })
}

/// Creates an active tenant.
pub async fn create_test_tenant(
    db: &DatabaseConnection,
    code: &str,
    name: &str,
) -> Result<entities::TenantModel> {
    let model = tenant::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        email: Set(None),
        is_active: Set(true),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a property; `is_commercial` decides whether tax applies.
pub async fn create_test_property(
    db: &DatabaseConnection,
    name: &str,
    is_commercial: bool,
) -> Result<entities::PropertyModel> {
    let model = property::ActiveModel {
        name: Set(name.to_string()),
        is_commercial: Set(is_commercial),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a lease starting 2025-01-01 with rent 1000 and no deposit.
pub async fn create_test_lease(
    db: &DatabaseConnection,
    tenant_id: i64,
    property_id: i64,
) -> Result<LeaseModel> {
    create_custom_lease(
        db,
        tenant_id,
        property_id,
        date(2025, 1, 1),
        Decimal::new(1000, 0),
        Decimal::ZERO,
    )
    .await
}

/// Creates an active lease due on the 7th with no fees, escalation or late fee.
pub async fn create_custom_lease(
    db: &DatabaseConnection,
    tenant_id: i64,
    property_id: i64,
    start_date: NaiveDate,
    monthly_rent: Decimal,
    deposit: Decimal,
) -> Result<LeaseModel> {
    let model = lease::ActiveModel {
        tenant_id: Set(tenant_id),
        property_id: Set(property_id),
        start_date: Set(start_date),
        end_date: Set(None),
        monthly_rent: Set(monthly_rent),
        deposit: Set(deposit),
        due_day: Set(7),
        is_active: Set(true),
        escalation_type: Set(None),
        escalation_amount: Set(Decimal::ZERO),
        next_escalation_date: Set(None),
        late_fee_type: Set(None),
        late_fee_amount: Set(Decimal::ZERO),
        late_fee_grace_days: Set(0),
        pro_rata_fee_percent: Set(None),
        management_fee_percent: Set(None),
        procurement_fee_percent: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

async fn update_lease(
    db: &DatabaseConnection,
    lease_id: i64,
    change: impl FnOnce(&mut lease::ActiveModel),
) -> Result<LeaseModel> {
    let existing = entities::Lease::find_by_id(lease_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("lease", lease_id))?;
    let mut active_model: lease::ActiveModel = existing.into();
    change(&mut active_model);
    active_model.updated_at = Set(Utc::now());
    Ok(active_model.update(db).await?)
}

/// Marks a lease inactive.
pub async fn deactivate_lease(db: &DatabaseConnection, lease_id: i64) -> Result<LeaseModel> {
    update_lease(db, lease_id, |l| l.is_active = Set(false)).await
}

/// Configures the annual escalation of a lease.
pub async fn set_escalation(
    db: &DatabaseConnection,
    lease_id: i64,
    rate_type: RateType,
    amount: Decimal,
    next_date: NaiveDate,
) -> Result<LeaseModel> {
    update_lease(db, lease_id, |l| {
        l.escalation_type = Set(Some(rate_type));
        l.escalation_amount = Set(amount);
        l.next_escalation_date = Set(Some(next_date));
    })
    .await
}

/// Configures the late-fee policy of a lease.
pub async fn set_late_fee(
    db: &DatabaseConnection,
    lease_id: i64,
    rate_type: RateType,
    amount: Decimal,
    grace_days: i32,
) -> Result<LeaseModel> {
    update_lease(db, lease_id, |l| {
        l.late_fee_type = Set(Some(rate_type));
        l.late_fee_amount = Set(amount);
        l.late_fee_grace_days = Set(grace_days);
    })
    .await
}

/// Sets the initial-invoice fee percentages of a lease.
pub async fn set_fee_percentages(
    db: &DatabaseConnection,
    lease_id: i64,
    pro_rata: Option<Decimal>,
    management: Option<Decimal>,
    procurement: Option<Decimal>,
) -> Result<LeaseModel> {
    update_lease(db, lease_id, |l| {
        l.pro_rata_fee_percent = Set(pro_rata);
        l.management_fee_percent = Set(management);
        l.procurement_fee_percent = Set(procurement);
    })
    .await
}

/// Adds an active recurring charge to a lease.
pub async fn add_recurring_charge(
    db: &DatabaseConnection,
    lease_id: i64,
    description: &str,
    amount: Decimal,
) -> Result<entities::RecurringChargeModel> {
    let model = recurring_charge::ActiveModel {
        lease_id: Set(lease_id),
        description: Set(description.to_string()),
        category: Set(LineItemCategory::Recurring),
        amount: Set(amount),
        is_active: Set(true),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a sent invoice for February 2025 with one rent line of `amount`.
///
/// Invoices created this way share a billing period, so their numbers run
/// `-01`, `-02`, ... An `amount` of zero leaves the invoice without lines.
pub async fn create_test_invoice(
    db: &DatabaseConnection,
    lease: &LeaseModel,
    amount: Decimal,
) -> Result<InvoiceModel> {
    create_custom_invoice(db, lease, amount, date(2025, 2, 7), InvoiceStatus::Sent).await
}

/// Creates an invoice for the month containing `due_date`.
pub async fn create_custom_invoice(
    db: &DatabaseConnection,
    lease: &LeaseModel,
    amount: Decimal,
    due_date: NaiveDate,
    status: InvoiceStatus,
) -> Result<InvoiceModel> {
    let (period_start, period_end) = month_bounds(due_date.year(), due_date.month())?;
    let mut uow = UnitOfWork::begin(db).await?;
    let invoice = insert_invoice(
        &mut uow,
        NewInvoice {
            lease_id: lease.id,
            tenant_id: lease.tenant_id,
            kind: InvoiceKind::Regular,
            status,
            issue_date: period_start,
            due_date,
            period_start,
            period_end,
            tax_rate: Decimal::ZERO,
            parent_invoice_id: None,
        },
    )
    .await?;
    if !amount.is_zero() {
        insert_line_item_unchecked(
            &mut uow,
            invoice.id,
            NewLineItem::single("Rent", LineItemCategory::Rent, amount),
        )
        .await?;
    }

    let recalculated = uow.commit().await?;
    recalculated
        .into_iter()
        .find(|i| i.id == invoice.id)
        .ok_or_else(|| Error::not_found("invoice", invoice.id))
}

/// Records a bank transfer against an invoice, dated on its due date.
pub async fn record_test_payment(
    db: &DatabaseConnection,
    invoice_id: i64,
    amount: Decimal,
) -> Result<entities::PaymentModel> {
    let invoice = entities::Invoice::find_by_id(invoice_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invoice", invoice_id))?;

    let mut uow = UnitOfWork::begin(db).await?;
    let payment = insert_payment(
        &mut uow,
        NewPayment {
            invoice_id,
            amount,
            allocated_amount: amount,
            payment_date: invoice.due_date,
            method: PaymentMethod::BankTransfer,
            reference: None,
            recorded_by: "test_user".to_string(),
            is_overpayment: false,
        },
    )
    .await?;
    uow.commit().await?;
    Ok(payment)
}

/// Creates a pending manual payment for a lease.
pub async fn create_pending_manual_payment(
    db: &DatabaseConnection,
    lease_id: i64,
    amount: Decimal,
) -> Result<entities::ManualPaymentModel> {
    let model = manual_payment::ActiveModel {
        lease_id: Set(lease_id),
        amount: Set(amount),
        allocated_amount: Set(Decimal::ZERO),
        remaining_amount: Set(amount),
        method: Set(PaymentMethod::Cash),
        payment_date: Set(date(2025, 2, 10)),
        reference: Set(None),
        status: Set(ManualPaymentStatus::Pending),
        recorded_by: Set("test_user".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// An unsaved outstanding invoice for pure planning tests. Due dates grow with `id`.
pub fn invoice_stub(id: i64, balance_due: Decimal) -> InvoiceModel {
    let now = Utc::now();
    let due_date = date(2025, 1, 7) + chrono::Days::new(u64::try_from(id).unwrap_or(0) * 30);
    InvoiceModel {
        id,
        invoice_number: format!("INV-0001-202501-{id:02}"),
        lease_id: 1,
        tenant_id: 1,
        kind: InvoiceKind::Regular,
        status: InvoiceStatus::Sent,
        issue_date: due_date,
        due_date,
        period_start: due_date,
        period_end: due_date,
        subtotal: balance_due,
        tax_rate: Decimal::ZERO,
        tax_amount: Decimal::ZERO,
        total: balance_due,
        amount_paid: Decimal::ZERO,
        balance_due,
        is_locked: false,
        locked_at: None,
        locked_by: None,
        parent_invoice_id: None,
        created_at: now,
        updated_at: now,
    }
}
