//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{
    Adjustment, BankTransaction, ImportBatch, Invoice, Lease, LineItem, ManualPayment, Payment,
    PaymentAllocation, Property, RecurringCharge, RentEscalationLog, SystemSetting, Tenant,
    TenantCreditBalance, UnderpaymentAlert,
};
use crate::errors::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/rent_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns the
/// default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {}", database_url);
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    Database::connect(options).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all ledger tables if they do not exist yet.
///
/// Collaborator-owned tables (tenants, properties, leases, recurring charges) come first
/// so foreign keys on the ledger tables resolve in creation order.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Tenant).await?;
    create_table(db, &schema, Property).await?;
    create_table(db, &schema, Lease).await?;
    create_table(db, &schema, RecurringCharge).await?;
    create_table(db, &schema, Invoice).await?;
    create_table(db, &schema, LineItem).await?;
    create_table(db, &schema, Payment).await?;
    create_table(db, &schema, Adjustment).await?;
    create_table(db, &schema, ManualPayment).await?;
    create_table(db, &schema, ImportBatch).await?;
    create_table(db, &schema, BankTransaction).await?;
    create_table(db, &schema, PaymentAllocation).await?;
    create_table(db, &schema, TenantCreditBalance).await?;
    create_table(db, &schema, UnderpaymentAlert).await?;
    create_table(db, &schema, RentEscalationLog).await?;
    create_table(db, &schema, SystemSetting).await?;

    info!("Ledger tables ensured");
    Ok(())
}
