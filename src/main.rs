#![allow(clippy::result_large_err)]

use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rent_ledger::{
    config::{
        database::{create_connection, create_tables, get_database_url},
        settings::{BillingSettings, load_default_config, load_settings_snapshot, set_tax_rate},
    },
    core::{
        allocation::{ManualPaymentRequest, PaymentAllocator},
        generation::InvoiceGenerator,
        invoice::mark_overdue_invoices,
        locks::LeaseLocks,
        reconciliation::{Reconciler, transactions_for_review},
        statement::generate_statement,
    },
    entities::PaymentMethod,
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rent-ledger", version, about = "Tenant billing ledger and bank reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the ledger tables and optionally store the tax rate
    Init {
        #[arg(long)]
        tax_rate: Option<Decimal>,
    },
    /// Generate the first invoice of a lease
    GenerateInitial {
        #[arg(long)]
        lease: i64,
    },
    /// Generate invoices for every active lease for a month (YYYY-MM)
    GenerateMonthly {
        #[arg(long, value_parser = parse_month)]
        month: (i32, u32),
        /// Create a new invoice even if one exists for the period
        #[arg(long)]
        force: bool,
    },
    /// Record a payment reported by a tenant and allocate it
    RecordPayment {
        #[arg(long)]
        lease: i64,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, value_parser = parse_method, default_value = "bank_transfer")]
        method: PaymentMethod,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        reference: Option<String>,
    },
    /// Import a bank statement CSV and reconcile its rows
    ImportStatement {
        csv: PathBuf,
        /// Name recorded on the import batch; defaults to the file name
        #[arg(long)]
        source: Option<String>,
    },
    /// Retry matching one bank transaction
    Reconcile {
        #[arg(long)]
        transaction: i64,
    },
    /// List transactions of an import batch awaiting manual review
    Review {
        #[arg(long)]
        batch: i64,
    },
    /// Print the account statement of a lease
    Statement {
        #[arg(long)]
        lease: i64,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Flag unpaid invoices past their due date
    MarkOverdue {
        /// Defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn parse_month(raw: &str) -> std::result::Result<(i32, u32), String> {
    let first = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got '{raw}'"))?;
    Ok((first.year(), first.month()))
}

fn parse_method(raw: &str) -> std::result::Result<PaymentMethod, String> {
    match raw.to_lowercase().as_str() {
        "bank_transfer" | "eft" => Ok(PaymentMethod::BankTransfer),
        "cash" => Ok(PaymentMethod::Cash),
        "cheque" => Ok(PaymentMethod::Cheque),
        "card" => Ok(PaymentMethod::Card),
        "other" => Ok(PaymentMethod::Other),
        other => Err(format!("unknown payment method '{other}'")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| Error::Validation {
        message: format!("Failed to render output: {e}"),
    })?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the file configuration and connect
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    let db = create_connection(&get_database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;

    run(cli.command, &db, &config.billing).await
}

async fn run(command: Command, db: &DatabaseConnection, defaults: &BillingSettings) -> Result<()> {
    if let Command::Init { tax_rate } = command {
        create_tables(db).await?;
        if let Some(rate) = tax_rate {
            set_tax_rate(db, rate).await?;
            info!("Tax rate set to {}%", rate);
        }
        return Ok(());
    }

    // Settings are snapshotted once per run and handed to the services.
    let settings = load_settings_snapshot(db, defaults).await?;
    let locks = LeaseLocks::new();
    let today = Utc::now().date_naive();

    match command {
        Command::Init { .. } => Ok(()),
        Command::GenerateInitial { lease } => {
            let generator = InvoiceGenerator::new(db.clone(), settings.clone(), locks);
            let generated = generator.generate_initial_invoice(lease, &settings.system_actor).await?;
            print_json(&generated)
        }
        Command::GenerateMonthly {
            month: (year, month),
            force,
        } => {
            let generator = InvoiceGenerator::new(db.clone(), settings, locks);
            let summary = generator.generate_monthly_invoices(year, month, force).await?;
            info!(
                "Monthly run {}-{:02}: {} created, {} skipped, {} failed",
                year, month, summary.created, summary.skipped, summary.failed
            );
            print_json(&summary)
        }
        Command::RecordPayment {
            lease,
            amount,
            method,
            date,
            reference,
        } => {
            let allocator = PaymentAllocator::new(db.clone(), locks);
            let (payment, outcome) = allocator
                .record_manual_payment(ManualPaymentRequest {
                    lease_id: lease,
                    amount,
                    method,
                    payment_date: date.unwrap_or(today),
                    reference,
                    recorded_by: settings.system_actor.clone(),
                })
                .await?;
            print_json(&(payment, outcome))
        }
        Command::ImportStatement { csv, source } => {
            let source = source.unwrap_or_else(|| {
                csv.file_name()
                    .map_or_else(|| csv.display().to_string(), |n| n.to_string_lossy().into_owned())
            });
            let reader = BufReader::new(File::open(&csv)?);
            let reconciler = Reconciler::new(db.clone(), settings.clone(), locks)?;
            let summary = reconciler
                .import_csv(reader, &source, &settings.system_actor)
                .await?;
            print_json(&summary)
        }
        Command::Reconcile { transaction } => {
            let reconciler = Reconciler::new(db.clone(), settings, locks)?;
            print_json(&reconciler.reconcile_transaction(transaction).await?)
        }
        Command::Review { batch } => print_json(&transactions_for_review(db, batch).await?),
        Command::Statement { lease, from, to } => {
            print_json(&generate_statement(db, lease, from, to, &settings.currency).await?)
        }
        Command::MarkOverdue { as_of } => {
            let marked = mark_overdue_invoices(db, as_of.unwrap_or(today)).await?;
            info!("{} invoice(s) marked overdue", marked.len());
            print_json(&marked)
        }
    }
}
