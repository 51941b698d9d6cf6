//! Core billing logic, independent of any front end.
//!
//! Operations take a database connection (or a [`unit_of_work::UnitOfWork`]) and
//! return typed results, so the CLI and tests drive the same code paths.

/// Payment allocation, manual payments and invoice adjustments
pub mod allocation;
/// Tenant credit balances
pub mod credit;
/// Annual rent escalation
pub mod escalation;
/// Initial and monthly invoice generation
pub mod generation;
/// Invoice lifecycle operations
pub mod invoice;
/// Lease, tenant and property lookups
pub mod lease;
/// Invoice totals and the line item / payment primitives
pub mod ledger;
/// Per-lease serialization of mutating operations
pub mod locks;
/// Decimal money helpers
pub mod money;
/// Bank statement import and transaction matching
pub mod reconciliation;
/// Tenant references parsed from statement descriptions
pub mod reference;
/// Account statements
pub mod statement;
/// CSV statement reading
pub mod statement_import;
/// Transaction scope with deferred invoice recalculation
pub mod unit_of_work;
