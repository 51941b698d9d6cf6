//! `rent-ledger` - billing ledger and payment reconciliation for tenant leases
//!
//! This crate generates monthly invoices with arrears, late fees and escalations,
//! allocates payments to invoices, reconciles bank statement imports against
//! tenant references and produces account statements.

#![deny(
    unsafe_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::dbg_macro,
    clippy::todo,
    clippy::float_arithmetic,
    clippy::clone_on_ref_ptr,
    clippy::semicolon_if_nothing_returned,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
)]

/// Configuration management for database and billing settings
pub mod config;
/// Core business logic - invoicing, allocation, reconciliation and statements
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;

#[cfg(test)]
pub mod test_utils;
