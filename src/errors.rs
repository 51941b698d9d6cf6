//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry enough
//! context (which lease, which invoice, what was expected) for the caller to act.

use rust_decimal::Decimal;
use thiserror::Error;

/// Broad classification of an [`Error`], used by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced lease, invoice, tenant or payment does not exist
    NotFound,
    /// The request itself is malformed (bad amount, missing target, bad row)
    Validation,
    /// The request conflicts with current state (locked invoice, over-allocation)
    StateConflict,
    /// Storage, configuration or I/O failure
    Infrastructure,
}

/// All errors produced by the ledger.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record ("lease", "invoice", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Amount is zero, negative where a positive value is required, or otherwise unusable
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Request failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// What was expected
        message: String,
    },

    /// Attempt to edit the lines or totals of a locked invoice
    #[error("Invoice {invoice_id} is locked and cannot be edited")]
    InvoiceLocked {
        /// The locked invoice
        invoice_id: i64,
    },

    /// Attempt to allocate more than an invoice still owes
    #[error(
        "Cannot allocate {requested} to invoice {invoice_id}: balance due is {balance_due}"
    )]
    /// An allocation larger than the invoice's balance
    OverAllocation {
        /// Target invoice
        invoice_id: i64,
        /// Amount requested for allocation
        requested: Decimal,
        /// Balance due at allocation time
        balance_due: Decimal,
    },

    /// Operation not allowed in the record's current state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the conflict
        message: String,
    },

    /// A bank statement row could not be normalised
    #[error("Malformed statement row {row}: {message}")]
    MalformedRow {
        /// 1-based row number within the import
        row: usize,
        /// Which field failed and why
        message: String,
    },

    /// CSV reader failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] on a numeric id.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies this error into the ledger's error taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidAmount { .. } | Self::Validation { .. } | Self::MalformedRow { .. } => {
                ErrorKind::Validation
            }
            Self::InvoiceLocked { .. } | Self::OverAllocation { .. } | Self::InvalidState { .. } => {
                ErrorKind::StateConflict
            }
            Self::Database(_) | Self::Config { .. } | Self::Csv(_) | Self::Io(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(Error::not_found("lease", 7).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::InvalidAmount { amount: dec!(-5) }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::InvoiceLocked { invoice_id: 1 }.kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            Error::Config {
                message: "missing".to_string()
            }
            .kind(),
            ErrorKind::Infrastructure
        );
    }

    #[test]
    fn test_over_allocation_message_names_invoice() {
        let err = Error::OverAllocation {
            invoice_id: 12,
            requested: dec!(150.00),
            balance_due: dec!(100.00),
        };
        let message = err.to_string();
        assert!(message.contains("invoice 12"));
        assert!(message.contains("150.00"));
        assert!(message.contains("100.00"));
    }
}
