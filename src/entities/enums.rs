//! Enumerations stored as text columns.
//!
//! Each enum maps to a lowercase `snake_case` string in the database so rows stay
//! readable from any SQLite client.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being prepared, not yet delivered
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Delivered to the tenant
    #[sea_orm(string_value = "sent")]
    Sent,
    /// Delivered and frozen
    #[sea_orm(string_value = "locked")]
    Locked,
    /// Some money received, balance remains
    #[sea_orm(string_value = "partially_paid")]
    PartiallyPaid,
    /// Fully settled
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Past its due date with a balance
    #[sea_orm(string_value = "overdue")]
    Overdue,
    /// Withdrawn
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Unpaid balance moved onto a newer invoice as arrears
    #[sea_orm(string_value = "carried_forward")]
    CarriedForward,
}

impl InvoiceStatus {
    /// Statuses whose balance is still collectable.
    pub const OUTSTANDING: [Self; 4] = [
        Self::Sent,
        Self::Overdue,
        Self::PartiallyPaid,
        Self::Locked,
    ];

    /// Whether no further money movement is expected on the invoice.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled | Self::CarriedForward)
    }

    /// Whether the invoice counts towards what the tenant owes.
    #[must_use]
    pub const fn is_outstanding(self) -> bool {
        matches!(
            self,
            Self::Sent | Self::Overdue | Self::PartiallyPaid | Self::Locked
        )
    }
}

/// Why an invoice was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    /// First invoice of a lease
    #[sea_orm(string_value = "initial")]
    Initial,
    /// Monthly recurring invoice
    #[sea_orm(string_value = "regular")]
    Regular,
    /// Adjustment invoice referencing a locked parent
    #[sea_orm(string_value = "interim")]
    Interim,
}

/// Category of a single invoice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum LineItemCategory {
    /// Monthly or pro-rated rent
    #[sea_orm(string_value = "rent")]
    Rent,
    /// Unpaid balance brought forward
    #[sea_orm(string_value = "arrears")]
    Arrears,
    /// Penalty for late payment
    #[sea_orm(string_value = "late_fee")]
    LateFee,
    /// Refundable deposit
    #[sea_orm(string_value = "security_deposit")]
    SecurityDeposit,
    /// Pro-rata fee on the initial invoice
    #[sea_orm(string_value = "pro_rata_fee")]
    ProRataFee,
    /// Management fee on the initial invoice
    #[sea_orm(string_value = "management_fee")]
    ManagementFee,
    /// Procurement fee on the initial invoice
    #[sea_orm(string_value = "procurement_fee")]
    ProcurementFee,
    /// Lease-specific monthly charge
    #[sea_orm(string_value = "recurring")]
    Recurring,
    /// Administrative charge
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Signed manual adjustment
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    /// Anything else
    #[sea_orm(string_value = "other")]
    Other,
}

impl LineItemCategory {
    /// Lines that are taxed on the invoice they appear on.
    ///
    /// Carry-over and adjustment lines move amounts already taxed elsewhere.
    #[must_use]
    pub const fn is_taxable(self) -> bool {
        !matches!(self, Self::Arrears | Self::Adjustment)
    }
}

/// How money reached the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Electronic funds transfer
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    /// Cash
    #[sea_orm(string_value = "cash")]
    Cash,
    /// Cheque
    #[sea_orm(string_value = "cheque")]
    Cheque,
    /// Card payment
    #[sea_orm(string_value = "card")]
    Card,
    /// Synthetic payment drawn from the tenant's credit balance
    #[sea_orm(string_value = "credit_balance")]
    CreditBalance,
    /// Synthetic payment from a credit note on a locked invoice
    #[sea_orm(string_value = "credit_note")]
    CreditNote,
    /// Synthetic payment settling a shortfall within the match tolerance
    #[sea_orm(string_value = "write_off")]
    WriteOff,
    /// Any other method
    #[sea_orm(string_value = "other")]
    Other,
}

impl PaymentMethod {
    /// Whether the payment represents money actually received (as opposed to
    /// credit moved between ledger records).
    #[must_use]
    pub const fn is_cash_receipt(self) -> bool {
        !matches!(self, Self::CreditBalance | Self::CreditNote | Self::WriteOff)
    }
}

/// Kind of manual invoice adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Credit issued against a charge
    #[sea_orm(string_value = "credit_note")]
    CreditNote,
    /// Charge waived
    #[sea_orm(string_value = "waiver")]
    Waiver,
    /// Deducted from the deposit
    #[sea_orm(string_value = "deposit_deduction")]
    DepositDeduction,
    /// Correction of a billing error
    #[sea_orm(string_value = "correction")]
    Correction,
}

/// Status of a manually reported payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ManualPaymentStatus {
    /// Not allocated yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Fully allocated
    #[sea_orm(string_value = "allocated")]
    Allocated,
    /// Withdrawn before allocation
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Processing status of an imported bank transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum BankTransactionStatus {
    /// Stored, not matched yet
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Matched and allocated
    #[sea_orm(string_value = "reconciled")]
    Reconciled,
    /// Waiting for an operator
    #[sea_orm(string_value = "manual_review")]
    ManualReview,
    /// Could not be processed
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Direction of money on a bank statement line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    /// Money in
    #[sea_orm(string_value = "credit")]
    Credit,
    /// Money out
    #[sea_orm(string_value = "debit")]
    Debit,
}

/// How a bank transaction was matched to invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Settled one invoice or all of them
    #[sea_orm(string_value = "exact")]
    Exact,
    /// Paid less than was owed
    #[sea_orm(string_value = "partial")]
    Partial,
    /// Paid more than was owed
    #[sea_orm(string_value = "overpayment")]
    Overpayment,
    /// Allocated by an operator
    #[sea_orm(string_value = "manual")]
    Manual,
    /// No match made
    #[sea_orm(string_value = "unmatched")]
    Unmatched,
}

/// What produced a payment allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AllocationType {
    /// Oldest-first automatic matching
    #[sea_orm(string_value = "auto_match")]
    AutoMatch,
    /// Operator-specified mapping
    #[sea_orm(string_value = "manual")]
    Manual,
    /// Remainder held as tenant credit
    #[sea_orm(string_value = "tenant_credit")]
    TenantCredit,
}

/// Rent escalation or late fee calculation basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    /// Amount is a percentage of the base
    #[sea_orm(string_value = "percentage")]
    Percentage,
    /// Amount is a fixed currency value
    #[sea_orm(string_value = "fixed")]
    Fixed,
}
