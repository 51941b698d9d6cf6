//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

/// Manual invoice adjustments
pub mod adjustment;
/// Bank statement rows
pub mod bank_transaction;
/// Text-backed enums shared by the tables
pub mod enums;
/// Statement import batches
pub mod import_batch;
/// Invoices
pub mod invoice;
/// Leases
pub mod lease;
/// Invoice lines
pub mod line_item;
/// Manually reported payments
pub mod manual_payment;
/// Payments against invoices
pub mod payment;
/// Audit links from money received to invoices
pub mod payment_allocation;
/// Rental properties
pub mod property;
/// Recurring lease charges
pub mod recurring_charge;
/// Applied rent escalations
pub mod rent_escalation_log;
/// Persisted key/value settings
pub mod system_setting;
/// Tenants
pub mod tenant;
/// Tenant credit balances
pub mod tenant_credit_balance;
/// Underpayment alerts
pub mod underpayment_alert;

// Re-export specific types to avoid conflicts
pub use adjustment::{Entity as Adjustment, Model as AdjustmentModel};
pub use bank_transaction::{Entity as BankTransaction, Model as BankTransactionModel};
pub use enums::{
    AdjustmentType, AllocationType, BankTransactionStatus, InvoiceKind, InvoiceStatus,
    LineItemCategory, ManualPaymentStatus, MatchOutcome, PaymentMethod, RateType,
    TransactionDirection,
};
pub use import_batch::{Entity as ImportBatch, Model as ImportBatchModel};
pub use invoice::{Column as InvoiceColumn, Entity as Invoice, Model as InvoiceModel};
pub use lease::{Column as LeaseColumn, Entity as Lease, Model as LeaseModel};
pub use line_item::{Column as LineItemColumn, Entity as LineItem, Model as LineItemModel};
pub use manual_payment::{Entity as ManualPayment, Model as ManualPaymentModel};
pub use payment::{Column as PaymentColumn, Entity as Payment, Model as PaymentModel};
pub use payment_allocation::{Entity as PaymentAllocation, Model as PaymentAllocationModel};
pub use property::{Entity as Property, Model as PropertyModel};
pub use recurring_charge::{Entity as RecurringCharge, Model as RecurringChargeModel};
pub use rent_escalation_log::{Entity as RentEscalationLog, Model as RentEscalationLogModel};
pub use system_setting::{Entity as SystemSetting, Model as SystemSettingModel};
pub use tenant::{Entity as Tenant, Model as TenantModel};
pub use tenant_credit_balance::{Entity as TenantCreditBalance, Model as TenantCreditBalanceModel};
pub use underpayment_alert::{Entity as UnderpaymentAlert, Model as UnderpaymentAlertModel};
