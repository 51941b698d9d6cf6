/// Database connection and table creation
pub mod database;

/// Billing settings from `ledger.toml` and the `system_settings` table
pub mod settings;
