//! Billing settings loading from `ledger.toml` and the `system_settings` table.
//!
//! Services never read settings from ambient state: callers build a [`BillingSettings`]
//! snapshot once and hand it to the generator and reconciler at construction.

use crate::entities::{SystemSetting, system_setting};
use crate::errors::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Set, prelude::*};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Key of the persisted tax rate in `system_settings`
pub const TAX_RATE_KEY: &str = "tax_rate";

/// Settings snapshot injected into the billing services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BillingSettings {
    /// Tax percentage applied to invoices of commercial properties
    #[serde(default)]
    pub tax_rate: Decimal,
    /// Largest difference between a payment and an invoice balance still treated as exact
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: Decimal,
    /// Who generated invoices are attributed to when no operator is named
    #[serde(default = "default_system_actor")]
    pub system_actor: String,
    /// ISO currency code shown on statements
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_match_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_system_actor() -> String {
    "system".to_string()
}

fn default_currency() -> String {
    "ZAR".to_string()
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::ZERO,
            match_tolerance: default_match_tolerance(),
            system_actor: default_system_actor(),
            currency: default_currency(),
        }
    }
}

/// Configuration structure representing the entire `ledger.toml` file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Billing defaults
    #[serde(default)]
    pub billing: BillingSettings,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or a
/// value is out of range.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger.toml: {e}"),
    })?;
    validate(&config.billing)?;
    Ok(config)
}

/// Loads settings from `./ledger.toml`, falling back to defaults when the file is absent.
pub fn load_default_config() -> Result<Config> {
    if Path::new("ledger.toml").exists() {
        load_config("ledger.toml")
    } else {
        Ok(Config {
            billing: BillingSettings::default(),
        })
    }
}

fn validate(settings: &BillingSettings) -> Result<()> {
    if settings.tax_rate < Decimal::ZERO || settings.tax_rate > Decimal::ONE_HUNDRED {
        return Err(Error::Config {
            message: format!("tax_rate must be between 0 and 100, got {}", settings.tax_rate),
        });
    }
    if settings.match_tolerance < Decimal::ZERO {
        return Err(Error::Config {
            message: format!(
                "match_tolerance must not be negative, got {}",
                settings.match_tolerance
            ),
        });
    }
    Ok(())
}

/// Reads a stored setting value.
pub async fn get_setting<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    Ok(SystemSetting::find()
        .filter(system_setting::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|s| s.value))
}

/// Inserts or updates a stored setting value.
pub async fn set_setting<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let existing = SystemSetting::find()
        .filter(system_setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(setting) = existing {
        let mut active_model: system_setting::ActiveModel = setting.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_setting = system_setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_setting.insert(db).await?;
    }

    Ok(())
}

/// Persists the system tax rate.
pub async fn set_tax_rate<C>(db: &C, tax_rate: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    validate(&BillingSettings {
        tax_rate,
        ..BillingSettings::default()
    })?;
    set_setting(db, TAX_RATE_KEY, &tax_rate.to_string()).await
}

/// Builds the settings snapshot: stored values override the file defaults.
pub async fn load_settings_snapshot<C>(db: &C, defaults: &BillingSettings) -> Result<BillingSettings>
where
    C: ConnectionTrait,
{
    let mut settings = defaults.clone();
    if let Some(raw) = get_setting(db, TAX_RATE_KEY).await? {
        settings.tax_rate = Decimal::from_str(&raw).map_err(|e| Error::Config {
            message: format!("Stored tax_rate '{raw}' is not a number: {e}"),
        })?;
    }
    validate(&settings)?;
    Ok(settings)
}
