//! Billing configuration loading from config.toml
//!
//! Every field has a default, so a missing file or an empty `[billing]` table
//! yields a working configuration.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Billing and scheduling settings
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Settings consumed by fee generation and class scheduling
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Due day used when a member has none, or one that cannot be parsed
    pub default_due_day: u32,
    /// Category label stamped on generated fees
    pub fee_category: String,
    /// Maximum number of class slots one member may hold
    pub max_slots_per_member: usize,
    /// Maximum number of members in one class slot
    pub slot_capacity: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_due_day: 10,
            fee_category: "Monthly fee".to_string(),
            max_slots_per_member: 2,
            slot_capacity: 6,
        }
    }
}

impl BillingConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=31).contains(&self.default_due_day) {
            return Err(Error::Config {
                message: format!(
                    "default_due_day must be between 1 and 31, got {}",
                    self.default_due_day
                ),
            });
        }
        if self.fee_category.trim().is_empty() {
            return Err(Error::Config {
                message: "fee_category cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses billing configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.billing.validate()?;
    Ok(config)
}

/// Loads billing configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid,
/// or a value is out of range.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads `./config.toml`, falling back to defaults when the file is absent.
pub fn load_default_config() -> Result<Config> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!("No config.toml found, using default billing settings");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_billing_config() {
        let toml_str = r#"
            [billing]
            default_due_day = 5
            fee_category = "Mensalidade"
            max_slots_per_member = 3
            slot_capacity = 8
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.billing.default_due_day, 5);
        assert_eq!(config.billing.fee_category, "Mensalidade");
        assert_eq!(config.billing.max_slots_per_member, 3);
        assert_eq!(config.billing.slot_capacity, 8);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = parse_config("[billing]\ndefault_due_day = 15\n").unwrap();
        assert_eq!(config.billing.default_due_day, 15);
        assert_eq!(config.billing.fee_category, "Monthly fee");
        assert_eq!(config.billing.max_slots_per_member, 2);

        let empty = parse_config("").unwrap();
        assert_eq!(empty.billing, BillingConfig::default());
    }

    #[test]
    fn test_out_of_range_due_day_rejected() {
        let result = parse_config("[billing]\ndefault_due_day = 40\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
