//! Runtime settings
//!
//! Read from `LAB_BILLING_*` environment variables, after `.env` has been
//! loaded when present. Every field has a default, so an empty environment
//! yields a usable local configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LAB_BILLING_DATABASE_URL` | `postgres://localhost/lab_billing` |
//! | `LAB_BILLING_MAX_CONNECTIONS` | `10` |
//! | `LAB_BILLING_MIN_CONNECTIONS` | `2` |
//! | `LAB_BILLING_CONNECT_TIMEOUT_SECS` | `30` |
//! | `LAB_BILLING_CURRENCY` | `INR` |
//! | `LAB_BILLING_DEFAULT_TAX_PERCENTAGE` | `18` |
//! | `LAB_BILLING_SEQUENCE_MAX_ATTEMPTS` | `3` |
//! | `LAB_BILLING_LOG_LEVEL` | `info` |
//! | `LAB_BILLING_LOG_FORMAT` | `plain` |

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use core_kernel::{Currency, Percentage};
use domain_billing::BillingPolicy;

use crate::pool::DatabaseConfig;
use crate::telemetry::LogFormat;

const ENV_PREFIX: &str = "LAB_BILLING";

/// Settings for the billing engine and its database
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub currency: Currency,
    pub default_tax_percentage: Decimal,
    pub sequence_max_attempts: u32,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/lab_billing".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            currency: Currency::INR,
            default_tax_percentage: dec!(18),
            sequence_max_attempts: 3,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
        }
    }
}

impl BillingSettings {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let settings: Self = config::Config::builder()
            .add_source(environment.prefix_separator("_").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.min_connections > self.max_connections {
            return Err(config::ConfigError::Message(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.default_tax_percentage.is_sign_negative()
            || self.default_tax_percentage > dec!(100)
        {
            return Err(config::ConfigError::Message(format!(
                "default_tax_percentage must be within 0..=100, got {}",
                self.default_tax_percentage
            )));
        }
        Ok(())
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn to_policy(&self) -> BillingPolicy {
        BillingPolicy {
            currency: self.currency,
            default_tax_percentage: Percentage::new(self.default_tax_percentage),
            sequence_max_attempts: self.sequence_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BillingSettings, config::ConfigError> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        BillingSettings::from_environment(
            config::Environment::with_prefix(ENV_PREFIX).source(Some(source)),
        )
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        assert_eq!(load(&[]).unwrap(), BillingSettings::default());
    }

    #[test]
    fn test_overrides_are_read() {
        let settings = load(&[
            ("LAB_BILLING_DATABASE_URL", "postgres://db/lab"),
            ("LAB_BILLING_MAX_CONNECTIONS", "25"),
            ("LAB_BILLING_CURRENCY", "USD"),
            ("LAB_BILLING_SEQUENCE_MAX_ATTEMPTS", "5"),
            ("LAB_BILLING_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(settings.database_url, "postgres://db/lab");
        assert_eq!(settings.max_connections, 25);
        assert_eq!(settings.currency, Currency::USD);
        assert_eq!(settings.sequence_max_attempts, 5);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_inverted_pool_bounds_rejected() {
        let result = load(&[
            ("LAB_BILLING_MAX_CONNECTIONS", "2"),
            ("LAB_BILLING_MIN_CONNECTIONS", "5"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_convert_to_policy_and_pool() {
        let settings = BillingSettings::default();

        let policy = settings.to_policy();
        assert_eq!(policy.currency, Currency::INR);
        assert_eq!(policy.default_tax_percentage.value(), dec!(18));
        assert_eq!(policy.sequence_max_attempts, 3);

        let pool = settings.to_database_config();
        assert_eq!(pool.url, "postgres://localhost/lab_billing");
        assert_eq!(pool.acquire_timeout, Duration::from_secs(30));
    }
}
