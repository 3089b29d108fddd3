//! Service wiring

use std::sync::Arc;

use domain_billing::BillingService;
use tracing::info;

use crate::adapters::PostgresBillingAdapter;
use crate::config::BillingSettings;
use crate::error::DatabaseError;
use crate::pool::{create_pool, DatabasePool};

/// Wires a `BillingService` to an existing pool
pub fn billing_service(pool: DatabasePool, settings: &BillingSettings) -> BillingService {
    let adapter = Arc::new(PostgresBillingAdapter::new(pool));
    BillingService::from_store(adapter, settings.to_policy())
}

/// Opens the pool described by `settings` and wires a `BillingService` to it
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the database is unreachable
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::{BillingSettings, connect_billing_service};
///
/// let settings = BillingSettings::from_env()?;
/// let service = connect_billing_service(&settings).await?;
/// ```
pub async fn connect_billing_service(
    settings: &BillingSettings,
) -> Result<BillingService, DatabaseError> {
    let pool = create_pool(settings.to_database_config()).await?;
    info!(currency = %settings.currency, "Billing service connected");
    Ok(billing_service(pool, settings))
}
