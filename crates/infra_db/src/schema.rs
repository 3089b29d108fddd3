//! Billing schema
//!
//! The DDL is idempotent (`IF NOT EXISTS` throughout), so applying it to an
//! already-initialised database is a no-op.

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

/// DDL for the catalog, patient, counter and bill tables
pub const SCHEMA_SQL: &str = include_str!("../../../migrations/20240101_000001_lab_billing.sql");

/// Tables in dependency order, children first
pub const BILLING_TABLES: &[&str] = &[
    "bills",
    "sequence_counters",
    "lab_package_tests",
    "lab_packages",
    "lab_tests",
    "patients",
];

/// Runs the schema DDL against `pool`
pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    info!("Billing schema applied");
    Ok(())
}
