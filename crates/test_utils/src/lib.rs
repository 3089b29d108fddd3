//! Test Utilities Crate
//!
//! Shared test infrastructure for the lab billing workspace.
//!
//! # Modules
//!
//! - `fixtures`: A predictable tenant, patient and catalog
//! - `builders`: Builders for patients, catalogs and bill commands
//! - `database`: PostgreSQL testcontainer management and seeding
//! - `assertions`: Bill invariant checks with descriptive failures
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;

use once_cell::sync::Lazy;

static TEST_TRACING: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::fmt()
        .with_env_filter(infra_db::telemetry::env_filter(
            "warn,domain_billing=debug,infra_db=debug,sqlx=warn",
        ))
        .with_test_writer()
        .try_init()
        .ok();
});

/// Routes tracing output through the test harness; safe to call repeatedly
pub fn init_test_tracing() {
    Lazy::force(&TEST_TRACING);
}
