//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the lab billing engine, built on sqlx.
//!
//! # Architecture
//!
//! - `repositories` own the SQL and return row structs
//! - `adapters` implement the `domain_billing` ports on top of them
//! - `config`, `telemetry` and `bootstrap` assemble a running service
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{BillingSettings, connect_billing_service, init_tracing};
//!
//! let settings = BillingSettings::from_env()?;
//! init_tracing(&settings.log_level, settings.log_format);
//! let service = connect_billing_service(&settings).await?;
//! ```

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod pool;
pub mod repositories;
pub mod schema;
pub mod telemetry;

pub use adapters::PostgresBillingAdapter;
pub use bootstrap::{billing_service, connect_billing_service};
pub use config::BillingSettings;
pub use error::DatabaseError;
pub use pool::{create_pool, DatabaseConfig, DatabasePool};
pub use schema::{apply_schema, BILLING_TABLES, SCHEMA_SQL};
pub use telemetry::{init_tracing, LogFormat};
