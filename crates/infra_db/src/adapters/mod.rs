//! Port implementations over PostgreSQL
//!
//! Adapters translate between `domain_billing` types and the row types of
//! `crate::repositories`, and map `DatabaseError` into `PortError`.

pub mod billing;

pub use billing::PostgresBillingAdapter;
