//! Adapters shipped with the billing domain
//!
//! - **InMemoryBillingStore**: implements every billing port over process
//!   memory; used by tests and local wiring
//!
//! The PostgreSQL adapter lives in `infra_db`.

pub mod memory;

pub use memory::InMemoryBillingStore;
