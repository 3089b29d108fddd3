//! Row-level data access
//!
//! Repositories own the SQL. They return plain row structs and
//! `DatabaseError`; nothing here knows about domain types.

pub mod billing;

pub use billing::{BillRow, BillingRepository, PackageRow, PatientRow, TestRow};
