//! Billing Domain Ports
//!
//! The engine reads catalog and patient data, reserves sequence numbers, and
//! persists bills through the traits below. Two adapters ship with the
//! workspace:
//!
//! - **InMemoryBillingStore** (`crate::adapters`): tests and local wiring
//! - **PostgresBillingAdapter** (`infra_db`): the production store
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::{BillingService, BillingPolicy};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PostgresBillingAdapter::new(pool));
//! let service = BillingService::from_store(store, BillingPolicy::default());
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{BillId, DomainPort, PackageId, PatientId, PortError, TenantId, TestId};

use crate::bill::{Bill, BillDraft};
use crate::catalog::{CatalogPackage, CatalogTest, PatientRecord};
use crate::sequence::SequenceKey;

/// Date window for listing bills
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillQuery {
    /// Inclusive lower bound on `billing_date`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `billing_date`
    pub to: Option<DateTime<Utc>>,
}

impl BillQuery {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns true when the instant falls inside the window
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from) && self.to.map_or(true, |to| instant < to)
    }
}

/// Read-only access to a tenant's active catalog
#[async_trait]
pub trait CatalogPort: DomainPort {
    /// Finds an active test owned by the tenant
    ///
    /// Inactive tests and tests of other tenants resolve to `None`.
    async fn find_active_test(
        &self,
        id: TestId,
        tenant: TenantId,
    ) -> Result<Option<CatalogTest>, PortError>;

    /// Finds an active package owned by the tenant, constituent tests expanded
    async fn find_active_package(
        &self,
        id: PackageId,
        tenant: TenantId,
    ) -> Result<Option<CatalogPackage>, PortError>;
}

/// Source of patient snapshots
#[async_trait]
pub trait PatientPort: DomainPort {
    async fn find_patient(
        &self,
        id: PatientId,
        tenant: TenantId,
    ) -> Result<Option<PatientRecord>, PortError>;
}

/// Atomic per-scope counters
#[async_trait]
pub trait SequencePort: DomainPort {
    /// Increments the counter behind `key` and returns the new value
    ///
    /// A single indivisible operation: two callers never observe the same
    /// value. The first reservation on a fresh key returns 1.
    async fn reserve(&self, key: &SequenceKey) -> Result<u64, PortError>;
}

/// Bill persistence
#[async_trait]
pub trait BillPort: DomainPort {
    /// Reserves the next ordinal under `key` and inserts the numbered bill
    ///
    /// Both happen in one unit of work: if the insert fails the reservation
    /// is rolled back. Returns `PortError::Conflict` when the rendered number
    /// already exists.
    async fn insert_numbered(&self, key: &SequenceKey, draft: BillDraft) -> Result<Bill, PortError>;

    /// Finds a bill owned by the tenant, cancelled bills included
    async fn find_bill(&self, id: BillId, tenant: TenantId) -> Result<Option<Bill>, PortError>;

    /// Stores a modified bill if its stored version still equals `expected_version`
    ///
    /// # Returns
    ///
    /// The stored bill with its version bumped, `PortError::Conflict` on a
    /// stale version, or `PortError::NotFound` if the bill does not exist.
    async fn update_bill(&self, bill: &Bill, expected_version: u64) -> Result<Bill, PortError>;

    /// Lists the tenant's bills in the window, oldest first
    async fn list_bills(&self, tenant: TenantId, query: BillQuery) -> Result<Vec<Bill>, PortError>;
}

/// Everything the billing service needs from one backing store
pub trait BillingStore: CatalogPort + PatientPort + SequencePort + BillPort {}

impl<T: CatalogPort + PatientPort + SequencePort + BillPort> BillingStore for T {}
