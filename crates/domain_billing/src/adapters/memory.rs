//! In-memory implementation of the billing ports
//!
//! All state sits behind one `tokio::sync::Mutex`, so a reservation plus
//! insert is trivially atomic. Seeding helpers let tests plant legacy bills
//! and counters to provoke number collisions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use core_kernel::{
    BillId, DomainPort, HealthCheckResult, HealthCheckable, PackageId, PatientId,
    PortError, TenantId, TestId,
};

use crate::bill::{Bill, BillDraft};
use crate::catalog::{CatalogPackage, CatalogTest, PatientRecord};
use crate::ports::{BillPort, BillQuery, CatalogPort, PatientPort, SequencePort};
use crate::sequence::SequenceKey;

#[derive(Debug, Default)]
struct State {
    tests: HashMap<TestId, CatalogTest>,
    packages: HashMap<PackageId, CatalogPackage>,
    patients: HashMap<PatientId, PatientRecord>,
    counters: HashMap<String, u64>,
    bills: HashMap<BillId, Bill>,
}

impl State {
    fn number_taken(&self, number: &str) -> bool {
        self.bills.values().any(|bill| bill.bill_number == number)
    }
}

/// Process-local billing store
#[derive(Debug, Default, Clone)]
pub struct InMemoryBillingStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_test(&self, test: CatalogTest) {
        self.state.lock().await.tests.insert(test.id, test);
    }

    pub async fn add_package(&self, package: CatalogPackage) {
        self.state.lock().await.packages.insert(package.id, package);
    }

    pub async fn add_patient(&self, patient: PatientRecord) {
        self.state.lock().await.patients.insert(patient.id, patient);
    }

    /// Plants a bill as-is, bypassing numbering
    pub async fn seed_bill(&self, bill: Bill) {
        self.state.lock().await.bills.insert(bill.id, bill);
    }

    /// Sets a counter to an arbitrary value
    pub async fn seed_counter(&self, key: &SequenceKey, value: u64) {
        self.state.lock().await.counters.insert(key.storage_key(), value);
    }

    /// Current value of a counter, zero if never reserved
    pub async fn counter(&self, key: &SequenceKey) -> u64 {
        self.state
            .lock()
            .await
            .counters
            .get(&key.storage_key())
            .copied()
            .unwrap_or(0)
    }

    pub async fn bill_count(&self) -> usize {
        self.state.lock().await.bills.len()
    }
}

impl DomainPort for InMemoryBillingStore {}

#[async_trait]
impl HealthCheckable for InMemoryBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        HealthCheckResult::from_probe::<String>(
            "in-memory-billing-store",
            std::time::Instant::now(),
            Ok(()),
        )
    }
}

#[async_trait]
impl CatalogPort for InMemoryBillingStore {
    async fn find_active_test(
        &self,
        id: TestId,
        tenant: TenantId,
    ) -> Result<Option<CatalogTest>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .tests
            .get(&id)
            .filter(|test| test.tenant_id == tenant && test.is_active)
            .cloned())
    }

    async fn find_active_package(
        &self,
        id: PackageId,
        tenant: TenantId,
    ) -> Result<Option<CatalogPackage>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .packages
            .get(&id)
            .filter(|package| package.tenant_id == tenant && package.is_active)
            .cloned())
    }
}

#[async_trait]
impl PatientPort for InMemoryBillingStore {
    async fn find_patient(
        &self,
        id: PatientId,
        tenant: TenantId,
    ) -> Result<Option<PatientRecord>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .patients
            .get(&id)
            .filter(|patient| patient.tenant_id == tenant)
            .cloned())
    }
}

#[async_trait]
impl SequencePort for InMemoryBillingStore {
    async fn reserve(&self, key: &SequenceKey) -> Result<u64, PortError> {
        let mut state = self.state.lock().await;
        let counter = state.counters.entry(key.storage_key()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[async_trait]
impl BillPort for InMemoryBillingStore {
    async fn insert_numbered(&self, key: &SequenceKey, draft: BillDraft) -> Result<Bill, PortError> {
        let mut state = self.state.lock().await;

        let next = state.counters.get(&key.storage_key()).copied().unwrap_or(0) + 1;
        let number = key.render(next);

        // A taken number is skipped for good; the draft is not stored.
        state.counters.insert(key.storage_key(), next);
        if state.number_taken(&number) {
            return Err(PortError::conflict(format!("Bill number {} already exists", number)));
        }

        let bill = draft.into_bill(number);
        state.bills.insert(bill.id, bill.clone());
        Ok(bill)
    }

    async fn find_bill(&self, id: BillId, tenant: TenantId) -> Result<Option<Bill>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .bills
            .get(&id)
            .filter(|bill| bill.tenant_id == tenant)
            .cloned())
    }

    async fn update_bill(&self, bill: &Bill, expected_version: u64) -> Result<Bill, PortError> {
        let mut state = self.state.lock().await;
        let stored = state
            .bills
            .get_mut(&bill.id)
            .filter(|stored| stored.tenant_id == bill.tenant_id)
            .ok_or_else(|| PortError::not_found("Bill", bill.id))?;

        if stored.version != expected_version {
            return Err(PortError::conflict(format!(
                "Bill {} was modified concurrently (expected version {}, found {})",
                bill.bill_number, expected_version, stored.version
            )));
        }

        let mut updated = bill.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn list_bills(&self, tenant: TenantId, query: BillQuery) -> Result<Vec<Bill>, PortError> {
        let state = self.state.lock().await;
        let mut bills: Vec<Bill> = state
            .bills
            .values()
            .filter(|bill| bill.tenant_id == tenant && query.contains(bill.billing_date))
            .cloned()
            .collect();
        bills.sort_by_key(|bill| bill.billing_date);
        Ok(bills)
    }
}
