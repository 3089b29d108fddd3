//! Test Data Builders
//!
//! Builders let a test state only the fields it cares about. `LabCatalog`
//! is the shared reference data; `InMemoryLab` wires it to a service over
//! the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;

use core_kernel::{Money, PatientId, Percentage, TenantId, UserId};
use domain_billing::adapters::InMemoryBillingStore;
use domain_billing::{
    BillingPolicy, BillingService, CatalogPackage, CatalogTest, CodeKind, CreateBillCommand,
    Gender, ManualClock, PatientRecord, PaymentDetails, PaymentMode, RequestedLine, SequenceKey, SequenceScope,
    YearMonth,
};

use crate::fixtures::{inr, CatalogFixtures, PatientFixtures, TemporalFixtures};

// ============================================================================
// Patients
// ============================================================================

/// Builder for patient records
pub struct PatientRecordBuilder {
    record: PatientRecord,
}

impl PatientRecordBuilder {
    /// A random adult patient of `tenant` with no doctor on file
    pub fn new(tenant: TenantId) -> Self {
        let phone: u64 = (6_000_000_000u64..9_999_999_999u64).fake();
        Self {
            record: PatientRecord {
                id: PatientId::new(),
                tenant_id: tenant,
                name: Name().fake(),
                age: (18u8..90u8).fake(),
                gender: Gender::Female,
                phone: phone.to_string(),
                doctor_name: None,
                referred_by: None,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.record.name = name.into();
        self
    }

    pub fn with_doctor(mut self, doctor: impl Into<String>) -> Self {
        self.record.doctor_name = Some(doctor.into());
        self
    }

    pub fn referred_by(mut self, referrer: impl Into<String>) -> Self {
        self.record.referred_by = Some(referrer.into());
        self
    }

    pub fn build(self) -> PatientRecord {
        self.record
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Reference data for one franchise
#[derive(Debug, Clone)]
pub struct LabCatalog {
    pub tenant: TenantId,
    pub patient: PatientRecord,
    pub cbc: CatalogTest,
    pub lipid: CatalogTest,
    pub widal: CatalogTest,
    /// CBC plus Widal at 500 regular, 350 special
    pub fever_panel: CatalogPackage,
}

impl LabCatalog {
    pub fn new(tenant: TenantId) -> Self {
        let cbc = CatalogFixtures::cbc(tenant);
        let widal = CatalogFixtures::widal(tenant);
        Self {
            tenant,
            patient: PatientFixtures::ravi_kumar(tenant),
            fever_panel: CatalogFixtures::fever_panel(tenant, vec![cbc.clone(), widal.clone()]),
            lipid: CatalogFixtures::lipid_profile(tenant),
            cbc,
            widal,
        }
    }

    /// Same catalog shape under fresh identifiers, for tests sharing a database
    pub fn fresh() -> Self {
        let mut catalog = Self::new(TenantId::new());
        let suffix = catalog.tenant.as_uuid().simple().to_string()[..8].to_string();
        catalog.patient.id = PatientId::new();
        for test in [&mut catalog.cbc, &mut catalog.lipid, &mut catalog.widal] {
            test.code = format!("{}-{}", test.code, suffix);
        }
        catalog.fever_panel.code = format!("{}-{}", catalog.fever_panel.code, suffix);
        catalog.fever_panel.tests = vec![catalog.cbc.clone(), catalog.widal.clone()];
        catalog
    }

    pub fn tests(&self) -> [&CatalogTest; 3] {
        [&self.cbc, &self.lipid, &self.widal]
    }

    /// Starts a bill for the catalog's patient
    pub fn bill(&self) -> CreateBillCommandBuilder {
        CreateBillCommandBuilder::new(self.tenant, self.patient.id)
    }

    /// Counter key for bills dated in `instant`'s month
    pub fn bill_key(instant: DateTime<Utc>) -> SequenceKey {
        SequenceKey::new(CodeKind::Bill, SequenceScope::monthly(YearMonth::of_instant(instant)))
            .expect("bill keys with a period are valid")
    }

    /// Loads the catalog into an in-memory store
    pub async fn load_into(&self, store: &InMemoryBillingStore) {
        store.add_patient(self.patient.clone()).await;
        for test in self.tests() {
            store.add_test(test.clone()).await;
        }
        store.add_package(self.fever_panel.clone()).await;
    }
}

/// A seeded in-memory store with a service on top
/// Bills are created at the lab clock's instant, mid-June 2024 unless moved
pub struct InMemoryLab {
    pub store: Arc<InMemoryBillingStore>,
    pub service: BillingService,
    pub catalog: LabCatalog,
    pub clock: Arc<ManualClock>,
}

impl InMemoryLab {
    pub async fn new() -> Self {
        Self::with_policy(BillingPolicy::default()).await
    }

    pub async fn with_policy(policy: BillingPolicy) -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let catalog = LabCatalog::new(TenantId::new());
        catalog.load_into(&store).await;

        let clock = Arc::new(ManualClock::new(TemporalFixtures::june_2024()));

        Self {
            service: BillingService::from_store(store.clone(), policy).with_clock(clock.clone()),
            store,
            catalog,
            clock,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Builder for `CreateBillCommand`
///
/// Defaults: no lines, no discount, 18 % tax, nothing paid, cash.
pub struct CreateBillCommandBuilder {
    command: CreateBillCommand,
}

impl CreateBillCommandBuilder {
    pub fn new(tenant: TenantId, patient: PatientId) -> Self {
        Self {
            command: CreateBillCommand::new(tenant, patient, Vec::new(), &BillingPolicy::default()),
        }
    }

    pub fn line(mut self, line: RequestedLine) -> Self {
        self.command.lines.push(line);
        self
    }

    pub fn test(self, test: &CatalogTest, quantity: u32) -> Self {
        self.line(RequestedLine::test(test.id, quantity))
    }

    pub fn package(self, package: &CatalogPackage) -> Self {
        self.line(RequestedLine::package(package.id, 1))
    }

    pub fn discount(mut self, amount: Decimal) -> Self {
        self.command.discount = inr(amount);
        self
    }

    pub fn tax(mut self, percentage: Decimal) -> Self {
        self.command.tax_percentage = Percentage::new(percentage);
        self
    }

    pub fn paid(mut self, amount: Decimal) -> Self {
        self.command.amount_paid = inr(amount);
        self
    }

    pub fn paid_money(mut self, amount: Money) -> Self {
        self.command.amount_paid = amount;
        self
    }

    pub fn mode(mut self, mode: PaymentMode) -> Self {
        self.command.payment_mode = mode;
        self
    }

    pub fn details(mut self, details: PaymentDetails) -> Self {
        self.command.payment_details = details;
        self
    }

    pub fn doctor(mut self, doctor: impl Into<String>) -> Self {
        self.command.doctor_name = Some(doctor.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.command.notes = Some(notes.into());
        self
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.command.created_by = Some(user);
        self
    }

    pub fn build(self) -> CreateBillCommand {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_command_defaults() {
        let catalog = LabCatalog::new(TenantId::new());
        let command = catalog.bill().test(&catalog.cbc, 2).build();

        assert_eq!(command.lines.len(), 1);
        assert_eq!(command.tax_percentage.value(), dec!(18));
        assert!(command.amount_paid.is_zero());
        assert!(command.discount.is_zero());
    }

    #[test]
    fn test_fresh_catalogs_do_not_share_codes() {
        let first = LabCatalog::fresh();
        let second = LabCatalog::fresh();
        assert_ne!(first.cbc.code, second.cbc.code);
        assert_ne!(first.patient.id, second.patient.id);
        assert_eq!(first.fever_panel.tests[0].id, first.cbc.id);
    }

    #[test]
    fn test_random_patient_is_plausible() {
        let patient = PatientRecordBuilder::new(TenantId::new()).with_doctor("Dr. Rao").build();
        assert!(!patient.name.is_empty());
        assert_eq!(patient.phone.len(), 10);
        assert!(patient.age >= 18);
        assert_eq!(patient.doctor_name.as_deref(), Some("Dr. Rao"));
    }
}
