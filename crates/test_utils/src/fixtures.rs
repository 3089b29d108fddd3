//! Pre-built Test Fixtures
//!
//! A small, predictable lab: one tenant, one patient, three tests and a
//! package, priced in INR. Figures are chosen so hand-computed totals stay
//! readable in assertions.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{Currency, Money, PatientId, TenantId};
use domain_billing::{CatalogPackage, CatalogTest, Gender, PatientRecord};

/// Shorthand for an INR amount
pub fn inr(amount: Decimal) -> Money {
    Money::new(amount, Currency::INR)
}

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn zero() -> Money {
        Money::zero(Currency::INR)
    }

    /// Price of the complete blood count test
    pub fn cbc_price() -> Money {
        inr(dec!(400))
    }

    pub fn lipid_price() -> Money {
        inr(dec!(600))
    }

    pub fn widal_price() -> Money {
        inr(dec!(250))
    }

    pub fn fever_panel_regular() -> Money {
        inr(dec!(500))
    }

    pub fn fever_panel_special() -> Money {
        inr(dec!(350))
    }

    /// USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100), Currency::USD)
    }
}

/// Fixture for billing dates
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Mid-June 2024, the default billing date
    pub fn june_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    /// Last second of June 2024
    pub fn june_2024_close() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap()
    }

    pub fn july_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    pub fn june_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    pub fn tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// A second franchise for isolation tests
    pub fn other_tenant_id() -> TenantId {
        TenantId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    pub fn patient_id() -> PatientId {
        PatientId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }
}

/// Fixture for the catalog of one franchise
pub struct CatalogFixtures;

impl CatalogFixtures {
    pub fn cbc(tenant: TenantId) -> CatalogTest {
        CatalogTest::new(tenant, "Complete Blood Count", "TEST0001", MoneyFixtures::cbc_price())
    }

    pub fn lipid_profile(tenant: TenantId) -> CatalogTest {
        CatalogTest::new(tenant, "Lipid Profile", "TEST0002", MoneyFixtures::lipid_price())
    }

    pub fn widal(tenant: TenantId) -> CatalogTest {
        CatalogTest::new(tenant, "Widal", "TEST0003", MoneyFixtures::widal_price())
    }

    /// Package of `tests` at 500 regular, 350 special
    pub fn fever_panel(tenant: TenantId, tests: Vec<CatalogTest>) -> CatalogPackage {
        CatalogPackage::new(
            tenant,
            "Fever Panel",
            "PKG0001",
            MoneyFixtures::fever_panel_regular(),
            MoneyFixtures::fever_panel_special(),
            tests,
        )
    }
}

/// Fixture for patients
pub struct PatientFixtures;

impl PatientFixtures {
    /// A patient with a default doctor and referrer on file
    pub fn ravi_kumar(tenant: TenantId) -> PatientRecord {
        PatientRecord {
            id: IdFixtures::patient_id(),
            tenant_id: tenant,
            name: "Ravi Kumar".to_string(),
            age: 52,
            gender: Gender::Male,
            phone: "9812345670".to_string(),
            doctor_name: Some("Dr. Iyer".to_string()),
            referred_by: Some("City Clinic".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_ids_are_distinct() {
        assert_ne!(IdFixtures::tenant_id(), IdFixtures::other_tenant_id());
    }

    #[test]
    fn test_package_undercuts_its_tests() {
        let tenant = IdFixtures::tenant_id();
        let panel = CatalogFixtures::fever_panel(
            tenant,
            vec![CatalogFixtures::cbc(tenant), CatalogFixtures::widal(tenant)],
        );
        assert_eq!(panel.discount_percentage(), dec!(30));
        assert_eq!(panel.tests.len(), 2);
    }
}
