//! Catalog and patient snapshots
//!
//! These are the read-only shapes the engine receives from its collaborators:
//! a franchise's tests and packages, and the patient being billed. The engine
//! copies what it needs out of them at bill creation, so later catalog edits
//! never reach a persisted bill.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, PackageId, PatientId, TenantId, TestId};

/// A single diagnostic test offered by a franchise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTest {
    pub id: TestId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Generated code such as `TEST0042`
    pub code: String,
    pub price: Money,
    pub is_active: bool,
}

impl CatalogTest {
    /// Creates an active catalog test
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        code: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            id: TestId::new_v7(),
            tenant_id,
            name: name.into(),
            code: code.into(),
            price,
            is_active: true,
        }
    }
}

/// A bundle of tests sold at a special price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPackage {
    pub id: PackageId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Generated code such as `PKG0007`
    pub code: String,
    pub regular_price: Money,
    pub special_price: Money,
    /// Constituent tests, already expanded
    pub tests: Vec<CatalogTest>,
    pub is_active: bool,
}

impl CatalogPackage {
    /// Creates an active package over the given tests
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        code: impl Into<String>,
        regular_price: Money,
        special_price: Money,
        tests: Vec<CatalogTest>,
    ) -> Self {
        Self {
            id: PackageId::new_v7(),
            tenant_id,
            name: name.into(),
            code: code.into(),
            regular_price,
            special_price,
            tests,
            is_active: true,
        }
    }

    /// Whole-number discount percentage advertised for the package
    ///
    /// Zero unless both prices are positive.
    pub fn discount_percentage(&self) -> Decimal {
        let regular = self.regular_price.amount();
        let special = self.special_price.amount();
        if regular <= Decimal::ZERO || special <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((regular - special) / regular * dec!(100))
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Patient gender as recorded at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Patient fields the engine reads when billing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: PatientId,
    pub tenant_id: TenantId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub phone: String,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
}
