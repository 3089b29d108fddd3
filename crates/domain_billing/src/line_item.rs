//! Bill line items
//!
//! A line item is one priced entry on a bill. Prices on the line are per
//! unit: `final_price = unit_price - discount_amount`, and the aggregator
//! multiplies by `quantity`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{Money, TestId};

use crate::error::BillingError;

/// What a line item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    /// A single catalog test
    Test,
    /// A catalog package, expanded into its tests
    Package,
    /// An ad-hoc service charge (kept for stored bills; not priceable)
    Service,
}

/// How a per-unit discount was expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscountType {
    #[default]
    None,
    Fixed,
    Percentage,
}

/// Snapshot of one test inside a package line, frozen at billing time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageTestSnapshot {
    pub test_id: TestId,
    pub name: String,
    pub code: String,
    pub price: Money,
}

/// A priced entry on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub item_type: ItemType,
    /// Catalog identity of the test or package
    pub item_ref: Uuid,
    pub name: String,
    pub code: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount_type: DiscountType,
    /// Fixed amount or percentage, as the discount was expressed
    pub discount_value: Decimal,
    /// Per-unit discount actually applied
    pub discount_amount: Money,
    /// Per-unit price after discount
    pub final_price: Money,
    pub is_package: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_breakdown: Vec<PackageTestSnapshot>,
}

impl LineItem {
    /// Amount this line contributes to the subtotal
    pub fn line_total(&self) -> Money {
        self.final_price * Decimal::from(self.quantity)
    }

    /// Gross amount before any discount
    pub fn gross_total(&self) -> Money {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Checks the per-line invariants
    ///
    /// Quantity at least one, no negative amounts, the final price equals
    /// unit price minus discount, and package lines carry their breakdown.
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.quantity < 1 {
            return Err(BillingError::validation(format!(
                "Quantity for '{}' must be at least 1",
                self.name
            )));
        }
        if self.unit_price.is_negative() {
            return Err(BillingError::validation(format!(
                "Unit price for '{}' cannot be negative",
                self.name
            )));
        }
        if self.discount_amount.is_negative() || self.discount_value < Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "Discount for '{}' cannot be negative",
                self.name
            )));
        }
        if self.final_price.is_negative() {
            return Err(BillingError::validation(format!(
                "Final price for '{}' cannot be negative",
                self.name
            )));
        }
        if self.unit_price.checked_sub(&self.discount_amount)? != self.final_price {
            return Err(BillingError::validation(format!(
                "Final price for '{}' does not equal unit price minus discount",
                self.name
            )));
        }
        if self.is_package && self.package_breakdown.is_empty() {
            return Err(BillingError::validation(format!(
                "Package '{}' has no constituent tests",
                self.name
            )));
        }
        Ok(())
    }
}
