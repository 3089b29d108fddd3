//! Line-item pricing
//!
//! `price_test` and `price_package` are pure functions over a catalog
//! snapshot. [`LineItemPricer`] resolves a requested line against the
//! tenant's catalog and then calls them.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use core_kernel::{Money, PackageId, TenantId, TestId};

use crate::catalog::{CatalogPackage, CatalogTest};
use crate::command::{ItemDiscount, PriceAdjustment, RequestedLine};
use crate::error::BillingError;
use crate::line_item::{DiscountType, ItemType, LineItem, PackageTestSnapshot};
use crate::ports::CatalogPort;

fn check_quantity(quantity: u32, name: &str) -> Result<(), BillingError> {
    if quantity < 1 {
        return Err(BillingError::validation(format!(
            "Quantity for '{}' must be at least 1",
            name
        )));
    }
    Ok(())
}

/// Validates an explicit per-unit final price against its ceiling
fn explicit_final_price(price: Money, ceiling: &Money, name: &str) -> Result<Money, BillingError> {
    if price.is_negative() {
        return Err(BillingError::validation(format!(
            "Final price for '{}' cannot be negative",
            name
        )));
    }
    if price.currency() != ceiling.currency() {
        return Err(core_kernel::MoneyError::CurrencyMismatch(
            price.currency().to_string(),
            ceiling.currency().to_string(),
        )
        .into());
    }
    if price.amount() > ceiling.amount() {
        return Err(BillingError::validation(format!(
            "Final price {} for '{}' exceeds the list price {}",
            price, name, ceiling
        )));
    }
    Ok(price)
}

/// Prices a single test
///
/// Without an adjustment the test is billed at its catalog price. A fixed or
/// percentage discount, or an explicit final price, may lower it but never
/// below zero.
pub fn price_test(
    test: &CatalogTest,
    quantity: u32,
    adjustment: PriceAdjustment,
) -> Result<LineItem, BillingError> {
    check_quantity(quantity, &test.name)?;

    let unit_price = test.price;
    if unit_price.is_negative() {
        return Err(BillingError::validation(format!(
            "Catalog price for '{}' is negative",
            test.name
        )));
    }

    let (discount_type, discount_value, discount_amount) = match adjustment {
        PriceAdjustment::None => (DiscountType::None, Decimal::ZERO, Money::zero(unit_price.currency())),
        PriceAdjustment::FinalPrice(price) => {
            let final_price = explicit_final_price(price, &unit_price, &test.name)?;
            let discount = unit_price.checked_sub(&final_price)?;
            if discount.is_zero() {
                (DiscountType::None, Decimal::ZERO, discount)
            } else {
                (DiscountType::Fixed, discount.amount(), discount)
            }
        }
        PriceAdjustment::Discount(ItemDiscount::Fixed(value)) => {
            if value.is_negative() {
                return Err(BillingError::validation(format!(
                    "Discount for '{}' cannot be negative",
                    test.name
                )));
            }
            let discount = Money::zero(unit_price.currency()).checked_add(&value)?;
            if discount.amount() > unit_price.amount() {
                return Err(BillingError::validation(format!(
                    "Discount {} for '{}' exceeds its price {}",
                    discount, test.name, unit_price
                )));
            }
            (DiscountType::Fixed, discount.amount(), discount)
        }
        PriceAdjustment::Discount(ItemDiscount::Percentage(pct)) => {
            if pct.is_negative() || pct.value() > Decimal::ONE_HUNDRED {
                return Err(BillingError::validation(format!(
                    "Discount percentage {} for '{}' must be between 0 and 100",
                    pct, test.name
                )));
            }
            let discount = pct
                .of(&unit_price)
                .round_half_up(unit_price.currency().decimal_places());
            (DiscountType::Percentage, pct.value(), discount)
        }
    };

    let line = LineItem {
        item_type: ItemType::Test,
        item_ref: *test.id.as_uuid(),
        name: test.name.clone(),
        code: test.code.clone(),
        quantity,
        unit_price,
        discount_type,
        discount_value,
        final_price: unit_price.checked_sub(&discount_amount)?,
        discount_amount,
        is_package: false,
        package_breakdown: vec![],
    };
    line.validate()?;
    Ok(line)
}

/// Prices a package and snapshots its constituent tests
///
/// The unit price is the regular price and the package discount is the gap
/// to the special price. Only an explicit final price may override it.
pub fn price_package(
    package: &CatalogPackage,
    quantity: u32,
    adjustment: PriceAdjustment,
) -> Result<LineItem, BillingError> {
    check_quantity(quantity, &package.name)?;

    if package.tests.is_empty() {
        return Err(BillingError::validation(format!(
            "Package '{}' has no tests",
            package.name
        )));
    }
    if package.special_price.amount() > package.regular_price.amount() {
        return Err(BillingError::validation(format!(
            "Package '{}' special price {} exceeds its regular price {}",
            package.name, package.special_price, package.regular_price
        )));
    }

    let unit_price = package.regular_price;
    let final_price = match adjustment {
        PriceAdjustment::None => package.special_price,
        PriceAdjustment::FinalPrice(price) => explicit_final_price(price, &unit_price, &package.name)?,
        PriceAdjustment::Discount(_) => {
            return Err(BillingError::validation(format!(
                "Package '{}' is priced from the catalog; only a final price override is accepted",
                package.name
            )))
        }
    };
    let discount_amount = unit_price.checked_sub(&final_price)?.non_negative();
    let discount_type = if discount_amount.is_zero() {
        DiscountType::None
    } else {
        DiscountType::Fixed
    };

    let package_breakdown = package
        .tests
        .iter()
        .map(|test| PackageTestSnapshot {
            test_id: test.id,
            name: test.name.clone(),
            code: test.code.clone(),
            price: test.price,
        })
        .collect();

    let line = LineItem {
        item_type: ItemType::Package,
        item_ref: *package.id.as_uuid(),
        name: package.name.clone(),
        code: package.code.clone(),
        quantity,
        unit_price,
        discount_type,
        discount_value: discount_amount.amount(),
        discount_amount,
        final_price,
        is_package: true,
        package_breakdown,
    };
    line.validate()?;
    Ok(line)
}

/// Resolves requested lines against a tenant's catalog
#[derive(Clone)]
pub struct LineItemPricer {
    catalog: Arc<dyn CatalogPort>,
}

impl LineItemPricer {
    pub fn new(catalog: Arc<dyn CatalogPort>) -> Self {
        Self { catalog }
    }

    /// Prices one line
    ///
    /// # Errors
    ///
    /// `NotFound` when the test or package is absent, inactive, or owned by
    /// another tenant; `Validation` for service lines and bad adjustments.
    #[instrument(skip(self, line), fields(item_type = ?line.item_type, item_ref = %line.item_ref))]
    pub async fn price(&self, tenant: TenantId, line: &RequestedLine) -> Result<LineItem, BillingError> {
        match line.item_type {
            ItemType::Test => {
                let id = TestId::from_uuid(line.item_ref);
                let test = self
                    .catalog
                    .find_active_test(id, tenant)
                    .await?
                    .filter(|test| test.is_active && test.tenant_id == tenant)
                    .ok_or_else(|| BillingError::not_found("Test", id))?;
                debug!(code = %test.code, "Resolved test");
                price_test(&test, line.quantity, line.adjustment)
            }
            ItemType::Package => {
                let id = PackageId::from_uuid(line.item_ref);
                let package = self
                    .catalog
                    .find_active_package(id, tenant)
                    .await?
                    .filter(|package| package.is_active && package.tenant_id == tenant)
                    .ok_or_else(|| BillingError::not_found("Package", id))?;
                debug!(code = %package.code, tests = package.tests.len(), "Resolved package");
                price_package(&package, line.quantity, line.adjustment)
            }
            ItemType::Service => Err(BillingError::validation(
                "Service items have no catalog entry and cannot be priced",
            )),
        }
    }

    /// Prices every line in request order
    pub async fn price_all(
        &self,
        tenant: TenantId,
        lines: &[RequestedLine],
    ) -> Result<Vec<LineItem>, BillingError> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(self.price(tenant, line).await?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, Percentage};
    use rust_decimal_macros::dec;

    fn inr(amount: Decimal) -> Money {
        Money::new(amount, Currency::INR)
    }

    fn cbc(tenant: TenantId) -> CatalogTest {
        CatalogTest::new(tenant, "Complete Blood Count", "TEST0001", inr(dec!(400)))
    }

    fn package(tenant: TenantId, regular: Decimal, special: Decimal) -> CatalogPackage {
        CatalogPackage::new(
            tenant,
            "Fever Panel",
            "PKG0001",
            inr(regular),
            inr(special),
            vec![
                cbc(tenant),
                CatalogTest::new(tenant, "Widal", "TEST0002", inr(dec!(250))),
            ],
        )
    }

    #[test]
    fn test_plain_test_line() {
        let line = price_test(&cbc(TenantId::new()), 2, PriceAdjustment::None).unwrap();
        assert_eq!(line.unit_price.amount(), dec!(400));
        assert_eq!(line.final_price.amount(), dec!(400));
        assert!(line.discount_amount.is_zero());
        assert_eq!(line.discount_type, DiscountType::None);
        assert_eq!(line.line_total().amount(), dec!(800));
    }

    #[test]
    fn test_explicit_final_price_becomes_fixed_discount() {
        let line = price_test(
            &cbc(TenantId::new()),
            1,
            PriceAdjustment::FinalPrice(inr(dec!(350))),
        )
        .unwrap();
        assert_eq!(line.discount_type, DiscountType::Fixed);
        assert_eq!(line.discount_amount.amount(), dec!(50));
        assert_eq!(line.final_price.amount(), dec!(350));
    }

    #[test]
    fn test_final_price_above_list_rejected() {
        let result = price_test(
            &cbc(TenantId::new()),
            1,
            PriceAdjustment::FinalPrice(inr(dec!(450))),
        );
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_percentage_discount() {
        let line = price_test(
            &cbc(TenantId::new()),
            1,
            PriceAdjustment::Discount(ItemDiscount::Percentage(Percentage::new(dec!(12.5)))),
        )
        .unwrap();
        assert_eq!(line.discount_type, DiscountType::Percentage);
        assert_eq!(line.discount_value, dec!(12.5));
        assert_eq!(line.discount_amount.amount(), dec!(50));
        assert_eq!(line.final_price.amount(), dec!(350));
    }

    #[test]
    fn test_fixed_discount_above_price_rejected() {
        let result = price_test(
            &cbc(TenantId::new()),
            1,
            PriceAdjustment::Discount(ItemDiscount::Fixed(inr(dec!(401)))),
        );
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_package_discount_from_special_price() {
        let line = price_package(&package(TenantId::new(), dec!(500), dec!(350)), 1, PriceAdjustment::None).unwrap();
        assert_eq!(line.unit_price.amount(), dec!(500));
        assert_eq!(line.discount_amount.amount(), dec!(150));
        assert_eq!(line.final_price.amount(), dec!(350));
        assert_eq!(line.discount_type, DiscountType::Fixed);
        assert!(line.is_package);
        assert_eq!(line.package_breakdown.len(), 2);
        assert_eq!(line.package_breakdown[1].price.amount(), dec!(250));
    }

    #[test]
    fn test_package_override_recomputes_discount() {
        let line = price_package(
            &package(TenantId::new(), dec!(500), dec!(350)),
            1,
            PriceAdjustment::FinalPrice(inr(dec!(300))),
        )
        .unwrap();
        assert_eq!(line.discount_amount.amount(), dec!(200));
        assert_eq!(line.final_price.amount(), dec!(300));
    }

    #[test]
    fn test_package_without_saving_has_no_discount() {
        let line = price_package(&package(TenantId::new(), dec!(500), dec!(500)), 1, PriceAdjustment::None).unwrap();
        assert_eq!(line.discount_type, DiscountType::None);
        assert!(line.discount_amount.is_zero());
        assert_eq!(line.final_price.amount(), dec!(500));
        assert!(line.validate().is_ok());
    }

    #[test]
    fn test_package_special_above_regular_rejected() {
        let result = price_package(&package(TenantId::new(), dec!(300), dec!(350)), 1, PriceAdjustment::None);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_empty_package_rejected() {
        let mut empty = package(TenantId::new(), dec!(500), dec!(350));
        empty.tests.clear();
        let result = price_package(&empty, 1, PriceAdjustment::None);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = price_test(&cbc(TenantId::new()), 0, PriceAdjustment::None);
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_breakdown_is_a_snapshot() {
        let tenant = TenantId::new();
        let mut catalog = package(tenant, dec!(500), dec!(350));
        let line = price_package(&catalog, 1, PriceAdjustment::None).unwrap();

        catalog.tests[0].price = inr(dec!(999));
        assert_eq!(line.package_breakdown[0].price.amount(), dec!(400));
    }
}
