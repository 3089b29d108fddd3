//! Property-Based Test Generators
//!
//! Proptest strategies for billing inputs. Amounts are generated in paise
//! so every value is exactly representable in INR.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, Money, Percentage, TenantId};
use domain_billing::{
    CatalogTest, CodeKind, ItemDiscount, PaymentMode, PriceAdjustment, YearMonth,
};

/// Non-negative INR amounts up to one lakh
pub fn inr_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(|paise| Money::from_minor(paise, Currency::INR))
}

/// Strictly positive INR catalog prices
pub fn price_strategy() -> impl Strategy<Value = Money> {
    (100i64..5_000_000i64).prop_map(|paise| Money::from_minor(paise, Currency::INR))
}

pub fn quantity_strategy() -> impl Strategy<Value = u32> {
    1u32..=10u32
}

/// Tax rates as labs configure them, including fractional ones
pub fn tax_percentage_strategy() -> impl Strategy<Value = Percentage> {
    prop_oneof![
        Just(Percentage::zero()),
        Just(Percentage::new(Decimal::new(5, 0))),
        Just(Percentage::new(Decimal::new(12, 0))),
        Just(Percentage::new(Decimal::new(18, 0))),
        (0u32..=2800u32).prop_map(|bp| Percentage::new(Decimal::new(bp as i64, 2))),
    ]
}

/// An item-level adjustment that never exceeds `unit_price`
pub fn adjustment_strategy(unit_price: Money) -> impl Strategy<Value = PriceAdjustment> {
    let ceiling = (unit_price.amount() * Decimal::from(100))
        .trunc()
        .try_into()
        .unwrap_or(0i64);

    prop_oneof![
        Just(PriceAdjustment::None),
        (0i64..=ceiling).prop_map(|paise| {
            PriceAdjustment::Discount(ItemDiscount::Fixed(Money::from_minor(paise, Currency::INR)))
        }),
        (0u32..=100u32).prop_map(|pct| {
            PriceAdjustment::Discount(ItemDiscount::Percentage(Percentage::new(Decimal::from(pct))))
        }),
        (0i64..=ceiling).prop_map(|paise| {
            PriceAdjustment::FinalPrice(Money::from_minor(paise, Currency::INR))
        }),
    ]
}

/// Catalog tests of `tenant` with positive prices
pub fn catalog_test_strategy(tenant: TenantId) -> impl Strategy<Value = CatalogTest> {
    (1u32..10_000u32, price_strategy()).prop_map(move |(n, price)| {
        CatalogTest::new(tenant, format!("Test {}", n), format!("TEST{:04}", n), price)
    })
}

pub fn payment_mode_strategy() -> impl Strategy<Value = PaymentMode> {
    prop_oneof![
        Just(PaymentMode::Cash),
        Just(PaymentMode::Card),
        Just(PaymentMode::Upi),
        Just(PaymentMode::NetBanking),
        Just(PaymentMode::Cheque),
        Just(PaymentMode::Insurance),
        Just(PaymentMode::Multiple),
    ]
}

pub fn code_kind_strategy() -> impl Strategy<Value = CodeKind> {
    prop_oneof![
        Just(CodeKind::Patient),
        Just(CodeKind::Test),
        Just(CodeKind::Package),
        Just(CodeKind::Bill),
    ]
}

pub fn year_month_strategy() -> impl Strategy<Value = YearMonth> {
    (2000i32..2100i32, 1u32..=12u32)
        .prop_map(|(year, month)| YearMonth::new(year, month).expect("generated month is valid"))
}

/// Instants spread over 2024
pub fn billing_date_2024_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..366 * 24 * 60).prop_map(|minutes| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    })
}
