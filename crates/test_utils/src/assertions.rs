//! Custom Test Assertions
//!
//! Assertion helpers for bills that report which invariant broke and with
//! what figures, rather than a bare `left != right`.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::Money;
use domain_billing::{balance_due, Bill, BillingError, PaymentStatus, YearMonth};

/// Asserts two amounts are equal in value and currency
///
/// Scale is ignored, so `400` equals `400.00`.
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount().normalize(),
        expected.amount().normalize(),
        "Amount mismatch: actual={} {}, expected={} {}",
        actual.currency().symbol(),
        actual.amount(),
        expected.currency().symbol(),
        expected.amount()
    );
}

/// Asserts the stored figures of a bill agree with each other
///
/// # Panics
///
/// Panics naming the first figure that does not follow from the line items,
/// the tax percentage, the discount and the amount paid.
pub fn assert_bill_consistent(bill: &Bill) {
    assert!(!bill.items.is_empty(), "Bill {} has no items", bill.bill_number);

    for item in &bill.items {
        if let Err(error) = item.validate() {
            panic!("Bill {} item '{}' is invalid: {}", bill.bill_number, item.name, error);
        }
    }

    let subtotal = bill
        .items
        .iter()
        .fold(Money::zero(bill.subtotal.currency()), |acc, item| acc + item.line_total());
    assert_money_eq(&bill.subtotal, &subtotal);

    assert_money_eq(&bill.tax_amount, &bill.tax_percentage.of(&bill.subtotal));

    let pre_round = bill.totals().pre_round();
    assert_money_eq(&bill.total_amount, &pre_round.round_half_up(0));
    assert_money_eq(&bill.round_off, &(bill.total_amount - pre_round));
    assert!(
        bill.round_off.amount().abs() <= dec!(0.5),
        "Bill {} round-off {} exceeds half a unit",
        bill.bill_number,
        bill.round_off.amount()
    );
    assert!(
        !bill.total_amount.is_negative(),
        "Bill {} has a negative total",
        bill.bill_number
    );

    assert_money_eq(&bill.balance_due, &balance_due(&bill.total_amount, &bill.amount_paid));

    if !bill.is_cancelled() {
        assert_eq!(
            bill.payment_status,
            PaymentStatus::derive(&bill.total_amount, &bill.amount_paid),
            "Bill {} status does not match total {} and paid {}",
            bill.bill_number,
            bill.total_amount.amount(),
            bill.amount_paid.amount()
        );
    }
}

/// Asserts a bill number reads `BILL<yyyy><mm><ordinal>`
pub fn assert_bill_number(number: &str, period: YearMonth, ordinal: u64) {
    let expected = format!("BILL{:04}{:02}{:04}", period.year(), period.month(), ordinal);
    assert_eq!(number, expected, "Unexpected bill number");
}

/// Asserts no two codes are equal
pub fn assert_all_unique<'a>(codes: impl IntoIterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for code in codes {
        assert!(seen.insert(code), "Code {} was assigned twice", code);
    }
}

/// Asserts the bill's total equals `expected` whole units
pub fn assert_total(bill: &Bill, expected: Decimal) {
    assert_eq!(
        bill.total_amount.amount().normalize(),
        expected.normalize(),
        "Bill {} total",
        bill.bill_number
    );
}

/// Asserts a result failed with a validation error
pub fn assert_validation_error<T: std::fmt::Debug>(result: Result<T, BillingError>) {
    match result {
        Err(BillingError::Validation(_)) => {}
        other => panic!("Expected a validation error, got {:?}", other),
    }
}

/// Asserts a result failed because the entity was not found
pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, BillingError>) {
    match result {
        Err(BillingError::NotFound { .. }) => {}
        other => panic!("Expected a not-found error, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    #[test]
    fn test_money_eq_ignores_scale() {
        assert_money_eq(
            &Money::new(dec!(400), Currency::INR),
            &Money::new(dec!(400.00), Currency::INR),
        );
    }

    #[test]
    #[should_panic(expected = "Currency mismatch")]
    fn test_money_eq_checks_currency() {
        assert_money_eq(
            &Money::new(dec!(1), Currency::INR),
            &Money::new(dec!(1), Currency::USD),
        );
    }

    #[test]
    fn test_bill_number_format() {
        assert_bill_number("BILL2024060012", YearMonth::new(2024, 6).unwrap(), 12);
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn test_duplicate_codes_detected() {
        assert_all_unique(["PAT00001", "PAT00002", "PAT00001"]);
    }
}
