//! Bill aggregation
//!
//! Folds priced line items into bill totals:
//!
//! ```text
//! subtotal  = Σ final_price × quantity
//! tax       = subtotal × tax% / 100        (unrounded)
//! pre_round = subtotal + tax − discount
//! total     = round(pre_round)             (whole units, half away from zero)
//! round_off = total − pre_round
//! ```
//!
//! Tax is charged on the subtotal and the bill-level discount comes off after
//! tax.

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, Percentage};

use crate::error::BillingError;
use crate::line_item::LineItem;

/// Computed totals of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax_percentage: Percentage,
    pub tax_amount: Money,
    pub round_off: Money,
    pub total_amount: Money,
}

impl BillTotals {
    /// The amount before rounding
    pub fn pre_round(&self) -> Money {
        self.subtotal + self.tax_amount - self.discount
    }
}

/// Aggregates line items into totals
///
/// # Errors
///
/// `Validation` for an empty item list, an item that breaks its own
/// invariants, a negative discount or tax percentage, or a discount larger
/// than `subtotal + tax`. `Money` when items carry mixed currencies.
pub fn aggregate(
    items: &[LineItem],
    discount: Money,
    tax_percentage: Percentage,
) -> Result<BillTotals, BillingError> {
    let first = items
        .first()
        .ok_or_else(|| BillingError::validation("A bill needs at least one item"))?;
    let currency: Currency = first.final_price.currency();

    if discount.is_negative() {
        return Err(BillingError::validation("Bill discount cannot be negative"));
    }
    if tax_percentage.is_negative() {
        return Err(BillingError::validation("Tax percentage cannot be negative"));
    }

    let mut subtotal = Money::zero(currency);
    for item in items {
        item.validate()?;
        subtotal = subtotal.checked_add(&item.line_total())?;
    }

    let tax_amount = tax_percentage.of(&subtotal);
    let gross = subtotal.checked_add(&tax_amount)?;
    if discount.amount() > gross.amount() {
        return Err(BillingError::validation(format!(
            "Bill discount {} exceeds the amount due {}",
            discount, gross
        )));
    }

    let pre_round = gross.checked_sub(&discount)?;
    let total_amount = pre_round.round_half_up(0);
    let round_off = total_amount.checked_sub(&pre_round)?;

    Ok(BillTotals {
        subtotal,
        discount,
        tax_percentage,
        tax_amount,
        round_off,
        total_amount,
    })
}
