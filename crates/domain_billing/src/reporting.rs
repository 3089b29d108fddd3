//! Dashboard figures over a tenant's bills

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money};

use crate::bill::Bill;
use crate::payment::PaymentStatus;

/// Headline counts and revenue for a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStats {
    pub total_bills: u64,
    pub today_bills: u64,
    pub month_bills: u64,
    pub year_bills: u64,
    pub total_revenue: Money,
    pub today_revenue: Money,
    pub month_revenue: Money,
    pub year_revenue: Money,
    pub pending_bills: u64,
    pub partial_bills: u64,
    pub paid_bills: u64,
}

impl BillingStats {
    pub fn empty(currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            total_bills: 0,
            today_bills: 0,
            month_bills: 0,
            year_bills: 0,
            total_revenue: zero,
            today_revenue: zero,
            month_revenue: zero,
            year_revenue: zero,
            pending_bills: 0,
            partial_bills: 0,
            paid_bills: 0,
        }
    }

    /// Computes the figures relative to `today`
    ///
    /// Only active bills are counted; cancelled bills contribute nothing.
    /// Bills in a currency other than `currency` are skipped.
    pub fn compute(bills: &[Bill], today: NaiveDate, currency: Currency) -> Self {
        let mut stats = Self::empty(currency);

        for bill in bills
            .iter()
            .filter(|bill| bill.is_active && !bill.is_cancelled())
            .filter(|bill| bill.total_amount.currency() == currency)
        {
            let date = bill.billing_date.date_naive();
            let revenue = bill.total_amount;

            stats.total_bills += 1;
            stats.total_revenue = stats.total_revenue + revenue;

            if date.year() == today.year() {
                stats.year_bills += 1;
                stats.year_revenue = stats.year_revenue + revenue;

                if date.month() == today.month() {
                    stats.month_bills += 1;
                    stats.month_revenue = stats.month_revenue + revenue;

                    if date == today {
                        stats.today_bills += 1;
                        stats.today_revenue = stats.today_revenue + revenue;
                    }
                }
            }

            match bill.payment_status {
                PaymentStatus::Pending => stats.pending_bills += 1,
                PaymentStatus::Partial => stats.partial_bills += 1,
                PaymentStatus::Paid => stats.paid_bills += 1,
                PaymentStatus::Cancelled => {}
            }
        }

        stats
    }
}

/// Revenue booked in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub month: u32,
    pub revenue: Money,
    pub count: u64,
}

/// Twelve rows for `year`, January first; months without bills are zero
pub fn monthly_revenue(bills: &[Bill], year: i32, currency: Currency) -> Vec<MonthlyRevenue> {
    let mut rows: Vec<MonthlyRevenue> = (1..=12)
        .map(|month| MonthlyRevenue {
            month,
            revenue: Money::zero(currency),
            count: 0,
        })
        .collect();

    for bill in bills
        .iter()
        .filter(|bill| bill.is_active && !bill.is_cancelled())
        .filter(|bill| bill.total_amount.currency() == currency)
    {
        let date = bill.billing_date.date_naive();
        if date.year() != year {
            continue;
        }
        let row = &mut rows[date.month0() as usize];
        row.revenue = row.revenue + bill.total_amount;
        row.count += 1;
    }

    rows
}
