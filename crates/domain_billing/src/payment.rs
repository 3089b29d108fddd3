//! Payment status, modes, and the balance rules
//!
//! Status flows `Pending → Partial → Paid`; `Cancelled` is terminal and is
//! reachable from any other state. Outside of cancellation the status is a
//! pure function of the bill total and the amount paid, unless a caller
//! asserts a status explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::Money;

/// Payment status of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Nothing paid yet
    #[default]
    Pending,
    /// Some but not all of the total paid
    Partial,
    /// Total covered (overpayment included)
    Paid,
    /// Voided; no further changes accepted
    Cancelled,
}

impl PaymentStatus {
    /// Derives the status from what is owed and what was paid
    ///
    /// `paid >= total` is `Paid` (a zero-total bill is therefore paid),
    /// any positive shortfall is `Partial`, nothing paid is `Pending`.
    pub fn derive(total: &Money, paid: &Money) -> PaymentStatus {
        if paid.amount() >= total.amount() {
            PaymentStatus::Paid
        } else if paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    /// Returns true when no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Cancelled)
    }

    /// Stored label
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Partial => "Partial",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the patient paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMode {
    #[default]
    Cash,
    Card,
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "Net Banking")]
    NetBanking,
    Cheque,
    Insurance,
    Multiple,
}

impl PaymentMode {
    /// Stored label
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Card => "Card",
            PaymentMode::Upi => "UPI",
            PaymentMode::NetBanking => "Net Banking",
            PaymentMode::Cheque => "Cheque",
            PaymentMode::Insurance => "Insurance",
            PaymentMode::Multiple => "Multiple",
        }
    }
}

/// Reference details captured for non-cash payments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheque_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

impl PaymentDetails {
    /// Overlays the fields present in `update`, keeping the rest
    pub fn merge(&mut self, update: PaymentDetails) {
        if update.transaction_id.is_some() {
            self.transaction_id = update.transaction_id;
        }
        if update.cheque_number.is_some() {
            self.cheque_number = update.cheque_number;
        }
        if update.bank_name.is_some() {
            self.bank_name = update.bank_name;
        }
        if update.upi_id.is_some() {
            self.upi_id = update.upi_id;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_id.is_none()
            && self.cheque_number.is_none()
            && self.bank_name.is_none()
            && self.upi_id.is_none()
    }
}

/// Outstanding balance, floored at zero
pub fn balance_due(total: &Money, paid: &Money) -> Money {
    (*total - *paid).non_negative()
}
