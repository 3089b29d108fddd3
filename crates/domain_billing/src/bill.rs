//! Bills and their lifecycle
//!
//! A bill is created once from a [`BillDraft`] when its number is assigned.
//! After that only payment fields change, through [`Bill::apply_payment`],
//! or the bill is cancelled through [`Bill::cancel`]. Bills are never
//! deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, Money, PatientId, Percentage, TenantId, UserId};

use crate::catalog::{Gender, PatientRecord};
use crate::command::{CreateBillCommand, UpdatePaymentCommand};
use crate::error::BillingError;
use crate::line_item::LineItem;
use crate::payment::{balance_due, PaymentDetails, PaymentMode, PaymentStatus};
use crate::totals::BillTotals;

/// Patient fields copied onto the bill at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub phone: String,
}

impl From<&PatientRecord> for PatientSnapshot {
    fn from(patient: &PatientRecord) -> Self {
        Self {
            name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender,
            phone: patient.phone.clone(),
        }
    }
}

/// A fully priced bill waiting for its number
#[derive(Debug, Clone, PartialEq)]
pub struct BillDraft {
    pub id: BillId,
    pub tenant_id: TenantId,
    pub patient_id: PatientId,
    pub patient: PatientSnapshot,
    pub items: Vec<LineItem>,
    pub totals: BillTotals,
    pub amount_paid: Money,
    pub payment_status: PaymentStatus,
    pub payment_mode: PaymentMode,
    pub payment_details: PaymentDetails,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub billing_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BillDraft {
    /// Assembles a draft from a command, the patient, and the priced totals
    ///
    /// The bill is dated `now`. The initial payment status is derived from the total and whatever was
    /// paid up front. Doctor and referrer fall back to the patient's record.
    pub fn new(
        command: &CreateBillCommand,
        patient: &PatientRecord,
        items: Vec<LineItem>,
        totals: BillTotals,
        now: DateTime<Utc>,
    ) -> Result<Self, BillingError> {
        if command.amount_paid.is_negative() {
            return Err(BillingError::validation("Amount paid cannot be negative"));
        }
        let amount_paid = Money::zero(totals.total_amount.currency()).checked_add(&command.amount_paid)?;

        Ok(Self {
            id: BillId::new_v7(),
            tenant_id: command.tenant_id,
            patient_id: command.patient_id,
            patient: PatientSnapshot::from(patient),
            items,
            payment_status: PaymentStatus::derive(&totals.total_amount, &amount_paid),
            totals,
            amount_paid,
            payment_mode: command.payment_mode,
            payment_details: command.payment_details.clone(),
            doctor_name: command.doctor_name.clone().or_else(|| patient.doctor_name.clone()),
            referred_by: command.referred_by.clone().or_else(|| patient.referred_by.clone()),
            notes: command.notes.clone(),
            created_by: command.created_by,
            billing_date: now,
            created_at: now,
        })
    }

    /// Freezes the draft under its assigned number
    pub fn into_bill(self, bill_number: String) -> Bill {
        Bill {
            id: self.id,
            bill_number,
            tenant_id: self.tenant_id,
            patient_id: self.patient_id,
            patient: self.patient,
            items: self.items,
            subtotal: self.totals.subtotal,
            discount: self.totals.discount,
            tax_percentage: self.totals.tax_percentage,
            tax_amount: self.totals.tax_amount,
            round_off: self.totals.round_off,
            total_amount: self.totals.total_amount,
            balance_due: balance_due(&self.totals.total_amount, &self.amount_paid),
            amount_paid: self.amount_paid,
            payment_status: self.payment_status,
            payment_mode: self.payment_mode,
            payment_details: self.payment_details,
            doctor_name: self.doctor_name,
            referred_by: self.referred_by,
            notes: self.notes,
            created_by: self.created_by,
            billing_date: self.billing_date,
            created_at: self.created_at,
            updated_at: self.created_at,
            is_active: true,
            version: 1,
        }
    }
}

/// A persisted bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: BillId,
    /// Sequential number such as `BILL2024060012`; immutable
    pub bill_number: String,
    pub tenant_id: TenantId,
    pub patient_id: PatientId,
    pub patient: PatientSnapshot,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub tax_percentage: Percentage,
    pub tax_amount: Money,
    pub round_off: Money,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub balance_due: Money,
    pub payment_status: PaymentStatus,
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub billing_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    /// Optimistic lock; bumped by every stored update
    pub version: u64,
}

impl Bill {
    pub fn totals(&self) -> BillTotals {
        BillTotals {
            subtotal: self.subtotal,
            discount: self.discount,
            tax_percentage: self.tax_percentage,
            tax_amount: self.tax_amount,
            round_off: self.round_off,
            total_amount: self.total_amount,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.payment_status == PaymentStatus::Cancelled
    }

    /// Applies a payment update
    ///
    /// Mode and details change freely. The status is recomputed only when an
    /// amount or an explicit status is supplied; an explicit status wins over
    /// the derived one.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the bill is cancelled, `Validation` for a negative
    /// amount or an explicit `Cancelled` status.
    pub fn apply_payment(
        &mut self,
        update: &UpdatePaymentCommand,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if self.is_cancelled() {
            return Err(BillingError::invalid_state(format!(
                "Bill {} is cancelled and cannot accept payments",
                self.bill_number
            )));
        }
        if update.explicit_status == Some(PaymentStatus::Cancelled) {
            return Err(BillingError::validation(
                "Use bill cancellation to cancel a bill",
            ));
        }

        if let Some(amount) = update.amount_paid {
            if amount.is_negative() {
                return Err(BillingError::validation("Amount paid cannot be negative"));
            }
            self.amount_paid = Money::zero(self.total_amount.currency()).checked_add(&amount)?;
            self.balance_due = balance_due(&self.total_amount, &self.amount_paid);
        }

        if update.touches_status() {
            self.payment_status = update
                .explicit_status
                .unwrap_or_else(|| PaymentStatus::derive(&self.total_amount, &self.amount_paid));
        }

        if let Some(mode) = update.payment_mode {
            self.payment_mode = mode;
        }
        if let Some(details) = &update.payment_details {
            self.payment_details.merge(details.clone());
        }

        self.updated_at = now;
        Ok(())
    }

    /// Cancels the bill; terminal
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.is_cancelled() {
            return Err(BillingError::AlreadyCancelled(self.id));
        }
        self.payment_status = PaymentStatus::Cancelled;
        self.is_active = false;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::totals::aggregate;
    use crate::line_item::{DiscountType, ItemType};
    use core_kernel::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn inr(amount: Decimal) -> Money {
        Money::new(amount, Currency::INR)
    }

    fn patient(tenant: TenantId) -> PatientRecord {
        PatientRecord {
            id: PatientId::new(),
            tenant_id: tenant,
            name: "Asha Rao".to_string(),
            age: 34,
            gender: Gender::Female,
            phone: "9876543210".to_string(),
            doctor_name: Some("Dr. Mehta".to_string()),
            referred_by: None,
        }
    }

    fn bill_for(total: Decimal) -> Bill {
        let tenant = TenantId::new();
        let patient = patient(tenant);
        let item = LineItem {
            item_type: ItemType::Test,
            item_ref: Uuid::new_v4(),
            name: "Thyroid Profile".to_string(),
            code: "TEST0011".to_string(),
            quantity: 1,
            unit_price: inr(total),
            discount_type: DiscountType::None,
            discount_value: Decimal::ZERO,
            discount_amount: inr(Decimal::ZERO),
            final_price: inr(total),
            is_package: false,
            package_breakdown: vec![],
        };
        let totals = aggregate(std::slice::from_ref(&item), inr(dec!(0)), Percentage::zero()).unwrap();
        let command = CreateBillCommand::new(
            tenant,
            patient.id,
            vec![],
            &crate::service::BillingPolicy::default(),
        );
        BillDraft::new(&command, &patient, vec![item], totals, Utc::now())
            .unwrap()
            .into_bill("BILL2024060001".to_string())
    }

    #[test]
    fn test_new_bill_defaults() {
        let bill = bill_for(dec!(1000));
        assert_eq!(bill.payment_status, PaymentStatus::Pending);
        assert_eq!(bill.balance_due.amount(), dec!(1000));
        assert_eq!(bill.version, 1);
        assert!(bill.is_active);
        assert_eq!(bill.doctor_name.as_deref(), Some("Dr. Mehta"));
    }

    #[test]
    fn test_payment_transitions() {
        let mut bill = bill_for(dec!(1000));

        bill.apply_payment(&UpdatePaymentCommand::paid(inr(dec!(400))), Utc::now()).unwrap();
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
        assert_eq!(bill.balance_due.amount(), dec!(600));

        bill.apply_payment(&UpdatePaymentCommand::paid(inr(dec!(1500))), Utc::now()).unwrap();
        assert_eq!(bill.payment_status, PaymentStatus::Paid);
        assert!(bill.balance_due.is_zero());
    }

    #[test]
    fn test_explicit_status_overrides_derivation() {
        let mut bill = bill_for(dec!(1000));
        let update = UpdatePaymentCommand::paid(inr(dec!(400))).with_status(PaymentStatus::Paid);
        bill.apply_payment(&update, Utc::now()).unwrap();
        assert_eq!(bill.payment_status, PaymentStatus::Paid);
        assert_eq!(bill.balance_due.amount(), dec!(600));
    }

    #[test]
    fn test_mode_only_update_keeps_status() {
        let mut bill = bill_for(dec!(1000));
        bill.apply_payment(&UpdatePaymentCommand::paid(inr(dec!(400))), Utc::now()).unwrap();

        let update = UpdatePaymentCommand::default().with_mode(PaymentMode::Card);
        bill.apply_payment(&update, Utc::now()).unwrap();
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
        assert_eq!(bill.payment_mode, PaymentMode::Card);
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut bill = bill_for(dec!(1000));
        bill.cancel(Utc::now()).unwrap();
        assert!(!bill.is_active);
        assert_eq!(bill.payment_status, PaymentStatus::Cancelled);

        assert!(matches!(bill.cancel(Utc::now()), Err(BillingError::AlreadyCancelled(_))));
        assert!(matches!(
            bill.apply_payment(&UpdatePaymentCommand::paid(inr(dec!(1000))), Utc::now()),
            Err(BillingError::InvalidState(_))
        ));
    }

    #[test]
    fn test_negative_payment_rejected() {
        let mut bill = bill_for(dec!(1000));
        let result = bill.apply_payment(&UpdatePaymentCommand::paid(inr(dec!(-1))), Utc::now());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_persisted_shape_is_camel_case() {
        let json = serde_json::to_value(bill_for(dec!(250))).unwrap();
        assert_eq!(json["billNumber"], "BILL2024060001");
        assert_eq!(json["paymentStatus"], "Pending");
        assert!(json["items"].is_array());
        assert!(json.get("taxPercentage").is_some());
    }
}
