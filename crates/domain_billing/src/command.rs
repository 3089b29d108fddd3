//! Request validation and typed commands
//!
//! Handlers deserialise the loosely-typed request bodies below, call
//! `into_command`, and hand the resulting command to
//! [`BillingService`](crate::service::BillingService). Everything past this
//! point works on validated, currency-tagged values.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use core_kernel::{Currency, Money, PackageId, PatientId, Percentage, TenantId, TestId, UserId};

use crate::error::BillingError;
use crate::line_item::{DiscountType, ItemType};
use crate::payment::{PaymentDetails, PaymentMode, PaymentStatus};
use crate::service::BillingPolicy;

fn non_negative_amount(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.message = Some("Amount cannot be negative".into());
        return Err(error);
    }
    Ok(())
}

fn percentage_bounds(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > dec!(100) {
        let mut error = ValidationError::new("percentage");
        error.message = Some("Percentage must be between 0 and 100".into());
        return Err(error);
    }
    Ok(())
}

fn default_quantity() -> u32 {
    1
}

/// One requested entry in a create-bill body
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestedItem {
    pub item_type: ItemType,
    pub item_ref: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    /// Caller-asserted per-unit price after discount
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub final_price: Option<Decimal>,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub discount_value: Option<Decimal>,
}

/// Create-bill body as received from a handler
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRequest {
    pub patient_id: PatientId,
    #[validate(length(min = 1, message = "At least one item is required"), nested)]
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub discount: Option<Decimal>,
    #[serde(default)]
    #[validate(custom(function = "percentage_bounds"))]
    pub tax_percentage: Option<Decimal>,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub amount_paid: Option<Decimal>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Doctor name is too long"))]
    pub doctor_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Referrer is too long"))]
    pub referred_by: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

impl CreateBillRequest {
    /// Validates the body and converts it into a typed command
    pub fn into_command(
        self,
        tenant_id: TenantId,
        policy: &BillingPolicy,
    ) -> Result<CreateBillCommand, BillingError> {
        self.validate()?;

        let currency = policy.currency;
        let lines = self
            .items
            .into_iter()
            .map(|item| item.into_line(currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CreateBillCommand {
            tenant_id,
            patient_id: self.patient_id,
            created_by: None,
            lines,
            discount: Money::new(self.discount.unwrap_or_default(), currency),
            tax_percentage: self
                .tax_percentage
                .map(Percentage::new)
                .unwrap_or(policy.default_tax_percentage),
            payment_mode: self.payment_mode,
            amount_paid: Money::new(self.amount_paid.unwrap_or_default(), currency),
            payment_details: self.payment_details.unwrap_or_default(),
            doctor_name: self.doctor_name,
            referred_by: self.referred_by,
            notes: self.notes,
        })
    }
}

impl RequestedItem {
    fn into_line(self, currency: Currency) -> Result<RequestedLine, BillingError> {
        let discount = match (self.discount_type, self.discount_value) {
            (DiscountType::None, None) => None,
            (DiscountType::None, Some(value)) if value.is_zero() => None,
            (DiscountType::None, Some(_)) => {
                return Err(BillingError::validation(
                    "Discount value supplied without a discount type",
                ))
            }
            (_, None) => {
                return Err(BillingError::validation(
                    "Discount type supplied without a discount value",
                ))
            }
            (DiscountType::Fixed, Some(value)) => {
                Some(ItemDiscount::Fixed(Money::new(value, currency)))
            }
            (DiscountType::Percentage, Some(value)) => {
                percentage_bounds(&value)
                    .map_err(|_| BillingError::validation("Discount percentage must be between 0 and 100"))?;
                Some(ItemDiscount::Percentage(Percentage::new(value)))
            }
        };

        let adjustment = match (self.final_price, discount) {
            (Some(_), Some(_)) => {
                return Err(BillingError::validation(
                    "Supply either a final price or a discount, not both",
                ))
            }
            (Some(price), None) => PriceAdjustment::FinalPrice(Money::new(price, currency)),
            (None, Some(discount)) => PriceAdjustment::Discount(discount),
            (None, None) => PriceAdjustment::None,
        };

        Ok(RequestedLine {
            item_type: self.item_type,
            item_ref: self.item_ref,
            quantity: self.quantity,
            adjustment,
        })
    }
}

/// Per-unit discount a caller asked for on a test line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemDiscount {
    Fixed(Money),
    Percentage(Percentage),
}

/// Caller override applied on top of catalog pricing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PriceAdjustment {
    #[default]
    None,
    FinalPrice(Money),
    Discount(ItemDiscount),
}

/// A validated line request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedLine {
    pub item_type: ItemType,
    pub item_ref: Uuid,
    pub quantity: u32,
    pub adjustment: PriceAdjustment,
}

impl RequestedLine {
    pub fn test(test_id: TestId, quantity: u32) -> Self {
        Self {
            item_type: ItemType::Test,
            item_ref: *test_id.as_uuid(),
            quantity,
            adjustment: PriceAdjustment::None,
        }
    }

    pub fn package(package_id: PackageId, quantity: u32) -> Self {
        Self {
            item_type: ItemType::Package,
            item_ref: *package_id.as_uuid(),
            quantity,
            adjustment: PriceAdjustment::None,
        }
    }

    pub fn with_final_price(mut self, price: Money) -> Self {
        self.adjustment = PriceAdjustment::FinalPrice(price);
        self
    }

    pub fn with_discount(mut self, discount: ItemDiscount) -> Self {
        self.adjustment = PriceAdjustment::Discount(discount);
        self
    }
}

/// Typed input for `create_bill`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBillCommand {
    pub tenant_id: TenantId,
    pub patient_id: PatientId,
    pub created_by: Option<UserId>,
    pub lines: Vec<RequestedLine>,
    pub discount: Money,
    pub tax_percentage: Percentage,
    pub payment_mode: PaymentMode,
    pub amount_paid: Money,
    pub payment_details: PaymentDetails,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
    pub notes: Option<String>,
}

impl CreateBillCommand {
    /// Minimal command: no discounts, nothing paid, the policy's default tax
    pub fn new(
        tenant_id: TenantId,
        patient_id: PatientId,
        lines: Vec<RequestedLine>,
        policy: &BillingPolicy,
    ) -> Self {
        Self {
            tenant_id,
            patient_id,
            created_by: None,
            lines,
            discount: Money::zero(policy.currency),
            tax_percentage: policy.default_tax_percentage,
            payment_mode: PaymentMode::default(),
            amount_paid: Money::zero(policy.currency),
            payment_details: PaymentDetails::default(),
            doctor_name: None,
            referred_by: None,
            notes: None,
        }
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }
}

/// Update-payment body as received from a handler
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    #[serde(default)]
    #[validate(custom(function = "non_negative_amount"))]
    pub amount_paid: Option<Decimal>,
    #[serde(default)]
    pub payment_mode: Option<PaymentMode>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
}

impl UpdatePaymentRequest {
    pub fn into_command(self, currency: Currency) -> Result<UpdatePaymentCommand, BillingError> {
        self.validate()?;

        if self.payment_status == Some(PaymentStatus::Cancelled) {
            return Err(BillingError::validation(
                "Bills are cancelled through cancel_bill, not a payment update",
            ));
        }

        Ok(UpdatePaymentCommand {
            amount_paid: self.amount_paid.map(|amount| Money::new(amount, currency)),
            payment_mode: self.payment_mode,
            explicit_status: self.payment_status,
            payment_details: self.payment_details,
        })
    }
}

/// Typed input for `update_payment`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdatePaymentCommand {
    pub amount_paid: Option<Money>,
    pub payment_mode: Option<PaymentMode>,
    pub explicit_status: Option<PaymentStatus>,
    pub payment_details: Option<PaymentDetails>,
}

impl UpdatePaymentCommand {
    pub fn paid(amount: Money) -> Self {
        Self {
            amount_paid: Some(amount),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: PaymentMode) -> Self {
        self.payment_mode = Some(mode);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.explicit_status = Some(status);
        self
    }

    pub fn with_details(mut self, details: PaymentDetails) -> Self {
        self.payment_details = Some(details);
        self
    }

    /// Whether the payment state machine has to re-run
    pub fn touches_status(&self) -> bool {
        self.amount_paid.is_some() || self.explicit_status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<RequestedItem>) -> CreateBillRequest {
        CreateBillRequest {
            patient_id: PatientId::new(),
            items,
            discount: None,
            tax_percentage: None,
            payment_mode: PaymentMode::Cash,
            amount_paid: None,
            payment_details: None,
            doctor_name: None,
            referred_by: None,
            notes: None,
        }
    }

    fn item(quantity: u32) -> RequestedItem {
        RequestedItem {
            item_type: ItemType::Test,
            item_ref: Uuid::new_v4(),
            quantity,
            final_price: None,
            discount_type: DiscountType::None,
            discount_value: None,
        }
    }

    #[test]
    fn test_empty_items_rejected() {
        let result = request(vec![]).into_command(TenantId::new(), &BillingPolicy::default());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let result = request(vec![item(0)]).into_command(TenantId::new(), &BillingPolicy::default());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_negative_discount_rejected() {
        let mut body = request(vec![item(1)]);
        body.discount = Some(dec!(-5));
        let result = body.into_command(TenantId::new(), &BillingPolicy::default());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_default_tax_applied() {
        let command = request(vec![item(2)])
            .into_command(TenantId::new(), &BillingPolicy::default())
            .unwrap();
        assert_eq!(command.tax_percentage.value(), dec!(18));
        assert_eq!(command.lines[0].quantity, 2);
        assert!(command.amount_paid.is_zero());
    }

    #[test]
    fn test_final_price_and_discount_conflict() {
        let mut line = item(1);
        line.final_price = Some(dec!(300));
        line.discount_type = DiscountType::Fixed;
        line.discount_value = Some(dec!(50));
        let result = request(vec![line]).into_command(TenantId::new(), &BillingPolicy::default());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_percentage_discount_over_hundred_rejected() {
        let mut line = item(1);
        line.discount_type = DiscountType::Percentage;
        line.discount_value = Some(dec!(120));
        let result = request(vec![line]).into_command(TenantId::new(), &BillingPolicy::default());
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_quantity_defaults_to_one() {
        let json = serde_json::json!({
            "itemType": "Test",
            "itemRef": Uuid::new_v4(),
        });
        let item: RequestedItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.discount_type, DiscountType::None);
    }

    #[test]
    fn test_cancelled_status_rejected_on_payment_update() {
        let body = UpdatePaymentRequest {
            payment_status: Some(PaymentStatus::Cancelled),
            ..Default::default()
        };
        assert!(matches!(
            body.into_command(Currency::INR),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn test_payment_command_touches_status() {
        let mode_only = UpdatePaymentRequest {
            payment_mode: Some(PaymentMode::Upi),
            ..Default::default()
        }
        .into_command(Currency::INR)
        .unwrap();
        assert!(!mode_only.touches_status());
        assert!(UpdatePaymentCommand::paid(Money::zero(Currency::INR)).touches_status());
    }
}
