//! Billing Domain - Lab bill computation and code assignment
//!
//! Turns requested tests and packages into priced line items, folds them into
//! bill totals, tracks payment status, and assigns sequential human-facing
//! codes.
//!
//! # Flow
//!
//! 1. A handler validates a [`CreateBillRequest`] into a [`CreateBillCommand`]
//! 2. The [`LineItemPricer`] resolves each line against the tenant's catalog
//! 3. [`aggregate`] computes subtotal, tax, round-off and total
//! 4. The bill number is reserved and the bill stored in one unit of work
//! 5. Later payment updates only re-run the payment state machine
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingService, BillingPolicy, CreateBillCommand, RequestedLine};
//!
//! let service = BillingService::from_store(store, BillingPolicy::default());
//! let command = CreateBillCommand::new(tenant, patient, vec![RequestedLine::test(cbc, 1)], service.policy());
//! let bill = service.create_bill(command).await?;
//! assert!(bill.bill_number.starts_with("BILL"));
//! ```

pub mod adapters;
pub mod bill;
pub mod catalog;
pub mod clock;
pub mod command;
pub mod error;
pub mod line_item;
pub mod payment;
pub mod ports;
pub mod pricing;
pub mod reporting;
pub mod sequence;
pub mod service;
pub mod totals;

pub use bill::{Bill, BillDraft, PatientSnapshot};
pub use catalog::{CatalogPackage, CatalogTest, Gender, PatientRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{
    CreateBillCommand, CreateBillRequest, ItemDiscount, PriceAdjustment, RequestedItem,
    RequestedLine, UpdatePaymentCommand, UpdatePaymentRequest,
};
pub use error::BillingError;
pub use line_item::{DiscountType, ItemType, LineItem, PackageTestSnapshot};
pub use payment::{balance_due, PaymentDetails, PaymentMode, PaymentStatus};
pub use ports::{BillPort, BillQuery, BillingStore, CatalogPort, PatientPort, SequencePort};
pub use pricing::{price_package, price_test, LineItemPricer};
pub use reporting::{monthly_revenue, BillingStats, MonthlyRevenue};
pub use sequence::{CodeKind, SequenceKey, SequenceScope, YearMonth};
pub use service::{BillingPolicy, BillingService};
pub use totals::{aggregate, BillTotals};
