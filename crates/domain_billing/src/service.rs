//! Billing service
//!
//! The entry points request handlers call: `create_bill`, `update_payment`,
//! `cancel_bill`, `get_bill`, `next_code`, plus the dashboard reports.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tracing::{debug, info, instrument, warn};

use core_kernel::{BillId, Currency, Percentage, PortError, TenantId};

use crate::bill::{Bill, BillDraft};
use crate::clock::{Clock, SystemClock};
use crate::command::{CreateBillCommand, UpdatePaymentCommand};
use crate::error::BillingError;
use crate::ports::{BillPort, BillQuery, BillingStore, CatalogPort, PatientPort, SequencePort};
use crate::pricing::LineItemPricer;
use crate::reporting::{self, BillingStats, MonthlyRevenue};
use crate::sequence::{CodeKind, SequenceKey, SequenceScope, YearMonth};
use crate::totals::aggregate;

/// Tunables of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    /// Currency all amounts are billed in
    pub currency: Currency,
    /// Applied when a create request carries no tax percentage
    pub default_tax_percentage: Percentage,
    /// Attempts at assigning a sequence number before giving up
    pub sequence_max_attempts: u32,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::INR,
            default_tax_percentage: Percentage::new(dec!(18)),
            sequence_max_attempts: 3,
        }
    }
}

/// Orchestrates pricing, aggregation, numbering and payment updates
#[derive(Clone)]
pub struct BillingService {
    patients: Arc<dyn PatientPort>,
    sequences: Arc<dyn SequencePort>,
    bills: Arc<dyn BillPort>,
    pricer: LineItemPricer,
    policy: BillingPolicy,
    clock: Arc<dyn Clock>,
}

impl BillingService {
    pub fn new(
        catalog: Arc<dyn CatalogPort>,
        patients: Arc<dyn PatientPort>,
        sequences: Arc<dyn SequencePort>,
        bills: Arc<dyn BillPort>,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            patients,
            sequences,
            bills,
            pricer: LineItemPricer::new(catalog),
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the wall clock used to date and number bills
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wires every port to a single store
    pub fn from_store<S: BillingStore>(store: Arc<S>, policy: BillingPolicy) -> Self {
        Self::new(store.clone(), store.clone(), store.clone(), store, policy)
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    fn attempts(&self) -> u32 {
        self.policy.sequence_max_attempts.max(1)
    }

    /// Prices, totals, numbers and stores a new bill
    ///
    /// The bill is dated by the service clock and numbered in that instant's
    /// calendar month.
    ///
    /// Catalog and patient lookups happen first and are never retried. The
    /// number reservation and insert are one unit of work in the store and
    /// are retried on a number collision, up to the policy's attempt limit.
    #[instrument(
        skip(self, command),
        fields(tenant_id = %command.tenant_id, patient_id = %command.patient_id, items = command.lines.len())
    )]
    pub async fn create_bill(&self, command: CreateBillCommand) -> Result<Bill, BillingError> {
        if command.lines.is_empty() {
            return Err(BillingError::validation("A bill needs at least one item"));
        }

        let patient = self
            .patients
            .find_patient(command.patient_id, command.tenant_id)
            .await?
            .filter(|patient| patient.tenant_id == command.tenant_id)
            .ok_or_else(|| BillingError::not_found("Patient", command.patient_id))?;

        let items = self.pricer.price_all(command.tenant_id, &command.lines).await?;
        let totals = aggregate(&items, command.discount, command.tax_percentage)?;
        debug!(
            subtotal = %totals.subtotal,
            tax = %totals.tax_amount,
            total = %totals.total_amount,
            "Bill priced"
        );

        let now = self.clock.now();
        let draft = BillDraft::new(&command, &patient, items, totals, now)?;
        let key = SequenceKey::new(CodeKind::Bill, SequenceScope::monthly(YearMonth::of_instant(now)))?;

        let attempts = self.attempts();
        let mut last_conflict = String::new();
        for attempt in 1..=attempts {
            match self.bills.insert_numbered(&key, draft.clone()).await {
                Ok(bill) => {
                    info!(
                        bill_id = %bill.id,
                        bill_number = %bill.bill_number,
                        total = %bill.total_amount,
                        status = %bill.payment_status,
                        "Bill created"
                    );
                    return Ok(bill);
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, max_attempts = attempts, %message, "Bill number collision, retrying");
                    last_conflict = message;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(BillingError::concurrency(format!(
            "Could not assign a bill number after {} attempts: {}",
            attempts, last_conflict
        )))
    }

    /// Records a payment against a bill
    ///
    /// A concurrent update of the same bill surfaces as `Concurrency`; the
    /// caller reloads and resubmits.
    #[instrument(skip(self, update), fields(bill_id = %bill_id, tenant_id = %tenant))]
    pub async fn update_payment(
        &self,
        bill_id: BillId,
        tenant: TenantId,
        update: UpdatePaymentCommand,
    ) -> Result<Bill, BillingError> {
        let mut bill = self.load(bill_id, tenant).await?;
        let expected_version = bill.version;

        bill.apply_payment(&update, self.clock.now())?;
        let stored = self.bills.update_bill(&bill, expected_version).await?;

        info!(
            bill_number = %stored.bill_number,
            amount_paid = %stored.amount_paid,
            balance_due = %stored.balance_due,
            status = %stored.payment_status,
            "Payment updated"
        );
        Ok(stored)
    }

    /// Cancels a bill; cancelling twice fails with `AlreadyCancelled`
    #[instrument(skip(self), fields(bill_id = %bill_id, tenant_id = %tenant))]
    pub async fn cancel_bill(&self, bill_id: BillId, tenant: TenantId) -> Result<Bill, BillingError> {
        let mut bill = self.load(bill_id, tenant).await?;
        let expected_version = bill.version;

        bill.cancel(self.clock.now())?;
        let stored = self.bills.update_bill(&bill, expected_version).await?;

        info!(bill_number = %stored.bill_number, "Bill cancelled");
        Ok(stored)
    }

    #[instrument(skip(self), fields(bill_id = %bill_id, tenant_id = %tenant))]
    pub async fn get_bill(&self, bill_id: BillId, tenant: TenantId) -> Result<Bill, BillingError> {
        self.load(bill_id, tenant).await
    }

    async fn load(&self, bill_id: BillId, tenant: TenantId) -> Result<Bill, BillingError> {
        self.bills
            .find_bill(bill_id, tenant)
            .await?
            .filter(|bill| bill.tenant_id == tenant)
            .ok_or_else(|| BillingError::not_found("Bill", bill_id))
    }

    /// Reserves and renders the next code of a kind
    #[instrument(skip(self), fields(kind = ?kind))]
    pub async fn next_code(&self, kind: CodeKind, scope: SequenceScope) -> Result<String, BillingError> {
        let key = SequenceKey::new(kind, scope)?;

        let attempts = self.attempts();
        let mut last_conflict = String::new();
        for attempt in 1..=attempts {
            match self.sequences.reserve(&key).await {
                Ok(ordinal) => {
                    let code = key.render(ordinal);
                    debug!(%code, "Code assigned");
                    return Ok(code);
                }
                Err(PortError::Conflict { message }) => {
                    warn!(attempt, max_attempts = attempts, %message, "Sequence conflict, retrying");
                    last_conflict = message;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(BillingError::concurrency(format!(
            "Could not reserve a {:?} code after {} attempts: {}",
            kind, attempts, last_conflict
        )))
    }

    /// Dashboard counts and revenue relative to `today`
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn dashboard_stats(
        &self,
        tenant: TenantId,
        today: NaiveDate,
    ) -> Result<BillingStats, BillingError> {
        let bills = self.bills.list_bills(tenant, BillQuery::default()).await?;
        Ok(BillingStats::compute(&bills, today, self.policy.currency))
    }

    /// Revenue per month of `year`
    #[instrument(skip(self), fields(tenant_id = %tenant))]
    pub async fn monthly_revenue(
        &self,
        tenant: TenantId,
        year: i32,
    ) -> Result<Vec<MonthlyRevenue>, BillingError> {
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| BillingError::validation(format!("Invalid year: {}", year)))?;
        let end = Utc
            .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| BillingError::validation(format!("Invalid year: {}", year)))?;

        let bills = self.bills.list_bills(tenant, BillQuery::between(start, end)).await?;
        Ok(reporting::monthly_revenue(&bills, year, self.policy.currency))
    }
}
