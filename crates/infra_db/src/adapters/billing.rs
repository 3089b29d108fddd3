//! PostgreSQL Billing Adapter
//!
//! Implements every `domain_billing` port over the `BillingRepository`.
//!
//! # Bill numbering
//!
//! `insert_numbered` runs one transaction:
//!
//! 1. increment-and-read the counter row for the month
//! 2. `SAVEPOINT`, insert the bill under the rendered number
//! 3. commit
//!
//! Any failure rolls the whole transaction back, so no number is burned.
//! The one exception is a unique violation on `bill_number` (a number taken
//! by imported or legacy data): the insert is rolled back to the savepoint
//! and the counter increment committed, so the service's retry moves on to
//! the next ordinal instead of hitting the same one again.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBillingAdapter;
//! use domain_billing::{BillingService, BillingPolicy};
//! use std::sync::Arc;
//!
//! let adapter = Arc::new(PostgresBillingAdapter::new(pool));
//! let service = BillingService::from_store(adapter, BillingPolicy::default());
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use core_kernel::{
    BillId, Currency, DomainPort, HealthCheckResult, HealthCheckable, Money,
    PackageId, PatientId, Percentage, PortError, TenantId, TestId, UserId,
};
use domain_billing::{
    Bill, BillDraft, BillPort, BillQuery, CatalogPackage, CatalogPort, CatalogTest, PatientPort,
    PatientRecord, SequenceKey, SequencePort,
};

use crate::error::DatabaseError;
use crate::repositories::billing::{BillRow, BillingRepository, PackageRow, PatientRow, TestRow};

/// PostgreSQL-backed implementation of the billing ports
#[derive(Debug, Clone)]
pub struct PostgresBillingAdapter {
    repository: BillingRepository,
}

impl PostgresBillingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillingRepository::new(pool),
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &BillingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresBillingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresBillingAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        let started = std::time::Instant::now();
        let probe = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.repository.pool())
            .await
            .map(|_| ())
            .map_err(|e| format!("Database error: {}", e));

        HealthCheckResult::from_probe("postgres-billing-adapter", started, probe)
    }
}

#[async_trait]
impl CatalogPort for PostgresBillingAdapter {
    #[instrument(skip(self), fields(test_id = %id, tenant_id = %tenant))]
    async fn find_active_test(
        &self,
        id: TestId,
        tenant: TenantId,
    ) -> Result<Option<CatalogTest>, PortError> {
        let row = self
            .repository
            .find_active_test(*id.as_uuid(), *tenant.as_uuid())
            .await?;
        row.map(test_from_row).transpose().map_err(Into::into)
    }

    #[instrument(skip(self), fields(package_id = %id, tenant_id = %tenant))]
    async fn find_active_package(
        &self,
        id: PackageId,
        tenant: TenantId,
    ) -> Result<Option<CatalogPackage>, PortError> {
        let Some((package, tests)) = self
            .repository
            .find_active_package(*id.as_uuid(), *tenant.as_uuid())
            .await?
        else {
            return Ok(None);
        };

        debug!(tests = tests.len(), "Loaded package");
        Ok(Some(package_from_rows(package, tests)?))
    }
}

#[async_trait]
impl PatientPort for PostgresBillingAdapter {
    #[instrument(skip(self), fields(patient_id = %id, tenant_id = %tenant))]
    async fn find_patient(
        &self,
        id: PatientId,
        tenant: TenantId,
    ) -> Result<Option<PatientRecord>, PortError> {
        let row = self
            .repository
            .find_patient(*id.as_uuid(), *tenant.as_uuid())
            .await?;
        row.map(patient_from_row).transpose().map_err(Into::into)
    }
}

#[async_trait]
impl SequencePort for PostgresBillingAdapter {
    #[instrument(skip(self), fields(scope = %key.storage_key()))]
    async fn reserve(&self, key: &SequenceKey) -> Result<u64, PortError> {
        let value = self.repository.reserve(&key.storage_key()).await?;
        Ok(to_u64(value, "sequence value")?)
    }
}

#[async_trait]
impl BillPort for PostgresBillingAdapter {
    #[instrument(skip(self, draft), fields(scope = %key.storage_key(), tenant_id = %draft.tenant_id))]
    async fn insert_numbered(&self, key: &SequenceKey, draft: BillDraft) -> Result<Bill, PortError> {
        let mut tx = self.repository.begin().await?;

        let ordinal = BillingRepository::reserve_in(&mut tx, &key.storage_key()).await?;
        let bill = draft.into_bill(key.render(to_u64(ordinal, "sequence value")?));
        let row = bill_to_row(&bill)?;

        sqlx::query("SAVEPOINT bill_insert")
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from)?;

        match BillingRepository::insert_bill_in(&mut tx, &row).await {
            Ok(()) => {
                tx.commit().await.map_err(DatabaseError::from)?;
                debug!(bill_number = %bill.bill_number, "Bill inserted");
                Ok(bill)
            }
            Err(DatabaseError::DuplicateEntry(detail)) => {
                sqlx::query("ROLLBACK TO SAVEPOINT bill_insert")
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::from)?;
                tx.commit().await.map_err(DatabaseError::from)?;

                warn!(bill_number = %bill.bill_number, "Bill number already taken");
                Err(PortError::conflict(format!(
                    "Bill number {} already exists ({})",
                    bill.bill_number, detail
                )))
            }
            Err(other) => Err(other.into()),
        }
    }

    #[instrument(skip(self), fields(bill_id = %id, tenant_id = %tenant))]
    async fn find_bill(&self, id: BillId, tenant: TenantId) -> Result<Option<Bill>, PortError> {
        let row = self
            .repository
            .find_bill(*id.as_uuid(), *tenant.as_uuid())
            .await?;
        row.map(bill_from_row).transpose().map_err(Into::into)
    }

    #[instrument(skip(self, bill), fields(bill_id = %bill.id))]
    async fn update_bill(&self, bill: &Bill, expected_version: u64) -> Result<Bill, PortError> {
        let row = bill_to_row(bill)?;
        let expected = i64::try_from(expected_version)
            .map_err(|_| PortError::validation_field("version out of range", "version"))?;

        let stored = self.repository.update_payment_columns(&row, expected).await?;
        Ok(bill_from_row(stored)?)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant))]
    async fn list_bills(&self, tenant: TenantId, query: BillQuery) -> Result<Vec<Bill>, PortError> {
        let rows = self
            .repository
            .list_bills(*tenant.as_uuid(), query.from, query.to)
            .await?;

        let bills = rows
            .into_iter()
            .map(bill_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bills)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn currency(code: &str) -> Result<Currency, DatabaseError> {
    Currency::from_str(code).map_err(|e| DatabaseError::SerializationError(e.to_string()))
}

fn to_u64(value: i64, what: &str) -> Result<u64, DatabaseError> {
    u64::try_from(value)
        .map_err(|_| DatabaseError::SerializationError(format!("negative {}: {}", what, value)))
}

/// Decodes a label stored as text through its serde representation
fn from_label<T: DeserializeOwned>(label: &str) -> Result<T, DatabaseError> {
    Ok(serde_json::from_value(JsonValue::String(label.to_string()))?)
}

fn test_from_row(row: TestRow) -> Result<CatalogTest, DatabaseError> {
    Ok(CatalogTest {
        id: TestId::from_uuid(row.test_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        name: row.name,
        code: row.code,
        price: Money::new(row.price, currency(&row.currency)?),
        is_active: row.is_active,
    })
}

fn package_from_rows(row: PackageRow, tests: Vec<TestRow>) -> Result<CatalogPackage, DatabaseError> {
    let currency = currency(&row.currency)?;
    Ok(CatalogPackage {
        id: PackageId::from_uuid(row.package_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        name: row.name,
        code: row.code,
        regular_price: Money::new(row.regular_price, currency),
        special_price: Money::new(row.special_price, currency),
        tests: tests
            .into_iter()
            .map(test_from_row)
            .collect::<Result<Vec<_>, _>>()?,
        is_active: row.is_active,
    })
}

fn patient_from_row(row: PatientRow) -> Result<PatientRecord, DatabaseError> {
    Ok(PatientRecord {
        id: PatientId::from_uuid(row.patient_id),
        tenant_id: TenantId::from_uuid(row.tenant_id),
        name: row.name,
        age: u8::try_from(row.age)
            .map_err(|_| DatabaseError::SerializationError(format!("patient age {}", row.age)))?,
        gender: from_label(&row.gender)?,
        phone: row.phone,
        doctor_name: row.doctor_name,
        referred_by: row.referred_by,
    })
}

fn bill_to_row(bill: &Bill) -> Result<BillRow, DatabaseError> {
    Ok(BillRow {
        bill_id: *bill.id.as_uuid(),
        bill_number: bill.bill_number.clone(),
        tenant_id: *bill.tenant_id.as_uuid(),
        patient_id: *bill.patient_id.as_uuid(),
        patient: serde_json::to_value(&bill.patient)?,
        items: serde_json::to_value(&bill.items)?,
        currency: bill.total_amount.currency().code().to_string(),
        subtotal: bill.subtotal.amount(),
        discount: bill.discount.amount(),
        tax_percentage: bill.tax_percentage.value(),
        tax_amount: bill.tax_amount.amount(),
        round_off: bill.round_off.amount(),
        total_amount: bill.total_amount.amount(),
        amount_paid: bill.amount_paid.amount(),
        balance_due: bill.balance_due.amount(),
        payment_status: bill.payment_status.as_str().to_string(),
        payment_mode: bill.payment_mode.as_str().to_string(),
        payment_details: serde_json::to_value(&bill.payment_details)?,
        doctor_name: bill.doctor_name.clone(),
        referred_by: bill.referred_by.clone(),
        notes: bill.notes.clone(),
        created_by: bill.created_by.map(|user| *user.as_uuid()),
        billing_date: bill.billing_date,
        created_at: bill.created_at,
        updated_at: bill.updated_at,
        is_active: bill.is_active,
        version: i64::try_from(bill.version)
            .map_err(|_| DatabaseError::SerializationError(format!("version {}", bill.version)))?,
    })
}

fn bill_from_row(row: BillRow) -> Result<Bill, DatabaseError> {
    let currency = currency(&row.currency)?;
    let money = |amount| Money::new(amount, currency);

    Ok(Bill {
        id: BillId::from_uuid(row.bill_id),
        bill_number: row.bill_number,
        tenant_id: TenantId::from_uuid(row.tenant_id),
        patient_id: PatientId::from_uuid(row.patient_id),
        patient: serde_json::from_value(row.patient)?,
        items: serde_json::from_value(row.items)?,
        subtotal: money(row.subtotal),
        discount: money(row.discount),
        tax_percentage: Percentage::new(row.tax_percentage),
        tax_amount: money(row.tax_amount),
        round_off: money(row.round_off),
        total_amount: money(row.total_amount),
        amount_paid: money(row.amount_paid),
        balance_due: money(row.balance_due),
        payment_status: from_label(&row.payment_status)?,
        payment_mode: from_label(&row.payment_mode)?,
        payment_details: serde_json::from_value(row.payment_details)?,
        doctor_name: row.doctor_name,
        referred_by: row.referred_by,
        notes: row.notes,
        created_by: row.created_by.map(UserId::from_uuid),
        billing_date: row.billing_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
        is_active: row.is_active,
        version: to_u64(row.version, "bill version")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::{PaymentMode, PaymentStatus};

    #[test]
    fn test_labels_round_trip_through_text() {
        let mode: PaymentMode = from_label(PaymentMode::NetBanking.as_str()).unwrap();
        assert_eq!(mode, PaymentMode::NetBanking);
        let mode: PaymentMode = from_label("UPI").unwrap();
        assert_eq!(mode, PaymentMode::Upi);
        let status: PaymentStatus = from_label("Partial").unwrap();
        assert_eq!(status, PaymentStatus::Partial);
    }

    #[test]
    fn test_unknown_label_is_serialization_error() {
        let result: Result<PaymentStatus, _> = from_label("Refunded");
        assert!(matches!(result, Err(DatabaseError::SerializationError(_))));
    }

    #[test]
    fn test_currency_code_parses() {
        assert_eq!(currency("INR").unwrap(), Currency::INR);
        assert!(currency("XYZ").is_err());
    }

    #[test]
    fn test_negative_counter_rejected() {
        assert!(to_u64(-1, "sequence value").is_err());
        assert_eq!(to_u64(12, "sequence value").unwrap(), 12);
    }
}
