//! Billing repository implementation
//!
//! Row-level access to the catalog, patient, counter and bill tables. Rows
//! are plain column mirrors; translation to domain types happens in
//! `crate::adapters::billing`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

/// A `lab_tests` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TestRow {
    pub test_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: String,
    pub price: Decimal,
    pub currency: String,
    pub is_active: bool,
}

/// A `lab_packages` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PackageRow {
    pub package_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code: String,
    pub regular_price: Decimal,
    pub special_price: Decimal,
    pub currency: String,
    pub is_active: bool,
}

/// A `patients` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub age: i16,
    pub gender: String,
    pub phone: String,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
}

/// A `bills` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BillRow {
    pub bill_id: Uuid,
    pub bill_number: String,
    pub tenant_id: Uuid,
    pub patient_id: Uuid,
    pub patient: JsonValue,
    pub items: JsonValue,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_percentage: Decimal,
    pub tax_amount: Decimal,
    pub round_off: Decimal,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
    pub payment_status: String,
    pub payment_mode: String,
    pub payment_details: JsonValue,
    pub doctor_name: Option<String>,
    pub referred_by: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub billing_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub version: i64,
}

const BILL_COLUMNS: &str = r#"
    bill_id, bill_number, tenant_id, patient_id, patient, items, currency,
    subtotal, discount, tax_percentage, tax_amount, round_off, total_amount,
    amount_paid, balance_due, payment_status, payment_mode, payment_details,
    doctor_name, referred_by, notes, created_by, billing_date, created_at,
    updated_at, is_active, version
"#;

/// Repository for the lab billing tables
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    /// Creates a new BillingRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Starts a transaction on the pool
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    // ========================================================================
    // Catalog and patients
    // ========================================================================

    pub async fn find_active_test(
        &self,
        test_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<TestRow>, DatabaseError> {
        let row = sqlx::query_as::<_, TestRow>(
            r#"
            SELECT test_id, tenant_id, name, code, price, currency, is_active
            FROM lab_tests
            WHERE test_id = $1 AND tenant_id = $2 AND is_active
            "#,
        )
        .bind(test_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Loads an active package together with its constituent tests, in order
    pub async fn find_active_package(
        &self,
        package_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<(PackageRow, Vec<TestRow>)>, DatabaseError> {
        let package = sqlx::query_as::<_, PackageRow>(
            r#"
            SELECT package_id, tenant_id, name, code, regular_price, special_price,
                   currency, is_active
            FROM lab_packages
            WHERE package_id = $1 AND tenant_id = $2 AND is_active
            "#,
        )
        .bind(package_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(package) = package else {
            return Ok(None);
        };

        let tests = sqlx::query_as::<_, TestRow>(
            r#"
            SELECT t.test_id, t.tenant_id, t.name, t.code, t.price, t.currency, t.is_active
            FROM lab_package_tests pt
            JOIN lab_tests t ON t.test_id = pt.test_id
            WHERE pt.package_id = $1
            ORDER BY pt.position, t.code
            "#,
        )
        .bind(package_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((package, tests)))
    }

    pub async fn find_patient(
        &self,
        patient_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<PatientRow>, DatabaseError> {
        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT patient_id, tenant_id, name, age, gender, phone, doctor_name, referred_by
            FROM patients
            WHERE patient_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(patient_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // ========================================================================
    // Sequence counters
    // ========================================================================

    /// Increments and returns the counter in one statement
    ///
    /// Concurrent callers serialise on the counter row, so no two of them
    /// can read the same value.
    pub async fn reserve_in(conn: &mut PgConnection, scope_key: &str) -> Result<i64, DatabaseError> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (scope_key, value, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (scope_key)
            DO UPDATE SET value = sequence_counters.value + 1, updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(scope_key)
        .fetch_one(conn)
        .await?;

        Ok(value)
    }

    pub async fn reserve(&self, scope_key: &str) -> Result<i64, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::reserve_in(&mut conn, scope_key).await
    }

    /// Sets a counter outright; used to align counters with imported data
    pub async fn set_counter(&self, scope_key: &str, value: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (scope_key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (scope_key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(scope_key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Bills
    // ========================================================================

    pub async fn insert_bill_in(conn: &mut PgConnection, row: &BillRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO bills (
                bill_id, bill_number, tenant_id, patient_id, patient, items, currency,
                subtotal, discount, tax_percentage, tax_amount, round_off, total_amount,
                amount_paid, balance_due, payment_status, payment_mode, payment_details,
                doctor_name, referred_by, notes, created_by, billing_date, created_at,
                updated_at, is_active, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27
            )
            "#,
        )
        .bind(row.bill_id)
        .bind(&row.bill_number)
        .bind(row.tenant_id)
        .bind(row.patient_id)
        .bind(&row.patient)
        .bind(&row.items)
        .bind(&row.currency)
        .bind(row.subtotal)
        .bind(row.discount)
        .bind(row.tax_percentage)
        .bind(row.tax_amount)
        .bind(row.round_off)
        .bind(row.total_amount)
        .bind(row.amount_paid)
        .bind(row.balance_due)
        .bind(&row.payment_status)
        .bind(&row.payment_mode)
        .bind(&row.payment_details)
        .bind(&row.doctor_name)
        .bind(&row.referred_by)
        .bind(&row.notes)
        .bind(row.created_by)
        .bind(row.billing_date)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.is_active)
        .bind(row.version)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn find_bill(
        &self,
        bill_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<BillRow>, DatabaseError> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE bill_id = $1 AND tenant_id = $2",
            BILL_COLUMNS
        ))
        .bind(bill_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Writes the mutable payment columns if the stored version matches
    ///
    /// # Errors
    ///
    /// `StaleVersion` when the bill exists under another version, `NotFound`
    /// when it does not exist for the tenant.
    pub async fn update_payment_columns(
        &self,
        row: &BillRow,
        expected_version: i64,
    ) -> Result<BillRow, DatabaseError> {
        let updated = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills SET
                amount_paid = $4,
                balance_due = $5,
                payment_status = $6,
                payment_mode = $7,
                payment_details = $8,
                is_active = $9,
                updated_at = $10,
                version = version + 1
            WHERE bill_id = $1 AND tenant_id = $2 AND version = $3
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(row.bill_id)
        .bind(row.tenant_id)
        .bind(expected_version)
        .bind(row.amount_paid)
        .bind(row.balance_due)
        .bind(&row.payment_status)
        .bind(&row.payment_mode)
        .bind(&row.payment_details)
        .bind(row.is_active)
        .bind(row.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => Ok(row),
            None => {
                let current: Option<i64> = sqlx::query_scalar(
                    "SELECT version FROM bills WHERE bill_id = $1 AND tenant_id = $2",
                )
                .bind(row.bill_id)
                .bind(row.tenant_id)
                .fetch_optional(&self.pool)
                .await?;

                match current {
                    Some(version) => Err(DatabaseError::StaleVersion(format!(
                        "bill {} expected version {}, found {}",
                        row.bill_number, expected_version, version
                    ))),
                    None => Err(DatabaseError::not_found("Bill", row.bill_id)),
                }
            }
        }
    }

    /// Lists a tenant's bills in `[from, to)`, oldest first
    pub async fn list_bills(
        &self,
        tenant_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BillRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            SELECT {} FROM bills
            WHERE tenant_id = $1
              AND ($2::timestamptz IS NULL OR billing_date >= $2)
              AND ($3::timestamptz IS NULL OR billing_date < $3)
            ORDER BY billing_date, bill_number
            "#,
            BILL_COLUMNS
        ))
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
