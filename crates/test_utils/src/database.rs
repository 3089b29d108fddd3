//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container, applies the billing schema, and
//! seeds catalog data. Tests using this need Docker and are `#[ignore]`d by
//! default; run them with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;

use domain_billing::{BillingPolicy, BillingService, CatalogTest, Clock, ManualClock};
use infra_db::{apply_schema, PostgresBillingAdapter, BILLING_TABLES};

use crate::builders::LabCatalog;
use crate::fixtures::TemporalFixtures;

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "lab_billing_test";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connection coordinates of a test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A PostgreSQL container with the billing schema applied
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a container and applies the schema
    ///
    /// # Errors
    ///
    /// Returns an error if Docker is unavailable, the container does not
    /// become ready, or the schema fails to apply
    pub async fn new() -> Result<Self, BoxError> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let config = TestDatabaseConfig {
            host: container.get_host().await?.to_string(),
            port: container.get_host_port_ipv4(5432).await?,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        apply_schema(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn adapter(&self) -> Arc<PostgresBillingAdapter> {
        Arc::new(PostgresBillingAdapter::new(self.pool.clone()))
    }

    /// Service whose clock is pinned to mid-June 2024
    pub fn service(&self, policy: BillingPolicy) -> BillingService {
        self.service_with_clock(policy, Arc::new(ManualClock::new(TemporalFixtures::june_2024())))
    }

    pub fn service_with_clock(&self, policy: BillingPolicy, clock: Arc<dyn Clock>) -> BillingService {
        BillingService::from_store(self.adapter(), policy).with_clock(clock)
    }

    /// Empties every billing table, keeping the schema
    pub async fn clear_data(&self) -> Result<(), BoxError> {
        sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", BILLING_TABLES.join(", ")))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts the catalog's patient, tests and package
    pub async fn seed_catalog(&self, catalog: &LabCatalog) -> Result<(), BoxError> {
        let patient = &catalog.patient;
        sqlx::query(
            r#"
            INSERT INTO patients (patient_id, tenant_id, name, age, gender, phone, doctor_name, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(patient.id.as_uuid())
        .bind(patient.tenant_id.as_uuid())
        .bind(&patient.name)
        .bind(i16::from(patient.age))
        .bind(format!("{:?}", patient.gender))
        .bind(&patient.phone)
        .bind(&patient.doctor_name)
        .bind(&patient.referred_by)
        .execute(&self.pool)
        .await?;

        for test in catalog.tests() {
            self.insert_test(test).await?;
        }

        let package = &catalog.fever_panel;
        sqlx::query(
            r#"
            INSERT INTO lab_packages (package_id, tenant_id, name, code, regular_price, special_price, currency, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(package.id.as_uuid())
        .bind(package.tenant_id.as_uuid())
        .bind(&package.name)
        .bind(&package.code)
        .bind(package.regular_price.amount())
        .bind(package.special_price.amount())
        .bind(package.regular_price.currency().code())
        .bind(package.is_active)
        .execute(&self.pool)
        .await?;

        for (position, test) in package.tests.iter().enumerate() {
            sqlx::query(
                "INSERT INTO lab_package_tests (package_id, test_id, position) VALUES ($1, $2, $3)",
            )
            .bind(package.id.as_uuid())
            .bind(test.id.as_uuid())
            .bind(position as i32)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn insert_test(&self, test: &CatalogTest) -> Result<(), BoxError> {
        sqlx::query(
            r#"
            INSERT INTO lab_tests (test_id, tenant_id, name, code, price, currency, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(test.id.as_uuid())
        .bind(test.tenant_id.as_uuid())
        .bind(&test.name)
        .bind(&test.code)
        .bind(test.price.amount())
        .bind(test.price.currency().code())
        .bind(test.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a database shared by every test in the binary
///
/// Shared state means bill numbers interleave between tests; tests that
/// assert exact numbers should use `create_isolated_test_database`.
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates a database owned by a single test
pub async fn create_isolated_test_database() -> Result<TestDatabase, BoxError> {
    TestDatabase::new().await
}
