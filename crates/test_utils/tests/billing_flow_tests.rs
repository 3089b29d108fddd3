//! End-to-end billing flows
//!
//! In-memory flows run everywhere. Flows against PostgreSQL need Docker and
//! are ignored by default.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;

use core_kernel::{AdapterHealth, HealthCheckable, UserId};
use domain_billing::{
    BillPort, BillingError, BillingPolicy, CodeKind, CreateBillRequest, ManualClock, PaymentMode,
    PaymentStatus, RequestedLine, SequenceScope, UpdatePaymentCommand, UpdatePaymentRequest,
    YearMonth,
};
use test_utils::*;

fn june() -> YearMonth {
    YearMonth::new(2024, 6).unwrap()
}

// ============================================================================
// In-memory flows
// ============================================================================

mod in_memory_flows {
    use super::*;

    #[tokio::test]
    async fn test_test_and_package_bill_end_to_end() {
        init_test_tracing();
        let lab = InMemoryLab::new().await;
        let catalog = &lab.catalog;
        let cashier = UserId::new();

        let command = catalog
            .bill()
            .test(&catalog.cbc, 1)
            .package(&catalog.fever_panel)
            .discount(dec!(10.5))
            .created_by(cashier)
            .notes("fasting sample")
            .build();
        let bill = lab.service.create_bill(command).await.unwrap();

        assert_bill_consistent(&bill);
        assert_bill_number(&bill.bill_number, june(), 1);
        assert_money_eq(&bill.subtotal, &inr(dec!(750)));
        assert_money_eq(&bill.tax_amount, &inr(dec!(135)));
        assert_total(&bill, dec!(875));
        assert_money_eq(&bill.round_off, &inr(dec!(0.5)));
        assert_eq!(bill.payment_status, PaymentStatus::Pending);
        assert_eq!(bill.created_by, Some(cashier));
        assert_eq!(bill.doctor_name.as_deref(), Some("Dr. Iyer"));

        let package_line = &bill.items[1];
        assert!(package_line.is_package);
        assert_eq!(package_line.package_breakdown.len(), 2);

        let partial = lab
            .service
            .update_payment(bill.id, catalog.tenant, UpdatePaymentCommand::paid(inr(dec!(500))))
            .await
            .unwrap();
        assert_bill_consistent(&partial);
        assert_eq!(partial.payment_status, PaymentStatus::Partial);
        assert_money_eq(&partial.balance_due, &inr(dec!(375)));

        let settled = lab
            .service
            .update_payment(
                bill.id,
                catalog.tenant,
                UpdatePaymentCommand::paid(inr(dec!(875))).with_mode(PaymentMode::Upi),
            )
            .await
            .unwrap();
        assert_eq!(settled.payment_status, PaymentStatus::Paid);
        assert!(settled.balance_due.is_zero());
        assert_eq!(settled.version, 3);

        let cancelled = lab.service.cancel_bill(bill.id, catalog.tenant).await.unwrap();
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_active);

        let stats = lab
            .service
            .dashboard_stats(catalog.tenant, TemporalFixtures::june_15())
            .await
            .unwrap();
        assert_eq!(stats.total_bills, 0);
        assert!(stats.total_revenue.is_zero());
    }

    #[tokio::test]
    async fn test_request_body_to_stored_bill() {
        let lab = InMemoryLab::new().await;
        let catalog = &lab.catalog;

        let body = serde_json::json!({
            "patientId": catalog.patient.id,
            "items": [
                { "itemType": "Test", "itemRef": catalog.lipid.id, "quantity": 2,
                  "discountType": "Percentage", "discountValue": "10" },
                { "itemType": "Package", "itemRef": catalog.fever_panel.id }
            ],
            "taxPercentage": "5",
            "amountPaid": "200",
            "paymentMode": "Net Banking",
            "paymentDetails": { "transactionId": "NB-7781" }
        });
        let request: CreateBillRequest = serde_json::from_value(body).unwrap();
        let command = request.into_command(catalog.tenant, lab.service.policy()).unwrap();

        let bill = lab.service.create_bill(command).await.unwrap();

        assert_bill_consistent(&bill);
        // 2 x 540 + 350 = 1430, plus 5 % = 1501.5
        assert_money_eq(&bill.subtotal, &inr(dec!(1430)));
        assert_total(&bill, dec!(1502));
        assert_eq!(bill.payment_status, PaymentStatus::Partial);
        assert_eq!(bill.payment_mode, PaymentMode::NetBanking);
        assert_eq!(bill.payment_details.transaction_id.as_deref(), Some("NB-7781"));
    }

    #[tokio::test]
    async fn test_caller_cannot_backdate_the_bill_number() {
        let lab = InMemoryLab::new().await;
        let today = Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap();
        lab.clock.set(today);

        let body = serde_json::json!({
            "patientId": lab.catalog.patient.id,
            "items": [{ "itemType": "Test", "itemRef": lab.catalog.cbc.id }],
            "billingDate": "2024-06-20T09:00:00Z"
        });
        let request: CreateBillRequest = serde_json::from_value(body).unwrap();
        let command = request.into_command(lab.catalog.tenant, lab.service.policy()).unwrap();
        let bill = lab.service.create_bill(command).await.unwrap();

        assert_bill_number(&bill.bill_number, YearMonth::new(2026, 10).unwrap(), 1);
        assert_eq!(bill.billing_date, today);
        assert_eq!(lab.store.counter(&LabCatalog::bill_key(TemporalFixtures::june_2024())).await, 0);
    }

    #[tokio::test]
    async fn test_empty_items_rejected_before_numbering() {
        let lab = InMemoryLab::new().await;
        let body = serde_json::json!({ "patientId": lab.catalog.patient.id, "items": [] });
        let request: CreateBillRequest = serde_json::from_value(body).unwrap();

        assert_validation_error(request.into_command(lab.catalog.tenant, lab.service.policy()));
        assert_eq!(lab.store.counter(&LabCatalog::bill_key(TemporalFixtures::june_2024())).await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_status_not_accepted_on_payment() {
        let lab = InMemoryLab::new().await;
        let request = UpdatePaymentRequest {
            payment_status: Some(PaymentStatus::Cancelled),
            ..Default::default()
        };
        assert_validation_error(request.into_command(lab.service.policy().currency));
    }

    #[tokio::test]
    async fn test_other_tenant_sees_nothing() {
        let lab = InMemoryLab::new().await;
        let bill = lab
            .service
            .create_bill(lab.catalog.bill().test(&lab.catalog.cbc, 1).build())
            .await
            .unwrap();

        assert_not_found(lab.service.get_bill(bill.id, IdFixtures::other_tenant_id()).await);
        assert_not_found(
            lab.service
                .update_payment(
                    bill.id,
                    IdFixtures::other_tenant_id(),
                    UpdatePaymentCommand::paid(inr(dec!(1))),
                )
                .await,
        );
    }

    #[tokio::test]
    async fn test_codes_across_kinds() {
        let lab = InMemoryLab::new().await;
        let tenant_scope = SequenceScope::for_tenant(lab.catalog.tenant);

        let mut codes = Vec::new();
        for kind in [CodeKind::Patient, CodeKind::Test, CodeKind::Package] {
            for _ in 0..3 {
                codes.push(lab.service.next_code(kind, tenant_scope).await.unwrap());
            }
        }

        assert_eq!(codes[0], "PAT00001");
        assert_eq!(codes[3], "TEST0001");
        assert_eq!(codes[8], "PKG0003");
        assert_all_unique(codes.iter().map(String::as_str));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn generated_bills_are_consistent(
            quantities in prop::collection::vec(quantity_strategy(), 1..4),
            tax in tax_percentage_strategy(),
            paid in inr_strategy(),
            mode in payment_mode_strategy(),
            created_at in billing_date_2024_strategy(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let lab = InMemoryLab::new().await;
                lab.clock.set(created_at);
                let tests = lab.catalog.tests();
                let mut builder = lab.catalog.bill().paid_money(paid).mode(mode);
                builder = quantities
                    .iter()
                    .enumerate()
                    .fold(builder, |b, (i, q)| b.test(tests[i % tests.len()], *q));
                let mut command = builder.build();
                command.tax_percentage = tax;

                let bill = lab.service.create_bill(command).await.unwrap();
                assert_bill_consistent(&bill);
                assert_bill_number(&bill.bill_number, YearMonth::of_instant(created_at), 1);
                assert_eq!(bill.billing_date, created_at);
            });
        }
    }
}

// ============================================================================
// PostgreSQL flows
// ============================================================================

mod postgres_flows {
    use super::*;

    async fn seeded() -> (TestDatabase, LabCatalog) {
        init_test_tracing();
        let db = create_isolated_test_database()
            .await
            .expect("Failed to create test database");
        let catalog = LabCatalog::fresh();
        db.seed_catalog(&catalog).await.expect("Failed to seed catalog");
        (db, catalog)
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_bill_survives_a_round_trip() {
        let (db, catalog) = seeded().await;
        let service = db.service(BillingPolicy::default());

        let created = service
            .create_bill(
                catalog
                    .bill()
                    .test(&catalog.cbc, 2)
                    .package(&catalog.fever_panel)
                    .paid(dec!(300))
                    .mode(PaymentMode::Card)
                    .build(),
            )
            .await
            .unwrap();
        let loaded = service.get_bill(created.id, catalog.tenant).await.unwrap();

        assert_bill_consistent(&loaded);
        assert_eq!(loaded.bill_number, created.bill_number);
        assert_eq!(loaded.items, created.items);
        assert_eq!(loaded.patient, created.patient);
        assert_eq!(loaded.totals(), created.totals());
        assert_eq!(loaded.payment_status, PaymentStatus::Partial);
        assert_eq!(loaded.payment_mode, PaymentMode::Card);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_concurrent_bills_get_distinct_numbers() {
        let (db, catalog) = seeded().await;
        let service = db.service(BillingPolicy::default());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = service.clone();
            let command = catalog.bill().test(&catalog.cbc, 1).build();
            handles.push(tokio::spawn(async move { service.create_bill(command).await }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap().bill_number);
        }
        numbers.sort();

        assert_all_unique(numbers.iter().map(String::as_str));
        assert_bill_number(&numbers[0], june(), 1);
        assert_bill_number(&numbers[19], june(), 20);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_taken_number_is_skipped() {
        let (db, catalog) = seeded().await;
        let adapter = db.adapter();
        let service = db.service(BillingPolicy::default());
        let key = LabCatalog::bill_key(TemporalFixtures::june_2024());

        let first = service
            .create_bill(catalog.bill().test(&catalog.cbc, 1).build())
            .await
            .unwrap();
        adapter.repository().set_counter(&key.storage_key(), 0).await.unwrap();

        let second = service
            .create_bill(catalog.bill().test(&catalog.lipid, 1).build())
            .await
            .unwrap();

        assert_bill_number(&first.bill_number, june(), 1);
        assert_bill_number(&second.bill_number, june(), 2);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_failed_creation_leaves_counter_untouched() {
        let (db, catalog) = seeded().await;
        let service = db.service(BillingPolicy::default());

        let result = service
            .create_bill(catalog.bill().test(&catalog.cbc, 1).discount(dec!(100000)).build())
            .await;
        assert_validation_error(result);

        let bill = service
            .create_bill(catalog.bill().test(&catalog.cbc, 1).build())
            .await
            .unwrap();
        assert_bill_number(&bill.bill_number, june(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_stale_update_is_rejected() {
        let (db, catalog) = seeded().await;
        let adapter = db.adapter();
        let service = db.service(BillingPolicy::default());

        let bill = service
            .create_bill(catalog.bill().test(&catalog.cbc, 1).build())
            .await
            .unwrap();
        service
            .update_payment(bill.id, catalog.tenant, UpdatePaymentCommand::paid(inr(dec!(100))))
            .await
            .unwrap();

        let error = adapter.update_bill(&bill, bill.version).await.unwrap_err();
        assert!(error.is_conflict());

        let cancelled = service.cancel_bill(bill.id, catalog.tenant).await.unwrap();
        assert_eq!(cancelled.version, 3);
        assert!(matches!(
            service.cancel_bill(bill.id, catalog.tenant).await,
            Err(BillingError::AlreadyCancelled(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_inactive_catalog_rows_are_invisible() {
        let (db, catalog) = seeded().await;
        let mut old_test = CatalogFixtures::widal(catalog.tenant);
        old_test.code = format!("{}-retired", catalog.widal.code);
        old_test.is_active = false;
        db.insert_test(&old_test).await.unwrap();

        let service = db.service(BillingPolicy::default());
        let result = service
            .create_bill(catalog.bill().line(RequestedLine::test(old_test.id, 1)).build())
            .await;
        assert_not_found(result);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_reporting_reads_stored_bills() {
        let (db, catalog) = seeded().await;
        let clock = Arc::new(ManualClock::new(TemporalFixtures::june_2024()));
        let service = db.service_with_clock(BillingPolicy::default(), clock.clone());

        for date in [TemporalFixtures::june_2024(), TemporalFixtures::july_2024()] {
            clock.set(date);
            service
                .create_bill(catalog.bill().test(&catalog.lipid, 1).build())
                .await
                .unwrap();
        }

        let months = service.monthly_revenue(catalog.tenant, 2024).await.unwrap();
        assert_eq!(months.len(), 12);
        assert_eq!(months[5].count, 1);
        assert_eq!(months[6].count, 1);
        assert_money_eq(&months[5].revenue, &inr(dec!(708)));

        let stats = service
            .dashboard_stats(catalog.tenant, TemporalFixtures::june_15())
            .await
            .unwrap();
        assert_eq!(stats.total_bills, 2);
        assert_eq!(stats.today_bills, 1);
        assert_eq!(stats.pending_bills, 2);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    async fn test_adapter_reports_healthy() {
        let (db, _) = seeded().await;
        let health = db.adapter().health_check().await;
        assert_eq!(health.status, AdapterHealth::Healthy);
    }
}
