//! Unit tests for the strongly-typed identifiers

use core_kernel::{TenantId, UserId, PatientId, TestId, PackageId, BillId};
use uuid::Uuid;

#[test]
fn test_new_generates_unique_ids() {
    assert_ne!(BillId::new(), BillId::new());
}

#[test]
fn test_new_v7_generates_time_ordered_ids() {
    let id1 = BillId::new_v7();
    std::thread::sleep(std::time::Duration::from_millis(1));
    let id2 = BillId::new_v7();
    let uuid1: Uuid = id1.into();
    let uuid2: Uuid = id2.into();
    assert!(uuid1 < uuid2);
}

#[test]
fn test_prefixes() {
    assert_eq!(TenantId::prefix(), "FRN");
    assert_eq!(UserId::prefix(), "USR");
    assert_eq!(PatientId::prefix(), "PTN");
    assert_eq!(TestId::prefix(), "TST");
    assert_eq!(PackageId::prefix(), "PKG");
    assert_eq!(BillId::prefix(), "BIL");
}

#[test]
fn test_parse_with_and_without_prefix() {
    let uuid = Uuid::new_v4();
    let with_prefix: PackageId = format!("PKG-{}", uuid).parse().unwrap();
    let bare: PackageId = uuid.to_string().parse().unwrap();

    assert_eq!(with_prefix, bare);
    assert_eq!(*bare.as_uuid(), uuid);
}

#[test]
fn test_parse_rejects_garbage() {
    let error = "TST-not-a-uuid".parse::<TestId>().unwrap_err();
    assert_eq!(error.input, "TST-not-a-uuid");
    assert!(error.to_string().contains("TestId"));
}

#[test]
fn test_serde_is_transparent() {
    let uuid = Uuid::new_v4();
    let id = TenantId::from_uuid(uuid);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", uuid));
}
