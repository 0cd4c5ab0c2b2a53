//! The upserts themselves refuse to move a paid row backwards, even when a
//! caller hands them a stale state.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use lectern::reconcile::PaymentState;

fn paid_state(reference: &str) -> PaymentState {
    PaymentState {
        paid: true,
        paid_at: Some(PAID_AT),
        gateway_status: Some("success".to_string()),
        ..unpaid_state(reference, 30000)
    }
}

#[test]
fn test_enrollment_upsert_inserts_then_updates_one_row() {
    let conn = setup_test_db();

    queries::upsert_enrollment(&conn, "u1", "c1", &unpaid_state("pv_c1_1", 30000)).unwrap();
    queries::upsert_enrollment(&conn, "u1", "c1", &unpaid_state("pv_c1_2", 25000)).unwrap();

    let row = queries::get_enrollment(&conn, "u1", "c1").unwrap().unwrap();
    assert_eq!(row.gateway_reference.as_deref(), Some("pv_c1_2"));
    assert_eq!(row.amount_minor, 25000);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM enrollments", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_enrollment_upsert_never_unpays() {
    let conn = setup_test_db();

    queries::upsert_enrollment(&conn, "u1", "c1", &paid_state("pv_c1_1")).unwrap();
    queries::upsert_enrollment(&conn, "u1", "c1", &unpaid_state("pv_c1_2", 100)).unwrap();

    let row = queries::get_enrollment(&conn, "u1", "c1").unwrap().unwrap();
    assert!(row.paid);
    assert_eq!(row.paid_at, Some(PAID_AT));
    assert_eq!(row.gateway_reference.as_deref(), Some("pv_c1_1"));
    assert_eq!(row.amount_minor, 30000);
}

#[test]
fn test_paid_without_reference_violates_schema() {
    let conn = setup_test_db();

    let state = PaymentState {
        gateway_reference: None,
        ..paid_state("pv_c1_1")
    };

    assert!(queries::upsert_enrollment(&conn, "u1", "c1", &state).is_err());
}

#[test]
fn test_ebook_status_follows_state() {
    let conn = setup_test_db();

    queries::upsert_ebook_purchase(&conn, "u1", "e7", &unpaid_state("pe_e7_1", 4500)).unwrap();
    let purchase = queries::get_ebook_purchase(&conn, "u1", "e7").unwrap().unwrap();
    assert_eq!(purchase.status, EbookPurchaseStatus::Pending);

    let failed = PaymentState {
        gateway_status: Some("failed".to_string()),
        ..unpaid_state("pe_e7_1", 4500)
    };
    queries::upsert_ebook_purchase(&conn, "u1", "e7", &failed).unwrap();
    let purchase = queries::get_ebook_purchase(&conn, "u1", "e7").unwrap().unwrap();
    assert_eq!(purchase.status, EbookPurchaseStatus::Failed);

    queries::upsert_ebook_purchase(&conn, "u1", "e7", &paid_state("pe_e7_1")).unwrap();
    queries::upsert_ebook_purchase(&conn, "u1", "e7", &failed).unwrap();
    let purchase = queries::get_ebook_purchase(&conn, "u1", "e7").unwrap().unwrap();
    assert_eq!(purchase.status, EbookPurchaseStatus::Paid);
    assert_eq!(purchase.gateway_status.as_deref(), Some("success"));
}

#[test]
fn test_ebook_in_flight_status_stays_pending() {
    let conn = setup_test_db();

    for (gateway_status, expected) in [
        ("ongoing", EbookPurchaseStatus::Pending),
        ("processing", EbookPurchaseStatus::Pending),
        ("Abandoned", EbookPurchaseStatus::Failed),
        ("failed", EbookPurchaseStatus::Failed),
    ] {
        let state = PaymentState {
            gateway_status: Some(gateway_status.to_string()),
            ..unpaid_state("pe_e7_1", 4500)
        };
        queries::upsert_ebook_purchase(&conn, "u1", "e7", &state).unwrap();
        let purchase = queries::get_ebook_purchase(&conn, "u1", "e7").unwrap().unwrap();
        assert_eq!(purchase.status, expected, "gateway status {}", gateway_status);
    }
}

#[test]
fn test_payment_ledger_keeps_slug_and_email_when_report_lacks_them() {
    let conn = setup_test_db();

    let mut attempt = RecordPayment {
        reference: "pv_c1_1".to_string(),
        kind: PurchaseKind::Course,
        user_id: "u1".to_string(),
        subject_id: "c1".to_string(),
        slug: Some("leadership".to_string()),
        email: Some("ama@example.com".to_string()),
        gateway: Gateway::Paystack,
        amount_minor: 30000,
        currency: "GHS".to_string(),
        status: "initialized".to_string(),
    };
    queries::upsert_payment(&conn, &attempt).unwrap();

    attempt.slug = None;
    attempt.email = None;
    attempt.status = "success".to_string();
    queries::upsert_payment(&conn, &attempt).unwrap();

    let payment = queries::get_payment(&conn, "pv_c1_1").unwrap().unwrap();
    assert_eq!(payment.status, "success");
    assert_eq!(payment.slug.as_deref(), Some("leadership"));
    assert_eq!(payment.email.as_deref(), Some("ama@example.com"));
}
