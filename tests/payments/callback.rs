//! Tests for GET /payments/verify.
//!
//! The browser lands here after checkout. Nothing in the query string is
//! trusted: the handler asks the gateway for the charge and reconciles that.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn location(response: &axum::http::Response<axum::body::Body>) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect should carry a location")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_successful_callback_marks_paid_and_redirects_to_course() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_1", 30000);
    ctx.gateway.script_transaction(transaction(
        "pv_c1_1",
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?slug=leadership&reference=pv_c1_1&trxref=pv_c1_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        format!("{}/leadership?status=success&reference=pv_c1_1", DASHBOARD_URL)
    );

    let row = enrollment(&ctx, "u1", "c1").unwrap();
    assert!(row.paid);
    assert_eq!(row.paid_at, Some(PAID_AT));
    assert_eq!(row.gateway_status.as_deref(), Some("success"));
    assert_eq!(row.last_webhook_at, None, "callback must not touch last_webhook_at");

    let conn = ctx.state.db.get().unwrap();
    let ledger = queries::get_payment(&conn, "pv_c1_1").unwrap().unwrap();
    assert_eq!(ledger.status, "success");
    assert_eq!(ledger.email.as_deref(), Some("ama@example.com"));
}

#[tokio::test]
async fn test_abandoned_payment_returns_402_and_stays_unpaid() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_2", 30000);
    ctx.gateway.script_transaction(transaction(
        "pv_c1_2",
        "abandoned",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c1_2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["status"], "abandoned");

    let row = enrollment(&ctx, "u1", "c1").unwrap();
    assert!(!row.paid);
    assert_eq!(row.paid_at, None);
    assert_eq!(row.gateway_status.as_deref(), Some("abandoned"));
}

#[tokio::test]
async fn test_failed_payment_without_intent_writes_nothing() {
    let ctx = create_test_context();
    ctx.gateway.script_transaction(transaction(
        "pv_c9_1",
        "failed",
        30000,
        course_metadata("u1", "c9", "leadership"),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c9_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(enrollment(&ctx, "u1", "c9").is_none());
}

#[tokio::test]
async fn test_missing_reference_is_bad_request() {
    let ctx = create_test_context();

    for uri in ["/payments/verify", "/payments/verify?reference=", "/payments/verify?reference=%20"] {
        let response = ctx.app().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} should be rejected", uri);
    }
}

#[tokio::test]
async fn test_trxref_alone_is_accepted() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_3", 30000);
    ctx.gateway.script_transaction(transaction(
        "pv_c1_3",
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?trxref=pv_c1_3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(enrollment(&ctx, "u1", "c1").unwrap().paid);
}

#[tokio::test]
async fn test_ebook_callback_redirects_to_library() {
    let ctx = create_test_context();
    ctx.gateway.script_transaction(transaction(
        "pe_e7_1",
        "success",
        4500,
        ebook_metadata("u1", "e7", "rust-in-practice"),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pe_e7_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with(&format!("{}/rust-in-practice?", LIBRARY_URL)));

    let purchase = ebook_purchase(&ctx, "u1", "e7").unwrap();
    assert_eq!(purchase.status, EbookPurchaseStatus::Paid);
    assert_eq!(purchase.amount_minor, 4500);
}

#[tokio::test]
async fn test_success_without_metadata_fails_closed() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_4", 30000);

    for (reference, metadata) in [
        ("pv_c1_4", serde_json::Value::Null),
        ("pv_c1_5", json!({"kind": "course", "course_id": "c1", "slug": "leadership"})),
        ("pv_c1_6", json!({"kind": "course", "user_id": "u1", "slug": "leadership"})),
    ] {
        ctx.gateway
            .script_transaction(transaction(reference, "success", 30000, metadata));

        let response = ctx
            .app()
            .oneshot(get(&format!("/payments/verify?reference={}", reference)))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "{} should fail closed",
            reference
        );
    }

    assert!(!enrollment(&ctx, "u1", "c1").unwrap().paid);
}

#[tokio::test]
async fn test_slug_falls_back_to_callback_query() {
    let ctx = create_test_context();
    ctx.gateway.script_transaction(transaction(
        "pv_c1_7",
        "success",
        30000,
        json!({"user_id": "u1", "course_id": "c1"}),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?slug=leadership&reference=pv_c1_7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with(&format!("{}/leadership?", DASHBOARD_URL)));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c1_7"))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::INTERNAL_SERVER_ERROR,
        "no slug anywhere means the redirect target is unknown"
    );
}

#[tokio::test]
async fn test_metadata_sent_as_json_string_is_decoded() {
    let ctx = create_test_context();
    let metadata = course_metadata("u1", "c1", "leadership").to_string();
    ctx.gateway.script_transaction(transaction(
        "pv_c1_8",
        "success",
        30000,
        json!(metadata),
    ));

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c1_8"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(enrollment(&ctx, "u1", "c1").unwrap().paid);
}

#[tokio::test]
async fn test_unknown_reference_is_gateway_error() {
    let ctx = create_test_context();

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_nope_1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Transaction reference not found");
}

#[tokio::test]
async fn test_repeated_callback_keeps_first_paid_at() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_9", 30000);
    ctx.gateway.script_transaction(transaction(
        "pv_c1_9",
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));

    for _ in 0..3 {
        let response = ctx
            .app()
            .oneshot(get("/payments/verify?reference=pv_c1_9"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    let row = enrollment(&ctx, "u1", "c1").unwrap();
    assert!(row.paid);
    assert_eq!(row.paid_at, Some(PAID_AT));
}

#[tokio::test]
async fn test_persistence_failure_names_reference_for_support() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_20", 30000);
    ctx.gateway.script_transaction(transaction(
        "pv_c1_20",
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));
    drop_table(&ctx, "payments");

    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c1_20"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    let details = body["details"].as_str().expect("support details");
    assert!(details.contains("contact support"));
    assert!(details.contains("pv_c1_20"));

    assert!(
        !enrollment(&ctx, "u1", "c1").unwrap().paid,
        "enrollment and ledger are written together"
    );
}
