//! Callback and webhook report the same charge independently. Whatever order
//! they arrive in, and however often, the row ends up in the same state.

use axum::http::StatusCode;
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn script_paid(ctx: &TestContext, reference: &str) {
    ctx.gateway.script_transaction(transaction(
        reference,
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));
}

fn webhook_for(reference: &str) -> axum::http::Request<axum::body::Body> {
    signed_webhook(charge_success_body(transaction(
        reference,
        "success",
        30000,
        course_metadata("u1", "c1", "leadership"),
    )))
}

/// Payment columns that must agree regardless of delivery order.
fn settled(ctx: &TestContext) -> (bool, Option<i64>, i64, String, Option<String>) {
    let row = enrollment(ctx, "u1", "c1").unwrap();
    (
        row.paid,
        row.paid_at,
        row.amount_minor,
        row.currency,
        row.gateway_reference,
    )
}

#[tokio::test]
async fn test_callback_then_webhook_equals_webhook_then_callback() {
    let first = create_test_context();
    seed_course_intent(&first, "u1", "c1", "pv_c1_1", 30000);
    script_paid(&first, "pv_c1_1");

    let response = first.app().oneshot(get("/payments/verify?reference=pv_c1_1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let response = first.app().oneshot(webhook_for("pv_c1_1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let second = create_test_context();
    seed_course_intent(&second, "u1", "c1", "pv_c1_1", 30000);
    script_paid(&second, "pv_c1_1");

    let response = second.app().oneshot(webhook_for("pv_c1_1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = second.app().oneshot(get("/payments/verify?reference=pv_c1_1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    assert_eq!(settled(&first), settled(&second));
    assert_eq!(
        settled(&first),
        (true, Some(PAID_AT), 30000, "GHS".to_string(), Some("pv_c1_1".to_string()))
    );

    // Both saw a webhook, so both carry the webhook timestamp.
    assert!(enrollment(&first, "u1", "c1").unwrap().last_webhook_at.is_some());
    assert!(enrollment(&second, "u1", "c1").unwrap().last_webhook_at.is_some());
}

#[tokio::test]
async fn test_concurrent_callback_and_webhook_converge() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_2", 30000);
    script_paid(&ctx, "pv_c1_2");

    let (callback, webhook) = tokio::join!(
        ctx.app().oneshot(get("/payments/verify?reference=pv_c1_2")),
        ctx.app().oneshot(webhook_for("pv_c1_2")),
    );

    assert_eq!(callback.unwrap().status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(webhook.unwrap().status(), StatusCode::OK);
    assert_eq!(
        settled(&ctx),
        (true, Some(PAID_AT), 30000, "GHS".to_string(), Some("pv_c1_2".to_string()))
    );
}

#[tokio::test]
async fn test_failed_report_after_paid_never_unpays() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_3", 30000);

    let response = ctx.app().oneshot(webhook_for("pv_c1_3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let before = settled(&ctx);

    // A stale tab verifies an older, abandoned attempt for the same course.
    ctx.gateway.script_transaction(transaction(
        "pv_c1_old",
        "abandoned",
        30000,
        course_metadata("u1", "c1", "leadership"),
    ));
    let response = ctx
        .app()
        .oneshot(get("/payments/verify?reference=pv_c1_old"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    assert_eq!(settled(&ctx), before);
    assert_eq!(
        enrollment(&ctx, "u1", "c1").unwrap().gateway_status.as_deref(),
        Some("success")
    );
}

#[tokio::test]
async fn test_reinitialize_after_paid_keeps_paid_reference() {
    let ctx = create_test_context();
    seed_course_intent(&ctx, "u1", "c1", "pv_c1_4", 30000);
    let response = ctx.app().oneshot(webhook_for("pv_c1_4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app()
        .oneshot(post_json(
            "/payments/initialize",
            serde_json::json!({
                "user_id": "u1",
                "email": "ama@example.com",
                "course_id": "c1",
                "slug": "leadership",
                "amount": 300,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        settled(&ctx),
        (true, Some(PAID_AT), 30000, "GHS".to_string(), Some("pv_c1_4".to_string()))
    );
}
