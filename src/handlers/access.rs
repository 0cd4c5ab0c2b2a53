use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{EbookPurchase, Enrollment, Payment, PurchaseKind, WebhookEventRecord};

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    /// Checkout attempts, newest first
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize)]
pub struct EbookPurchaseResponse {
    #[serde(flatten)]
    pub purchase: EbookPurchase,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    #[serde(flatten)]
    pub payment: Payment,
    pub webhook_events: Vec<WebhookEventRecord>,
}

/// GET /enrollments/{user_id}/{course_id}
pub async fn get_enrollment(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(String, String)>,
) -> Result<Json<EnrollmentResponse>> {
    let conn = state.db.get()?;

    let enrollment = queries::get_enrollment(&conn, &user_id, &course_id)?
        .or_not_found(msg::ENROLLMENT_NOT_FOUND)?;
    let payments =
        queries::list_payments_for_subject(&conn, PurchaseKind::Course, &user_id, &course_id)?;

    Ok(Json(EnrollmentResponse {
        enrollment,
        payments,
    }))
}

/// GET /ebook-purchases/{user_id}/{ebook_id}
pub async fn get_ebook_purchase(
    State(state): State<AppState>,
    Path((user_id, ebook_id)): Path<(String, String)>,
) -> Result<Json<EbookPurchaseResponse>> {
    let conn = state.db.get()?;

    let purchase = queries::get_ebook_purchase(&conn, &user_id, &ebook_id)?
        .or_not_found(msg::EBOOK_PURCHASE_NOT_FOUND)?;
    let payments =
        queries::list_payments_for_subject(&conn, PurchaseKind::Ebook, &user_id, &ebook_id)?;

    Ok(Json(EbookPurchaseResponse { purchase, payments }))
}

/// GET /payments/{reference} - one checkout attempt and the webhooks seen for it.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentResponse>> {
    let conn = state.db.get()?;

    let payment = queries::get_payment(&conn, &reference)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    let webhook_events = queries::list_webhook_events_for_reference(&conn, &reference)?;

    Ok(Json(PaymentResponse {
        payment,
        webhook_events,
    }))
}
