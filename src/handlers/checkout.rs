use axum::extract::State;
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::RecordPayment;
use crate::payments::{
    generate_reference, normalize_currency, to_minor_units, InitializeTransaction,
};
use crate::reconcile::{PaymentIntent, PurchaseTarget, Transition};

/// Accept `"amount": 300`, `"amount": 300.5` or `"amount": "300"`.
fn amount_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(msg::INVALID_AMOUNT)),
    }
}

#[derive(Debug, Deserialize)]
pub struct InitializeCourseRequest {
    pub user_id: String,
    pub email: String,
    pub course_id: String,
    pub slug: String,
    /// Major units (e.g. 300 GHS)
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InitializeEbookRequest {
    pub user_id: String,
    pub email: String,
    pub ebook_id: String,
    pub slug: String,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub ok: bool,
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

fn require_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", name)));
    }
    Ok(())
}

/// POST /payments/initialize
pub async fn initialize_course_checkout(
    State(state): State<AppState>,
    Json(request): Json<InitializeCourseRequest>,
) -> Result<Json<InitializeResponse>> {
    require_field("user_id", &request.user_id)?;
    require_field("course_id", &request.course_id)?;
    require_field("slug", &request.slug)?;

    let target = PurchaseTarget::course(
        request.user_id.trim(),
        request.course_id.trim(),
        request.slug.trim(),
    );
    start_checkout(&state, target, &request.email, request.amount, request.currency.as_deref())
        .await
        .map(Json)
}

/// POST /payments/ebooks/initialize
pub async fn initialize_ebook_checkout(
    State(state): State<AppState>,
    Json(request): Json<InitializeEbookRequest>,
) -> Result<Json<InitializeResponse>> {
    require_field("user_id", &request.user_id)?;
    require_field("ebook_id", &request.ebook_id)?;
    require_field("slug", &request.slug)?;

    let target = PurchaseTarget::ebook(
        request.user_id.trim(),
        request.ebook_id.trim(),
        request.slug.trim(),
    );
    start_checkout(&state, target, &request.email, request.amount, request.currency.as_deref())
        .await
        .map(Json)
}

/// Record the intent, then open a hosted checkout with the gateway.
///
/// If the gateway rejects the request the intent stays as recorded, so the
/// buyer can simply try again.
async fn start_checkout(
    state: &AppState,
    target: PurchaseTarget,
    email: &str,
    amount_major: f64,
    currency: Option<&str>,
) -> Result<InitializeResponse> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }

    let currency = normalize_currency(currency.unwrap_or(&state.default_currency))?;
    let amount_minor = to_minor_units(amount_major, &currency)?;
    let reference = generate_reference(target.kind(), target.subject_id());
    let gateway = state.gateway.gateway();

    {
        let mut conn = state.db.get()?;

        let outcome = target.record_intent(
            &mut conn,
            &PaymentIntent {
                amount_minor,
                currency: currency.clone(),
                gateway,
                reference: reference.clone(),
            },
        )?;
        if outcome.transition == Transition::AlreadyPaid {
            return Err(AppError::BadRequest(format!(
                "This {} is already paid for",
                target.kind().as_ref()
            )));
        }

        queries::upsert_payment(
            &conn,
            &RecordPayment {
                reference: reference.clone(),
                kind: target.kind(),
                user_id: target.user_id().to_string(),
                subject_id: target.subject_id().to_string(),
                slug: target.slug().map(String::from),
                email: Some(email.to_string()),
                gateway,
                amount_minor,
                currency: currency.clone(),
                status: "initialized".to_string(),
            },
        )?;
    }

    // The gateway appends `reference` (and `trxref`) to this URL on redirect.
    let callback_url = format!(
        "{}/payments/verify?slug={}",
        state.base_url,
        urlencoding::encode(target.slug().unwrap_or_default())
    );

    let link = state
        .gateway
        .initialize(&InitializeTransaction {
            email: email.to_string(),
            amount: amount_minor,
            currency: currency.clone(),
            reference: reference.clone(),
            callback_url,
            metadata: target.to_metadata(),
        })
        .await
        .inspect_err(|e| {
            tracing::warn!("Checkout initialization failed for {}: {}", reference, e);
        })?;

    tracing::info!(
        "{} checkout initialized: user={}, subject={}, reference={}, amount={} {}",
        target.kind().as_ref(),
        target.user_id(),
        target.subject_id(),
        link.reference,
        amount_minor,
        currency
    );

    Ok(InitializeResponse {
        ok: true,
        authorization_url: link.authorization_url,
        access_code: link.access_code,
        reference: link.reference,
    })
}
