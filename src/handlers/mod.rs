mod access;
mod callback;
mod checkout;
mod webhooks;

pub use access::*;
pub use callback::*;
pub use checkout::*;
pub use webhooks::*;

use axum::{routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All routes. Pass `None` to skip rate limiting (tests, or a proxy that
/// already limits). Rate limiting keys on the peer IP, so the server must be
/// run with `into_make_service_with_connect_info`.
pub fn router(rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let checkout = Router::new()
        .route("/payments/initialize", post(initialize_course_checkout))
        .route("/payments/ebooks/initialize", post(initialize_ebook_checkout));

    let lookups = Router::new()
        .route("/payments/verify", get(verify_payment))
        .route("/payments/{reference}", get(get_payment))
        .route("/enrollments/{user_id}/{course_id}", get(get_enrollment))
        .route("/ebook-purchases/{user_id}/{ebook_id}", get(get_ebook_purchase));

    let (checkout, lookups) = match rate_limit {
        Some(limits) => (
            checkout.layer(rate_limit::strict_layer(limits.strict_rpm)),
            lookups.layer(rate_limit::standard_layer(limits.standard_rpm)),
        ),
        None => (checkout, lookups),
    };

    Router::new()
        .route("/health", get(health))
        // Signed by the gateway; never rate limited
        .route("/payments/webhook", post(handle_payment_webhook))
        .merge(checkout)
        .merge(lookups)
}
