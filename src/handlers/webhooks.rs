//! Signed gateway notifications.
//!
//! Status codes drive the gateway's redelivery: anything but 2xx is retried, so
//! a charge we could not correlate or persist answers 500, and events we choose
//! to ignore answer 200.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, msg};
use crate::payments::{ChargeReport, GatewayEvent};
use crate::reconcile::{GatewayFacts, NotificationSource, PurchaseTarget};

use super::callback::ledger_row;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub type WebhookResult = (StatusCode, Json<WebhookAck>);

fn ack() -> WebhookResult {
    (StatusCode::OK, Json(WebhookAck { ok: true, message: None }))
}

fn reject(status: StatusCode, message: &'static str) -> WebhookResult {
    (
        status,
        Json(WebhookAck {
            ok: false,
            message: Some(message),
        }),
    )
}

/// POST /payments/webhook
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = headers
        .get(state.gateway.signature_header())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let valid = match state
        .gateway
        .verify_webhook_signature(&body, signature.unwrap_or_default())
    {
        Ok(valid) => valid,
        Err(AppError::NotConfigured(what)) => {
            tracing::error!("Webhook received but {}", what.to_lowercase());
            return reject(StatusCode::SERVICE_UNAVAILABLE, msg::WEBHOOK_SECRET_NOT_CONFIGURED);
        }
        Err(e) => {
            tracing::error!("Webhook signature check failed: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Signature check failed");
        }
    };

    if signature.is_none() {
        tracing::warn!("Webhook without {} header", state.gateway.signature_header());
        return reject(StatusCode::BAD_REQUEST, "Missing signature header");
    }
    if !valid {
        tracing::warn!("Webhook signature mismatch ({} bytes)", body.len());
        return reject(StatusCode::UNAUTHORIZED, msg::INVALID_WEBHOOK_SECRET);
    }

    let event = match state.gateway.parse_webhook(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Signed webhook body could not be parsed: {}", e);
            return reject(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("DB pool error: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    if let Err(e) =
        queries::record_webhook_event(&conn, state.gateway.gateway(), event.name(), event.reference())
    {
        tracing::error!("Failed to log webhook event {}: {}", event.name(), e);
        return reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
    }

    match event {
        GatewayEvent::ChargeSucceeded(charge) => {
            match apply_charge(&mut conn, &state, &charge) {
                Ok(()) => ack(),
                Err(result) => result,
            }
        }
        GatewayEvent::Other { event, reference } => {
            tracing::info!(
                "Ignoring webhook event {} (reference {})",
                event,
                reference.as_deref().unwrap_or("-")
            );
            ack()
        }
    }
}

fn apply_charge(
    conn: &mut rusqlite::Connection,
    state: &AppState,
    charge: &ChargeReport,
) -> Result<(), WebhookResult> {
    let target = PurchaseTarget::from_metadata(&charge.metadata).map_err(|e| {
        tracing::warn!("charge.success {} cannot be correlated: {}", charge.reference, e);
        reject(StatusCode::INTERNAL_SERVER_ERROR, "Missing payment metadata")
    })?;

    let facts = GatewayFacts::from_charge(
        state.gateway.gateway(),
        charge,
        NotificationSource::Webhook,
        Utc::now().timestamp(),
    );

    let outcome = target
        .apply_recorded(conn, &facts, &ledger_row(state, &target, charge))
        .map_err(|e| {
            tracing::error!("Failed to record webhook charge {}: {}", charge.reference, e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        })?;

    tracing::info!(
        "Webhook confirmed {} {} for user {} ({:?})",
        target.kind().as_ref(),
        target.subject_id(),
        target.user_id(),
        outcome.transition
    );

    Ok(())
}
