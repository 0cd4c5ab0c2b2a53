use axum::{extract::State, response::Redirect};
use chrono::Utc;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::Query;
use crate::models::RecordPayment;
use crate::payments::ChargeReport;
use crate::reconcile::{GatewayFacts, NotificationSource, PurchaseTarget};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub reference: Option<String>,
    /// Paystack sends the reference twice; `trxref` is the legacy name.
    #[serde(default)]
    pub trxref: Option<String>,
    /// Set by us on the callback URL at initialize time
    #[serde(default)]
    pub slug: Option<String>,
}

impl CallbackQuery {
    fn reference(&self) -> Option<&str> {
        [self.reference.as_deref(), self.trxref.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|r| !r.is_empty())
    }
}

/// GET /payments/verify - browser lands here after the hosted checkout.
///
/// The query string is untrusted: the charge is looked up server-to-server and
/// only the gateway's answer is reconciled. On success the buyer is redirected
/// to the purchased content.
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let reference = query
        .reference()
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_REFERENCE.into()))?
        .to_string();

    let charge = state.gateway.verify(&reference).await?;
    let facts = GatewayFacts::from_charge(
        state.gateway.gateway(),
        &charge,
        NotificationSource::Callback,
        Utc::now().timestamp(),
    );

    if !charge.is_success() {
        // Bookkeeping only; an unidentifiable failed charge has nothing to update.
        match PurchaseTarget::from_metadata(&charge.metadata) {
            Ok(target) => {
                let mut conn = state.db.get()?;
                target.apply_recorded(&mut conn, &facts, &ledger_row(&state, &target, &charge))?;
            }
            Err(e) => tracing::debug!("Unsuccessful charge {} not correlated: {}", reference, e),
        }

        tracing::info!("Payment {} not successful: status={}", reference, charge.status);
        return Err(AppError::PaymentNotSuccessful {
            status: charge.status,
        });
    }

    let target = PurchaseTarget::from_metadata(&charge.metadata).inspect_err(|e| {
        tracing::warn!("Successful charge {} has unusable metadata: {}", reference, e);
    })?;
    let slug = target
        .slug()
        .or(query.slug.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::MissingMetadata(format!("metadata.slug is missing for {}", reference)))?
        .to_string();

    let outcome = {
        let mut conn = state.db.get()?;
        target
            .apply_recorded(&mut conn, &facts, &ledger_row(&state, &target, &charge))
            .map_err(|e| {
                tracing::error!("Failed to record paid charge {}: {}", reference, e);
                AppError::PersistenceFailed {
                    reference: reference.clone(),
                }
            })?
    };

    tracing::info!(
        "Callback confirmed {} {} for user {} ({:?})",
        target.kind().as_ref(),
        target.subject_id(),
        target.user_id(),
        outcome.transition
    );

    let base = match target {
        PurchaseTarget::Course { .. } => &state.dashboard_url,
        PurchaseTarget::Ebook { .. } => &state.library_url,
    };
    let redirect_url = append_query_params(
        &format!("{}/{}", base.trim_end_matches('/'), urlencoding::encode(&slug)),
        &[("status", "success"), ("reference", &reference)],
    );

    Ok(Redirect::temporary(&redirect_url))
}

/// The payment ledger's view of a charge as the gateway reported it.
pub(super) fn ledger_row(
    state: &AppState,
    target: &PurchaseTarget,
    charge: &ChargeReport,
) -> RecordPayment {
    RecordPayment {
        reference: charge.reference.clone(),
        kind: target.kind(),
        user_id: target.user_id().to_string(),
        subject_id: target.subject_id().to_string(),
        slug: target.slug().map(String::from),
        email: charge.customer_email.clone(),
        gateway: state.gateway.gateway(),
        amount_minor: charge.amount_minor,
        currency: charge.currency.clone(),
        status: charge.status.to_lowercase(),
    }
}

/// Append query parameters to a URL
fn append_query_params(base_url: &str, params: &[(&str, &str)]) -> String {
    let query_string: String = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    if base_url.contains('?') {
        format!("{}&{}", base_url, query_string)
    } else {
        format!("{}?{}", base_url, query_string)
    }
}
