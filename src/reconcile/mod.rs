//! Paid-state reconciliation shared by course enrollments and e-book purchases.
//!
//! Two independent paths report on a charge: the browser callback (followed by a
//! server-side verify) and the signed webhook. Either may arrive first, twice, or
//! not at all. Both feed the same [`GatewayFacts`] through [`reconcile`], a pure
//! function whose output only depends on the stored state and the authoritative
//! gateway facts, so every order of delivery converges:
//!
//! ```text
//! NO_RECORD --initialize--> INTENT_RECORDED --success--> PAID --any--> PAID
//!                               |   ^
//!                               +---+ failed / abandoned (bookkeeping only)
//! ```

mod subject;
mod target;

pub use subject::*;
pub use target::*;

use serde::Serialize;

use crate::models::Gateway;
use crate::payments::ChargeReport;

/// Which path delivered the facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    Callback,
    Webhook,
}

/// Payment-relevant columns of a subject row (enrollment or e-book purchase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentState {
    pub paid: bool,
    pub paid_at: Option<i64>,
    pub amount_minor: i64,
    pub currency: String,
    pub gateway: Gateway,
    pub gateway_reference: Option<String>,
    pub gateway_status: Option<String>,
    pub last_webhook_at: Option<i64>,
}

/// What a checkout asked for, recorded before the buyer is sent to the gateway.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub amount_minor: i64,
    pub currency: String,
    pub gateway: Gateway,
    pub reference: String,
}

/// Authoritative facts about one charge, as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayFacts {
    pub gateway: Gateway,
    pub reference: String,
    pub status: String,
    pub success: bool,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_at: Option<i64>,
    pub source: NotificationSource,
    /// When this service received the facts (unix seconds)
    pub observed_at: i64,
}

impl GatewayFacts {
    pub fn from_charge(
        gateway: Gateway,
        charge: &ChargeReport,
        source: NotificationSource,
        observed_at: i64,
    ) -> Self {
        Self {
            gateway,
            reference: charge.reference.clone(),
            status: charge.status.clone(),
            success: charge.is_success(),
            amount_minor: charge.amount_minor,
            currency: charge.currency.clone(),
            paid_at: charge.paid_at,
            source,
            observed_at,
        }
    }
}

/// Record (or refresh) the checkout intent. A paid record is returned unchanged.
pub fn record_intent(current: Option<&PaymentState>, intent: &PaymentIntent) -> PaymentState {
    match current {
        Some(state) if state.paid => state.clone(),
        _ => PaymentState {
            paid: false,
            paid_at: None,
            amount_minor: intent.amount_minor,
            currency: intent.currency.clone(),
            gateway: intent.gateway,
            gateway_reference: Some(intent.reference.clone()),
            gateway_status: None,
            last_webhook_at: current.and_then(|s| s.last_webhook_at),
        },
    }
}

/// Compute the next state from the stored state and gateway facts.
///
/// Returns `None` when nothing should be written: a non-success report for a
/// subject with no intent on record.
pub fn reconcile(current: Option<&PaymentState>, facts: &GatewayFacts) -> Option<PaymentState> {
    let last_webhook_at = match facts.source {
        NotificationSource::Webhook => Some(facts.observed_at),
        NotificationSource::Callback => current.and_then(|s| s.last_webhook_at),
    };

    match current {
        // PAID is terminal: first confirmation wins, later deliveries only touch timestamps.
        Some(state) if state.paid => Some(PaymentState {
            last_webhook_at,
            ..state.clone()
        }),
        _ if facts.success => Some(PaymentState {
            paid: true,
            paid_at: Some(facts.paid_at.unwrap_or(facts.observed_at)),
            amount_minor: facts.amount_minor,
            currency: facts.currency.clone(),
            gateway: facts.gateway,
            gateway_reference: Some(facts.reference.clone()),
            gateway_status: Some(facts.status.clone()),
            last_webhook_at,
        }),
        Some(state) => Some(PaymentState {
            gateway_reference: Some(facts.reference.clone()),
            gateway_status: Some(facts.status.clone()),
            last_webhook_at,
            ..state.clone()
        }),
        None => None,
    }
}
