mod currency;
mod paystack;
mod reference;

pub use currency::*;
pub use paystack::*;
pub use reference::*;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::Gateway;

/// Gateway status string for a settled charge.
pub const STATUS_SUCCESS: &str = "success";

/// Everything the gateway needs to open a hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeTransaction {
    pub email: String,
    /// Minor units (pesewas, kobo, cents)
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: serde_json::Value,
}

/// Hosted checkout returned by the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutLink {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Authoritative view of one charge, from either a verify call or a webhook body.
#[derive(Debug, Clone)]
pub struct ChargeReport {
    pub reference: String,
    /// Raw gateway status: `success`, `failed`, `abandoned`, ...
    pub status: String,
    pub amount_minor: i64,
    pub currency: String,
    /// When the gateway settled the charge (unix seconds)
    pub paid_at: Option<i64>,
    pub customer_email: Option<String>,
    /// Metadata echoed back from initialization, unparsed
    pub metadata: serde_json::Value,
}

impl ChargeReport {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }
}

/// Parsed webhook notification.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// `charge.success` - the only event that changes state
    ChargeSucceeded(ChargeReport),
    /// Any other event type; logged and acknowledged
    Other {
        event: String,
        reference: Option<String>,
    },
}

impl GatewayEvent {
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::ChargeSucceeded(_) => "charge.success",
            GatewayEvent::Other { event, .. } => event,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            GatewayEvent::ChargeSucceeded(charge) => Some(&charge.reference),
            GatewayEvent::Other { reference, .. } => reference.as_deref(),
        }
    }
}

/// Hosted payment processor.
///
/// Held by `AppState` as `Arc<dyn PaymentGateway>` so handlers never reach for a
/// global client and tests can substitute a scripted gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn gateway(&self) -> Gateway;

    /// Header carrying the webhook signature (e.g. `x-paystack-signature`).
    fn signature_header(&self) -> &'static str;

    async fn initialize(&self, request: &InitializeTransaction) -> Result<CheckoutLink>;

    /// Server-to-server lookup of a reference. Never trust client-supplied status.
    async fn verify(&self, reference: &str) -> Result<ChargeReport>;

    /// Check the signature over the raw, unparsed body.
    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool>;

    /// Parse a body whose signature has already been verified.
    fn parse_webhook(&self, payload: &[u8]) -> Result<GatewayEvent>;
}
