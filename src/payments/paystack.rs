use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use super::{ChargeReport, CheckoutLink, GatewayEvent, InitializeTransaction, PaymentGateway};
use crate::config::PaystackConfig;
use crate::error::{AppError, Result, msg};
use crate::models::Gateway;

type HmacSha512 = Hmac<Sha512>;

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

const CHARGE_SUCCESS_EVENT: &str = "charge.success";

/// Every Paystack API response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    callback_url: &'a str,
    metadata: &'a serde_json::Value,
}

/// Transaction object shared by `/transaction/verify` and webhook bodies.
#[derive(Debug, Deserialize)]
pub struct PaystackTransaction {
    pub reference: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub paid_at: Option<String>,
    /// Some payloads carry `paidAt` next to, or instead of, `paid_at`.
    #[serde(default, rename = "paidAt")]
    pub paid_at_camel: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub customer: Option<PaystackCustomer>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackCustomer {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl From<PaystackTransaction> for ChargeReport {
    fn from(tx: PaystackTransaction) -> Self {
        let paid_at = tx
            .paid_at
            .or(tx.paid_at_camel)
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp());

        ChargeReport {
            reference: tx.reference,
            status: tx.status,
            amount_minor: tx.amount,
            currency: tx.currency.to_ascii_uppercase(),
            paid_at,
            customer_email: tx.customer.and_then(|c| c.email),
            metadata: normalize_metadata(tx.metadata),
        }
    }
}

/// Paystack echoes metadata either as an object or, when it was sent as a
/// string, as a JSON-encoded string.
fn normalize_metadata(metadata: serde_json::Value) -> serde_json::Value {
    match metadata {
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

/// Parse a webhook body. Only call after the signature has been verified.
pub fn parse_paystack_webhook(payload: &[u8]) -> Result<GatewayEvent> {
    let body: WebhookBody = serde_json::from_slice(payload)?;

    if body.event != CHARGE_SUCCESS_EVENT {
        let reference = body
            .data
            .get("reference")
            .and_then(|r| r.as_str())
            .map(String::from);
        return Ok(GatewayEvent::Other {
            event: body.event,
            reference,
        });
    }

    let tx: PaystackTransaction = serde_json::from_value(body.data)?;
    Ok(GatewayEvent::ChargeSucceeded(tx.into()))
}

/// Compute the hex HMAC-SHA512 Paystack puts in `x-paystack-signature`.
pub fn paystack_signature(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone)]
pub struct PaystackClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
}

impl PaystackClient {
    pub fn new(config: &PaystackConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    fn secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or(AppError::NotConfigured(msg::GATEWAY_NOT_CONFIGURED))
    }

    /// Read a Paystack envelope, turning `status: false` or non-2xx into `AppError::Gateway`.
    async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let http_status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(env) => env,
            Err(e) if http_status.is_success() => {
                return Err(AppError::Internal(format!(
                    "Failed to parse Paystack response: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(AppError::Gateway(format!(
                    "Paystack returned HTTP {}",
                    http_status.as_u16()
                )));
            }
        };

        if !http_status.is_success() || !envelope.status {
            let message = if envelope.message.is_empty() {
                format!("Paystack returned HTTP {}", http_status.as_u16())
            } else {
                envelope.message
            };
            return Err(AppError::Gateway(message));
        }

        envelope
            .data
            .ok_or_else(|| AppError::Internal("Paystack response missing data".into()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    fn gateway(&self) -> Gateway {
        Gateway::Paystack
    }

    fn signature_header(&self) -> &'static str {
        PAYSTACK_SIGNATURE_HEADER
    }

    async fn initialize(&self, request: &InitializeTransaction) -> Result<CheckoutLink> {
        let secret_key = self.secret_key()?;

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.api_base))
            .bearer_auth(secret_key)
            .json(&InitializeBody {
                email: &request.email,
                amount: request.amount,
                currency: &request.currency,
                reference: &request.reference,
                callback_url: &request.callback_url,
                metadata: &request.metadata,
            })
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        let data: InitializeData = Self::read_envelope(response).await?;

        Ok(CheckoutLink {
            authorization_url: data.authorization_url,
            access_code: data.access_code,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<ChargeReport> {
        let secret_key = self.secret_key()?;

        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                self.api_base,
                urlencoding::encode(reference)
            ))
            .bearer_auth(secret_key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Paystack API error: {}", e)))?;

        let tx: PaystackTransaction = Self::read_envelope(response).await?;
        Ok(tx.into())
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(AppError::NotConfigured(msg::WEBHOOK_SECRET_NOT_CONFIGURED))?;

        let expected = paystack_signature(secret, payload)?;
        let provided = signature.trim().to_ascii_lowercase();

        // Length is not secret (always 128 hex chars for SHA-512)
        if expected.len() != provided.len() {
            return Ok(false);
        }

        Ok(expected.as_bytes().ct_eq(provided.as_bytes()).into())
    }

    fn parse_webhook(&self, payload: &[u8]) -> Result<GatewayEvent> {
        parse_paystack_webhook(payload)
    }
}
