use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::Gateway;
use crate::reconcile::PaymentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EbookPurchaseStatus {
    /// Checkout started, no gateway outcome observed yet
    Pending,
    Paid,
    /// Last gateway outcome was not a success. The buyer may retry.
    Failed,
}

/// One user's purchase of one e-book. Unique on `(user_id, ebook_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbookPurchase {
    pub user_id: String,
    pub ebook_id: String,
    pub status: EbookPurchaseStatus,
    pub paid_at: Option<i64>,
    pub currency: String,
    pub amount_minor: i64,
    pub gateway: Gateway,
    pub gateway_reference: Option<String>,
    pub gateway_status: Option<String>,
    pub last_webhook_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EbookPurchaseStatus {
    /// `paid` once paid, `failed` once the gateway reports `failed` or `abandoned`,
    /// `pending` otherwise (no report yet, or one still in flight such as `ongoing`).
    pub fn from_state(state: &PaymentState) -> Self {
        if state.paid {
            return Self::Paid;
        }
        match state.gateway_status.as_deref() {
            Some(status)
                if status.eq_ignore_ascii_case("failed")
                    || status.eq_ignore_ascii_case("abandoned") =>
            {
                Self::Failed
            }
            _ => Self::Pending,
        }
    }
}

impl EbookPurchase {
    pub fn payment_state(&self) -> PaymentState {
        PaymentState {
            paid: self.status == EbookPurchaseStatus::Paid,
            paid_at: self.paid_at,
            amount_minor: self.amount_minor,
            currency: self.currency.clone(),
            gateway: self.gateway,
            gateway_reference: self.gateway_reference.clone(),
            gateway_status: self.gateway_status.clone(),
            last_webhook_at: self.last_webhook_at,
        }
    }
}
