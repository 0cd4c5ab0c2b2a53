use serde::{Deserialize, Serialize};

use super::Gateway;
use crate::reconcile::PaymentState;

/// One user's relationship to one course. Unique on `(user_id, course_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: String,
    pub course_id: String,
    pub paid: bool,
    pub paid_at: Option<i64>,
    pub currency: String,
    pub amount_minor: i64,
    pub gateway: Gateway,
    pub gateway_reference: Option<String>,
    /// Raw status string last echoed by the gateway
    pub gateway_status: Option<String>,
    pub last_webhook_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Enrollment {
    pub fn payment_state(&self) -> PaymentState {
        PaymentState {
            paid: self.paid,
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
