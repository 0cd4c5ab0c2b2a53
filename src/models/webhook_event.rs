use serde::Serialize;

use super::Gateway;

/// An authenticated webhook delivery, kept for troubleshooting until purged.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEventRecord {
    pub id: i64,
    pub gateway: Gateway,
    pub event: String,
    pub reference: Option<String>,
    pub received_at: i64,
}
