use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Payment processor that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gateway {
    Paystack,
}

/// What a checkout pays for. Travels to the gateway as `metadata.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PurchaseKind {
    Course,
    Ebook,
}

/// Ledger row for one gateway reference.
///
/// Written when a checkout is initialized and refreshed every time the gateway
/// reports on the reference. Bookkeeping only: enrollments are correlated through
/// gateway metadata, never through this table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub reference: String,
    pub kind: PurchaseKind,
    pub user_id: String,
    /// course_id or ebook_id depending on `kind`
    pub subject_id: String,
    pub slug: Option<String>,
    pub email: Option<String>,
    pub gateway: Gateway,
    pub amount_minor: i64,
    pub currency: String,
    /// `initialized`, then the raw status last reported by the gateway
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub reference: String,
    pub kind: PurchaseKind,
    pub user_id: String,
    pub subject_id: String,
    pub slug: Option<String>,
    pub email: Option<String>,
    pub gateway: Gateway,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
}
