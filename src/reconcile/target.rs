use rusqlite::Connection;
use serde_json::{json, Value};

use super::{
    CourseSubject, EbookPurchaseKey, EbookSubject, EnrollmentKey, GatewayFacts, Outcome,
    PaymentIntent, PaymentReconciler,
};
use crate::error::{AppError, Result};
use crate::models::{PurchaseKind, RecordPayment};

/// The subject a payment is for, decoded from gateway metadata.
///
/// Metadata `{kind, user_id, course_id|ebook_id, slug}` is sent on every
/// initialize call and echoed back by verify and webhook; it is the only link
/// from a gateway notification to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseTarget {
    Course {
        key: EnrollmentKey,
        slug: Option<String>,
    },
    Ebook {
        key: EbookPurchaseKey,
        slug: Option<String>,
    },
}

/// Metadata values may arrive as strings or numbers depending on who built them.
fn field(metadata: &Value, name: &str) -> Option<String> {
    match metadata.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require(metadata: &Value, name: &str) -> Result<String> {
    field(metadata, name).ok_or_else(|| AppError::MissingMetadata(format!("metadata.{} is missing", name)))
}

impl PurchaseTarget {
    pub fn course(user_id: &str, course_id: &str, slug: &str) -> Self {
        PurchaseTarget::Course {
            key: EnrollmentKey {
                user_id: user_id.to_string(),
                course_id: course_id.to_string(),
            },
            slug: Some(slug.to_string()),
        }
    }

    pub fn ebook(user_id: &str, ebook_id: &str, slug: &str) -> Self {
        PurchaseTarget::Ebook {
            key: EbookPurchaseKey {
                user_id: user_id.to_string(),
                ebook_id: ebook_id.to_string(),
            },
            slug: Some(slug.to_string()),
        }
    }

    /// Decode gateway metadata. Fails closed with `MissingMetadata` when the
    /// subject cannot be identified.
    ///
    /// Metadata without `kind` but with a `course_id` is treated as a course.
    pub fn from_metadata(metadata: &Value) -> Result<Self> {
        if !metadata.is_object() {
            return Err(AppError::MissingMetadata("metadata is absent".into()));
        }

        let kind = match field(metadata, "kind") {
            Some(kind) => kind
                .parse::<PurchaseKind>()
                .map_err(|_| AppError::MissingMetadata(format!("unknown metadata.kind {:?}", kind)))?,
            None if metadata.get("course_id").is_some() => PurchaseKind::Course,
            None => return Err(AppError::MissingMetadata("metadata.kind is missing".into())),
        };

        let user_id = require(metadata, "user_id")?;
        let slug = field(metadata, "slug");

        Ok(match kind {
            PurchaseKind::Course => PurchaseTarget::Course {
                key: EnrollmentKey {
                    user_id,
                    course_id: require(metadata, "course_id")?,
                },
                slug,
            },
            PurchaseKind::Ebook => PurchaseTarget::Ebook {
                key: EbookPurchaseKey {
                    user_id,
                    ebook_id: require(metadata, "ebook_id")?,
                },
                slug,
            },
        })
    }

    /// Metadata to attach to the gateway initialize call.
    pub fn to_metadata(&self) -> Value {
        match self {
            PurchaseTarget::Course { key, slug } => json!({
                "kind": PurchaseKind::Course.as_ref(),
                "user_id": key.user_id,
                "course_id": key.course_id,
                "slug": slug,
            }),
            PurchaseTarget::Ebook { key, slug } => json!({
                "kind": PurchaseKind::Ebook.as_ref(),
                "user_id": key.user_id,
                "ebook_id": key.ebook_id,
                "slug": slug,
            }),
        }
    }

    pub fn kind(&self) -> PurchaseKind {
        match self {
            PurchaseTarget::Course { .. } => PurchaseKind::Course,
            PurchaseTarget::Ebook { .. } => PurchaseKind::Ebook,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            PurchaseTarget::Course { key, .. } => &key.user_id,
            PurchaseTarget::Ebook { key, .. } => &key.user_id,
        }
    }

    /// course_id or ebook_id
    pub fn subject_id(&self) -> &str {
        match self {
            PurchaseTarget::Course { key, .. } => &key.course_id,
            PurchaseTarget::Ebook { key, .. } => &key.ebook_id,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            PurchaseTarget::Course { slug, .. } | PurchaseTarget::Ebook { slug, .. } => {
                slug.as_deref()
            }
        }
    }

    pub fn record_intent(&self, conn: &mut Connection, intent: &PaymentIntent) -> Result<Outcome> {
        match self {
            PurchaseTarget::Course { key, .. } => {
                PaymentReconciler::<CourseSubject>::record_intent(conn, key, intent)
            }
            PurchaseTarget::Ebook { key, .. } => {
                PaymentReconciler::<EbookSubject>::record_intent(conn, key, intent)
            }
        }
    }

    pub fn apply(&self, conn: &mut Connection, facts: &GatewayFacts) -> Result<Outcome> {
        match self {
            PurchaseTarget::Course { key, .. } => {
                PaymentReconciler::<CourseSubject>::apply(conn, key, facts)
            }
            PurchaseTarget::Ebook { key, .. } => {
                PaymentReconciler::<EbookSubject>::apply(conn, key, facts)
            }
        }
    }

    pub fn apply_recorded(
        &self,
        conn: &mut Connection,
        facts: &GatewayFacts,
        ledger: &RecordPayment,
    ) -> Result<Outcome> {
        match self {
            PurchaseTarget::Course { key, .. } => {
                PaymentReconciler::<CourseSubject>::apply_recorded(conn, key, facts, ledger)
            }
            PurchaseTarget::Ebook { key, .. } => {
                PaymentReconciler::<EbookSubject>::apply_recorded(conn, key, facts, ledger)
            }
        }
    }
}
