use chrono::Utc;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::models::*;
use crate::reconcile::PaymentState;

use super::from_row::{
    EBOOK_PURCHASE_COLS, ENROLLMENT_COLS, PAYMENT_COLS, WEBHOOK_EVENT_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Enrollments ============

pub fn get_enrollment(conn: &Connection, user_id: &str, course_id: &str) -> Result<Option<Enrollment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
            ENROLLMENT_COLS
        ),
        &[&user_id, &course_id],
    )
}

/// Insert-or-update the payment state of an enrollment keyed on `(user_id, course_id)`.
///
/// The `WHERE` guard makes the store itself refuse to turn a paid row unpaid, even
/// if a caller hands it a stale state.
pub fn upsert_enrollment(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    state: &PaymentState,
) -> Result<()> {
    let now = now();
    conn.execute(
        "INSERT INTO enrollments (user_id, course_id, paid, paid_at, currency, amount_minor, gateway,
                                  gateway_reference, gateway_status, last_webhook_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(user_id, course_id) DO UPDATE SET
             paid = excluded.paid,
             paid_at = excluded.paid_at,
             currency = excluded.currency,
             amount_minor = excluded.amount_minor,
             gateway = excluded.gateway,
             gateway_reference = excluded.gateway_reference,
             gateway_status = excluded.gateway_status,
             last_webhook_at = excluded.last_webhook_at,
             updated_at = excluded.updated_at
         WHERE enrollments.paid = 0 OR excluded.paid = 1",
        params![
            user_id,
            course_id,
            state.paid as i32,
            state.paid_at,
            &state.currency,
            state.amount_minor,
            state.gateway.as_ref(),
            &state.gateway_reference,
            &state.gateway_status,
            state.last_webhook_at,
            now,
        ],
    )?;
    Ok(())
}

// ============ Ebook Purchases ============

pub fn get_ebook_purchase(
    conn: &Connection,
    user_id: &str,
    ebook_id: &str,
) -> Result<Option<EbookPurchase>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM ebook_purchases WHERE user_id = ?1 AND ebook_id = ?2",
            EBOOK_PURCHASE_COLS
        ),
        &[&user_id, &ebook_id],
    )
}

/// Insert-or-update an e-book purchase keyed on `(user_id, ebook_id)`.
/// A `paid` row is never moved to another status.
pub fn upsert_ebook_purchase(
    conn: &Connection,
    user_id: &str,
    ebook_id: &str,
    state: &PaymentState,
) -> Result<()> {
    let now = now();
    let status = EbookPurchaseStatus::from_state(state);
    conn.execute(
        "INSERT INTO ebook_purchases (user_id, ebook_id, status, paid_at, currency, amount_minor, gateway,
                                      gateway_reference, gateway_status, last_webhook_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(user_id, ebook_id) DO UPDATE SET
             status = excluded.status,
             paid_at = excluded.paid_at,
             currency = excluded.currency,
             amount_minor = excluded.amount_minor,
             gateway = excluded.gateway,
             gateway_reference = excluded.gateway_reference,
             gateway_status = excluded.gateway_status,
             last_webhook_at = excluded.last_webhook_at,
             updated_at = excluded.updated_at
         WHERE ebook_purchases.status != 'paid' OR excluded.status = 'paid'",
        params![
            user_id,
            ebook_id,
            status.as_ref(),
            state.paid_at,
            &state.currency,
            state.amount_minor,
            state.gateway.as_ref(),
            &state.gateway_reference,
            &state.gateway_status,
            state.last_webhook_at,
            now,
        ],
    )?;
    Ok(())
}

// ============ Payment Ledger ============

/// Record a checkout attempt or refresh it with the latest gateway report.
pub fn upsert_payment(conn: &Connection, input: &RecordPayment) -> Result<()> {
    let now = now();
    conn.execute(
        "INSERT INTO payments (reference, kind, user_id, subject_id, slug, email, gateway,
                               amount_minor, currency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
         ON CONFLICT(reference) DO UPDATE SET
             slug = COALESCE(excluded.slug, payments.slug),
             email = COALESCE(excluded.email, payments.email),
             amount_minor = excluded.amount_minor,
             currency = excluded.currency,
             status = excluded.status,
             updated_at = excluded.updated_at",
        params![
            &input.reference,
            input.kind.as_ref(),
            &input.user_id,
            &input.subject_id,
            &input.slug,
            &input.email,
            input.gateway.as_ref(),
            input.amount_minor,
            &input.currency,
            &input.status,
            now,
        ],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, reference: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE reference = ?1", PAYMENT_COLS),
        &[&reference],
    )
}

/// Checkout attempts for one subject, newest first.
pub fn list_payments_for_subject(
    conn: &Connection,
    kind: PurchaseKind,
    user_id: &str,
    subject_id: &str,
) -> Result<Vec<Payment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE kind = ?1 AND user_id = ?2 AND subject_id = ?3
             ORDER BY created_at DESC, reference DESC",
            PAYMENT_COLS
        ),
        &[&kind.as_ref(), &user_id, &subject_id],
    )
}

// ============ Webhook Event Log ============

pub fn record_webhook_event(
    conn: &Connection,
    gateway: Gateway,
    event: &str,
    reference: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO webhook_events (gateway, event, reference, received_at) VALUES (?1, ?2, ?3, ?4)",
        params![gateway.as_ref(), event, reference, now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_webhook_events_for_reference(
    conn: &Connection,
    reference: &str,
) -> Result<Vec<WebhookEventRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE reference = ?1 ORDER BY id",
            WEBHOOK_EVENT_COLS
        ),
        &[&reference],
    )
}

/// Delete webhook log entries older than the retention period.
/// Returns the number of deleted records.
pub fn purge_old_webhook_events(conn: &Connection, retention_days: i64) -> Result<usize> {
    let cutoff = now() - (retention_days * 86400);
    let deleted = conn.execute(
        "DELETE FROM webhook_events WHERE received_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
