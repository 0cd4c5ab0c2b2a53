//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors
/// instead of panicking on unexpected values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ENROLLMENT_COLS: &str = "user_id, course_id, paid, paid_at, currency, amount_minor, gateway, gateway_reference, gateway_status, last_webhook_at, created_at, updated_at";

pub const EBOOK_PURCHASE_COLS: &str = "user_id, ebook_id, status, paid_at, currency, amount_minor, gateway, gateway_reference, gateway_status, last_webhook_at, created_at, updated_at";

pub const PAYMENT_COLS: &str = "reference, kind, user_id, subject_id, slug, email, gateway, amount_minor, currency, status, created_at, updated_at";

pub const WEBHOOK_EVENT_COLS: &str = "id, gateway, event, reference, received_at";

// ============ FromRow Implementations ============

impl FromRow for Enrollment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            user_id: row.get(0)?,
            course_id: row.get(1)?,
            paid: row.get::<_, i32>(2)? != 0,
            paid_at: row.get(3)?,
            currency: row.get(4)?,
            amount_minor: row.get(5)?,
            gateway: parse_enum(row, 6, "gateway")?,
            gateway_reference: row.get(7)?,
            gateway_status: row.get(8)?,
            last_webhook_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for EbookPurchase {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EbookPurchase {
            user_id: row.get(0)?,
            ebook_id: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            paid_at: row.get(3)?,
            currency: row.get(4)?,
            amount_minor: row.get(5)?,
            gateway: parse_enum(row, 6, "gateway")?,
            gateway_reference: row.get(7)?,
            gateway_status: row.get(8)?,
            last_webhook_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            reference: row.get(0)?,
            kind: parse_enum(row, 1, "kind")?,
            user_id: row.get(2)?,
            subject_id: row.get(3)?,
            slug: row.get(4)?,
            email: row.get(5)?,
            gateway: parse_enum(row, 6, "gateway")?,
            amount_minor: row.get(7)?,
            currency: row.get(8)?,
            status: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for WebhookEventRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEventRecord {
            id: row.get(0)?,
            gateway: parse_enum(row, 1, "gateway")?,
            event: row.get(2)?,
            reference: row.get(3)?,
            received_at: row.get(4)?,
        })
    }
}
