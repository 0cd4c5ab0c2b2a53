use rusqlite::Connection;

/// Initialize the database schema. Safe to run on every start.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Course enrollments. One row per (user, course); the reconciliation flow
        -- moves it from intent (paid = 0) to paid and never back.
        CREATE TABLE IF NOT EXISTS enrollments (
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            paid_at INTEGER,
            currency TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            gateway TEXT NOT NULL CHECK (gateway IN ('paystack')),
            gateway_reference TEXT,
            gateway_status TEXT,
            last_webhook_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, course_id),
            CHECK (paid = 0 OR (paid_at IS NOT NULL AND gateway_reference IS NOT NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_enrollments_reference ON enrollments(gateway_reference);

        -- E-book purchases. Same lifecycle, status is the paid discriminator.
        CREATE TABLE IF NOT EXISTS ebook_purchases (
            user_id TEXT NOT NULL,
            ebook_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed')),
            paid_at INTEGER,
            currency TEXT NOT NULL,
            amount_minor INTEGER NOT NULL,
            gateway TEXT NOT NULL CHECK (gateway IN ('paystack')),
            gateway_reference TEXT,
            gateway_status TEXT,
            last_webhook_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, ebook_id),
            CHECK (status != 'paid' OR (paid_at IS NOT NULL AND gateway_reference IS NOT NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_ebook_purchases_reference ON ebook_purchases(gateway_reference);

        -- Gateway reference ledger (bookkeeping, one row per checkout attempt)
        CREATE TABLE IF NOT EXISTS payments (
            reference TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('course', 'ebook')),
            user_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            slug TEXT,
            email TEXT,
            gateway TEXT NOT NULL CHECK (gateway IN ('paystack')),
            amount_minor INTEGER NOT NULL,
            currency TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payments_subject ON payments(kind, user_id, subject_id);

        -- Authenticated webhook deliveries (purged after the retention period)
        CREATE TABLE IF NOT EXISTS webhook_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gateway TEXT NOT NULL,
            event TEXT NOT NULL,
            reference TEXT,
            received_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_received ON webhook_events(received_at);
        "#,
    )?;
    Ok(())
}
