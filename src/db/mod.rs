mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Payment gateway client (Paystack in production)
    pub gateway: Arc<dyn PaymentGateway>,
    /// Base URL for gateway callbacks (e.g., https://api.example.com)
    pub base_url: String,
    /// Currency used when a checkout does not name one
    pub default_currency: String,
    /// Course dashboard root for post-payment redirects
    pub dashboard_url: String,
    /// E-book library root for post-payment redirects
    pub library_url: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    // WAL lets readers proceed while a reconciliation holds the write lock;
    // busy_timeout makes racing callback/webhook writers wait instead of failing.
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(10).build(manager)
}
