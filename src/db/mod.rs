mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::gateway::GatewayClient;
use crate::notify::Notifier;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state: the datastore handle and external collaborators,
/// passed explicitly to each component (no ambient globals).
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub gateway: Arc<GatewayClient>,
    pub notifier: Arc<dyn Notifier>,
    /// Shared server secret for notification signature verification
    pub server_key: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        // Orders, payments and subscriptions cross-reference each other;
        // foreign keys are load-bearing for the ledger's integrity.
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(10).build(manager)
}
