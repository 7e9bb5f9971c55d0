//! Persistence for the ledger.
//!
//! [`LedgerStore`] is the seam between the ledger and storage.
//! [`PgLedgerStore`] persists to PostgreSQL through sqlx and
//! [`InMemoryLedgerStore`] keeps everything in process memory.
//! [`Database`] owns the PostgreSQL pool the stores draw from.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::ledger::LedgerResult;

pub mod config;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use config::DatabaseConfig;
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use repository::LedgerStore;

/// PostgreSQL pool shared by every store handed out
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open the pool and apply the ledger schema
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wager_ledger::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), wager_ledger::LedgerError> {
    ///     let db = Database::connect(&DatabaseConfig::from_env()).await?;
    ///     let store = db.ledger_store();
    ///     db.close().await;
    ///     # let _ = store;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &DatabaseConfig) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        let db = Self { pool };
        db.ledger_store().migrate().await?;
        log::info!(
            "Ledger database ready ({}..={} connections)",
            config.min_connections,
            config.max_connections
        );
        Ok(db)
    }

    /// Ledger store sharing this pool
    pub fn ledger_store(&self) -> PgLedgerStore {
        PgLedgerStore::new(self.pool.clone())
    }

    /// Wait for in-flight queries, then close every connection
    pub async fn close(self) {
        self.pool.close().await;
        log::info!("Ledger database pool closed");
    }
}
