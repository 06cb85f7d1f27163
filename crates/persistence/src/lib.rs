//! # QRCredit Persistence
//!
//! SQLite persistence for accounts, the credit log, access roles, QR
//! resources and transfer requests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qrcredit_persistence::{Database, DatabaseConfig, AccountRepo};
//!
//! let db = Database::connect(&DatabaseConfig::from_env()?).await?;
//! let account = AccountRepo::get_by_id(db.pool(), "RET_001").await?;
//!
//! // Atomic unit
//! let mut tx = db.pool().begin().await?;
//! LedgerRepo::debit(&mut *tx, "RET_001", 1).await?;
//! tx.commit().await?;
//! ```

pub mod config;
pub mod error;
pub mod sqlite;

pub use config::DatabaseConfig;
pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::schema::{
    AccountRow, CreditLogRow, NewLogEntry, ResourceRow, RolePermissionRow, RoleRow, TransferRow,
};
pub use sqlite::{
    init_database, AccountRepo, LedgerRepo, ResourceRepo, RoleRepo, TransferRepo,
};

use sqlx::SqlitePool;

/// Database facade
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and run migrations
    pub async fn connect(config: &DatabaseConfig) -> PersistenceResult<Self> {
        let pool = init_database(config).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (schema assumed current)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
