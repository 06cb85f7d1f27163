//! Service context
//!
//! Shared database access for the engine services, plus the lookups every
//! atomic unit needs.

use crate::error::{EngineError, EngineResult, Entity};
use crate::hierarchy::HierarchyDirectory;
use crate::ledger::LedgerStore;
use crate::permission::PermissionEngine;
use crate::provisioner::ResourceProvisioner;
use crate::roles::RoleService;
use crate::transfer::TransferWorkflow;
use qrcredit_core::Account;
use qrcredit_persistence::{AccountRepo, Database, DatabaseConfig};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

/// Context for engine operations - owns the connection pool
#[derive(Clone)]
pub struct ServiceContext {
    db: Database,
}

impl ServiceContext {
    /// Create new service context from database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect, migrate, and wrap in one step
    pub async fn connect(config: &DatabaseConfig) -> EngineResult<Self> {
        Ok(Self::new(Database::connect(config).await?))
    }

    /// Get database pool
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Start an atomic unit. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> EngineResult<Transaction<'static, Sqlite>> {
        Ok(self.pool().begin().await?)
    }

    pub fn hierarchy(&self) -> HierarchyDirectory<'_> {
        HierarchyDirectory::new(self)
    }

    pub fn ledger(&self) -> LedgerStore<'_> {
        LedgerStore::new(self)
    }

    pub fn permissions(&self) -> PermissionEngine<'_> {
        PermissionEngine::new(self)
    }

    pub fn roles(&self) -> RoleService<'_> {
        RoleService::new(self)
    }

    pub fn provisioner(&self) -> ResourceProvisioner<'_> {
        ResourceProvisioner::new(self)
    }

    pub fn transfers(&self) -> TransferWorkflow<'_> {
        TransferWorkflow::new(self)
    }
}

/// Load an account inside an open unit
pub(crate) async fn load_account(conn: &mut SqliteConnection, id: &str) -> EngineResult<Account> {
    let row = AccountRepo::find(&mut *conn, id)
        .await?
        .ok_or_else(|| EngineError::not_found(Entity::Account, id))?;
    Ok(Account::try_from(row)?)
}
