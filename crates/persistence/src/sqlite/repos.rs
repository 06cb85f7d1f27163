//! Repository implementations cho SQLite
//!
//! Single-statement operations are generic over `SqliteExecutor`, so they run
//! against the pool or inside a caller's transaction (`&mut *tx`). Guarded
//! writes report whether their guard matched instead of failing, and the
//! caller decides which domain error that means.

use crate::config::DatabaseConfig;
use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use qrcredit_core::{
    AccessRole, Account, Action, Balance, Permission, Resource, ResourceRecord, ResourceStatus,
    TransferRequest, TransferStatus,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use std::collections::BTreeSet;

// ============================================================================
// Account Repository
// ============================================================================

/// Repository cho accounts table
pub struct AccountRepo;

impl AccountRepo {
    /// Lấy account theo ID
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<AccountRow> {
        Self::find(executor, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Account", id))
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Thêm account mới với balance ban đầu
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account: &Account,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, tier, parent_id, role_id, total, used, available, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account.tier.as_str())
        .bind(&account.parent_id)
        .bind(&account.role_id)
        .bind(account.balance.total)
        .bind(account.balance.used)
        .bind(account.balance.available)
        .bind(account.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Lấy children trực tiếp, mới nhất trước
    pub async fn children<'e, E: SqliteExecutor<'e>>(
        executor: E,
        parent_id: &str,
        limit: u32,
        offset: u64,
    ) -> PersistenceResult<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT * FROM accounts
            WHERE parent_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(parent_id)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn count_children<'e, E: SqliteExecutor<'e>>(
        executor: E,
        parent_id: &str,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE parent_id = ?")
            .bind(parent_id)
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    /// Gán hoặc xóa custom role của account
    pub async fn set_role<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account_id: &str,
        role_id: Option<&str>,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE accounts SET role_id = ? WHERE id = ?")
            .bind(role_id)
            .bind(account_id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Account", account_id));
        }
        Ok(())
    }

    /// Gỡ role khỏi tất cả accounts đang giữ nó
    pub async fn clear_role<'e, E: SqliteExecutor<'e>>(
        executor: E,
        role_id: &str,
    ) -> PersistenceResult<u64> {
        let result = sqlx::query("UPDATE accounts SET role_id = NULL WHERE role_id = ?")
            .bind(role_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_all<'e, E: SqliteExecutor<'e>>(
        executor: E,
    ) -> PersistenceResult<Vec<AccountRow>> {
        let rows = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts ORDER BY created_at")
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }
}

// ============================================================================
// Ledger Repository
// ============================================================================

/// Repository cho balances (trên accounts) và credit_logs table
pub struct LedgerRepo;

impl LedgerRepo {
    /// Add a positive `amount` to total and available.
    ///
    /// `None` when the account does not exist or the total would leave the
    /// i64 range (SQLite would silently turn it into a REAL).
    pub async fn credit<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account_id: &str,
        amount: i64,
    ) -> PersistenceResult<Option<Balance>> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET total = total + ?, available = available + ?
            WHERE id = ? AND total <= 9223372036854775807 - ?
            RETURNING total, used, available
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(account_id)
        .bind(amount)
        .fetch_optional(executor)
        .await?;

        row.map(|(total, used, available)| Balance::from_parts(total, used, available))
            .transpose()
            .map_err(Into::into)
    }

    /// Move `amount` from available to used, only if available covers it.
    ///
    /// `None` when the guard did not match: the account is missing or short.
    pub async fn debit<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account_id: &str,
        amount: i64,
    ) -> PersistenceResult<Option<Balance>> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET used = used + ?, available = available - ?
            WHERE id = ? AND available >= ?
            RETURNING total, used, available
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(account_id)
        .bind(amount)
        .fetch_optional(executor)
        .await?;

        row.map(|(total, used, available)| Balance::from_parts(total, used, available))
            .transpose()
            .map_err(Into::into)
    }

    /// Thêm log entry, trả về sequence number
    pub async fn append<'e, E: SqliteExecutor<'e>>(
        executor: E,
        entry: &NewLogEntry,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO credit_logs (account_id, entry_type, amount, reason, counterparty, resource_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&entry.account_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount)
        .bind(&entry.reason)
        .bind(&entry.counterparty)
        .bind(&entry.resource_id)
        .bind(entry.created_at)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Lấy một page log của account, mới nhất trước
    pub async fn history<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account_id: &str,
        limit: u32,
        offset: u64,
    ) -> PersistenceResult<Vec<CreditLogRow>> {
        let rows = sqlx::query_as::<_, CreditLogRow>(
            r#"
            SELECT * FROM credit_logs
            WHERE account_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Lấy toàn bộ log của account theo thứ tự insert (cho replay)
    pub async fn entries_for_account<'e, E: SqliteExecutor<'e>>(
        executor: E,
        account_id: &str,
    ) -> PersistenceResult<Vec<CreditLogRow>> {
        let rows = sqlx::query_as::<_, CreditLogRow>(
            "SELECT * FROM credit_logs WHERE account_id = ? ORDER BY id ASC",
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn count<'e, E: SqliteExecutor<'e>>(executor: E) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM credit_logs")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Role Repository
// ============================================================================

/// Repository cho access_roles và role_permissions tables
pub struct RoleRepo;

impl RoleRepo {
    pub async fn find_row<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<Option<RoleRow>> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT * FROM access_roles WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn permissions<'e, E: SqliteExecutor<'e>>(
        executor: E,
        role_id: &str,
    ) -> PersistenceResult<Vec<RolePermissionRow>> {
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            "SELECT * FROM role_permissions WHERE role_id = ?",
        )
        .bind(role_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Load a role with its grants. `None` if the role does not exist.
    pub async fn find(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<AccessRole>> {
        let Some(row) = Self::find_row(&mut *conn, id).await? else {
            return Ok(None);
        };

        let mut permissions = BTreeSet::new();
        for p in Self::permissions(&mut *conn, id).await? {
            let resource = Resource::from_str(&p.resource)
                .ok_or_else(|| PersistenceError::invalid_enum("resource", &p.resource))?;
            let action = Action::from_str(&p.action)
                .ok_or_else(|| PersistenceError::invalid_enum("action", &p.action))?;
            permissions.insert(Permission::new(resource, action));
        }

        Ok(Some(AccessRole {
            id: row.id,
            name: row.name,
            is_system: row.is_system,
            permissions,
            created_at: row.created_at,
        }))
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<AccessRole> {
        Self::find(conn, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Role", id))
    }

    /// Thêm role mới cùng các grants
    pub async fn insert(conn: &mut SqliteConnection, role: &AccessRole) -> PersistenceResult<()> {
        sqlx::query("INSERT INTO access_roles (id, name, is_system, created_at) VALUES (?, ?, ?, ?)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(role.is_system)
            .bind(role.created_at)
            .execute(&mut *conn)
            .await?;

        for permission in &role.permissions {
            Self::grant(&mut *conn, &role.id, permission.resource, permission.action).await?;
        }
        Ok(())
    }

    /// Add a grant. Returns false if it was already present.
    pub async fn grant<'e, E: SqliteExecutor<'e>>(
        executor: E,
        role_id: &str,
        resource: Resource,
        action: Action,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO role_permissions (role_id, resource, action) VALUES (?, ?, ?)",
        )
        .bind(role_id)
        .bind(resource.as_str())
        .bind(action.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a grant. Returns false if it was not present.
    pub async fn revoke<'e, E: SqliteExecutor<'e>>(
        executor: E,
        role_id: &str,
        resource: Resource,
        action: Action,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = ? AND resource = ? AND action = ?",
        )
        .bind(role_id)
        .bind(resource.as_str())
        .bind(action.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a non-system role. Returns false if nothing matched.
    pub async fn delete<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query("DELETE FROM access_roles WHERE id = ? AND is_system = 0")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_all<'e, E: SqliteExecutor<'e>>(executor: E) -> PersistenceResult<Vec<RoleRow>> {
        let rows = sqlx::query_as::<_, RoleRow>("SELECT * FROM access_roles ORDER BY name")
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }
}

// ============================================================================
// Resource Repository
// ============================================================================

/// Repository cho resources (QR tags) table
pub struct ResourceRepo;

impl ResourceRepo {
    pub async fn find<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<Option<ResourceRow>> {
        let row = sqlx::query_as::<_, ResourceRow>("SELECT * FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<ResourceRow> {
        Self::find(executor, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Resource", id))
    }

    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        executor: E,
        record: &ResourceRecord,
    ) -> PersistenceResult<()> {
        let payload = record
            .owner_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO resources (id, status, owner_payload, consumed_by, activated_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.status.as_str())
        .bind(payload)
        .bind(&record.consumed_by)
        .bind(record.activated_at)
        .bind(record.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Flip UNUSED -> ACTIVE. Returns false if the row is missing or already active.
    pub async fn claim<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
        actor_id: &str,
        payload: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resources
            SET status = ?, owner_payload = ?, consumed_by = ?, activated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(ResourceStatus::Active.as_str())
        .bind(serde_json::to_string(payload)?)
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .bind(ResourceStatus::Unused.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_by_status<'e, E: SqliteExecutor<'e>>(
        executor: E,
        status: ResourceStatus,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Transfer Repository
// ============================================================================

/// Repository cho transfer_requests table
pub struct TransferRepo;

impl TransferRepo {
    pub async fn insert<'e, E: SqliteExecutor<'e>>(
        executor: E,
        request: &TransferRequest,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfer_requests
                (id, from_account, to_account, amount, external_ref, status, created_at, decided_at, decided_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.from_account)
        .bind(&request.to_account)
        .bind(request.amount)
        .bind(&request.external_ref)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.decided_at)
        .bind(&request.decided_by)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn find<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
    ) -> PersistenceResult<Option<TransferRow>> {
        let row = sqlx::query_as::<_, TransferRow>("SELECT * FROM transfer_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row)
    }

    /// Move a PENDING request to a terminal status. Returns false if the
    /// request is missing or no longer pending.
    pub async fn decide<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: &str,
        status: TransferStatus,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transfer_requests
            SET status = ?, decided_at = ?, decided_by = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status.as_str())
        .bind(at)
        .bind(actor_id)
        .bind(id)
        .bind(TransferStatus::Pending.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lấy requests gửi tới account, mới nhất trước
    pub async fn list_for_recipient<'e, E: SqliteExecutor<'e>>(
        executor: E,
        to_account: &str,
        status: Option<TransferStatus>,
    ) -> PersistenceResult<Vec<TransferRow>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT * FROM transfer_requests
            WHERE to_account = ? AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            "#,
        )
        .bind(to_account)
        .bind(status)
        .bind(status)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Lấy requests do account tạo, mới nhất trước
    pub async fn list_for_requester<'e, E: SqliteExecutor<'e>>(
        executor: E,
        from_account: &str,
    ) -> PersistenceResult<Vec<TransferRow>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT * FROM transfer_requests WHERE from_account = ? ORDER BY created_at DESC",
        )
        .bind(from_account)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Khởi tạo database connection pool
pub async fn create_pool(config: &DatabaseConfig) -> PersistenceResult<SqlitePool> {
    let options = config.connect_options()?;
    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.is_in_memory() {
        // An in-memory database lives as long as its single connection
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_options.connect_with(options).await?;
    Ok(pool)
}

/// Chạy migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Kết nối và cập nhật schema
pub async fn init_database(config: &DatabaseConfig) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    tracing::debug!(url = %config.url, "database ready");
    Ok(pool)
}
