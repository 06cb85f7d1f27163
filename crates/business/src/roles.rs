//! Role administration
//!
//! Custom access roles and their grants. System roles are read-only.

use crate::error::{EngineError, EngineResult, Entity};
use crate::services::ServiceContext;
use qrcredit_core::{AccessRole, Action, Permission, Resource};
use qrcredit_persistence::{AccountRepo, RoleRepo};
use sqlx::SqliteConnection;
use tracing::info;

pub struct RoleService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RoleService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a custom role with an initial set of grants
    pub async fn create_role(
        &self,
        name: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> EngineResult<AccessRole> {
        let mut role = AccessRole::new(&AccessRole::generate_id(), name);
        role.permissions.extend(permissions);

        let mut tx = self.ctx.begin().await?;
        RoleRepo::insert(&mut tx, &role).await?;
        tx.commit().await?;

        info!(role_id = %role.id, name, grants = role.permissions.len(), "role created");
        Ok(role)
    }

    pub async fn get_role(&self, role_id: &str) -> EngineResult<AccessRole> {
        let mut conn = self.ctx.pool().acquire().await?;
        find_role(&mut conn, role_id).await
    }

    pub async fn list_roles(&self) -> EngineResult<Vec<AccessRole>> {
        let mut conn = self.ctx.pool().acquire().await?;
        let rows = RoleRepo::get_all(&mut *conn).await?;
        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            roles.push(find_role(&mut conn, &row.id).await?);
        }
        Ok(roles)
    }

    /// Add a grant. Returns false if the role already had it.
    pub async fn grant(
        &self,
        role_id: &str,
        resource: Resource,
        action: Action,
    ) -> EngineResult<bool> {
        let mut tx = self.ctx.begin().await?;
        editable_role(&mut tx, role_id).await?;
        let added = RoleRepo::grant(&mut *tx, role_id, resource, action).await?;
        tx.commit().await?;

        info!(role_id, %resource, %action, added, "grant added");
        Ok(added)
    }

    /// Remove a grant. Returns false if the role did not have it.
    pub async fn revoke(
        &self,
        role_id: &str,
        resource: Resource,
        action: Action,
    ) -> EngineResult<bool> {
        let mut tx = self.ctx.begin().await?;
        editable_role(&mut tx, role_id).await?;
        let removed = RoleRepo::revoke(&mut *tx, role_id, resource, action).await?;
        tx.commit().await?;

        info!(role_id, %resource, %action, removed, "grant revoked");
        Ok(removed)
    }

    /// Delete a custom role. Accounts holding it are left without a role.
    pub async fn delete_role(&self, role_id: &str) -> EngineResult<u64> {
        let mut tx = self.ctx.begin().await?;
        editable_role(&mut tx, role_id).await?;
        let unassigned = AccountRepo::clear_role(&mut *tx, role_id).await?;
        RoleRepo::delete(&mut *tx, role_id).await?;
        tx.commit().await?;

        info!(role_id, unassigned, "role deleted");
        Ok(unassigned)
    }

    /// Attach a role to an account, or clear it with `None`
    pub async fn assign_role(&self, account_id: &str, role_id: Option<&str>) -> EngineResult<()> {
        let mut tx = self.ctx.begin().await?;
        if let Some(role_id) = role_id {
            find_role(&mut tx, role_id).await?;
        }
        AccountRepo::set_role(&mut *tx, account_id, role_id)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    EngineError::not_found(Entity::Account, account_id)
                } else {
                    e.into()
                }
            })?;
        tx.commit().await?;

        info!(account_id, role_id = ?role_id, "role assigned");
        Ok(())
    }
}

async fn find_role(conn: &mut SqliteConnection, role_id: &str) -> EngineResult<AccessRole> {
    RoleRepo::find(conn, role_id)
        .await?
        .ok_or_else(|| EngineError::not_found(Entity::Role, role_id))
}

async fn editable_role(conn: &mut SqliteConnection, role_id: &str) -> EngineResult<AccessRole> {
    let role = find_role(conn, role_id).await?;
    if role.is_system {
        return Err(EngineError::SystemRoleImmutable(role_id.to_string()));
    }
    Ok(role)
}
