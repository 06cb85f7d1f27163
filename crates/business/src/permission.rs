//! # Permission Engine
//!
//! Resolves an account's tier and access role and decides whether it may
//! perform an action on a resource. Nothing is allowed unless a role grant
//! or the legacy tier list says so.

use crate::error::{EngineError, EngineResult};
use crate::services::{load_account, ServiceContext};
use qrcredit_core::{AccessRole, Account, Action, Permission, PermissionDecision, Resource};
use qrcredit_persistence::RoleRepo;
use sqlx::SqliteConnection;
use tracing::debug;

pub struct PermissionEngine<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PermissionEngine<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Decide without failing on a denial
    pub async fn check(
        &self,
        account_id: &str,
        resource: Resource,
        action: Action,
    ) -> EngineResult<PermissionDecision> {
        let mut conn = self.ctx.pool().acquire().await?;
        check_in(&mut conn, account_id, resource, action).await
    }

    /// Same as [`check`](Self::check), with a denial turned into an error
    pub async fn require(
        &self,
        account_id: &str,
        resource: Resource,
        action: Action,
    ) -> EngineResult<()> {
        let mut conn = self.ctx.pool().acquire().await?;
        require_in(&mut conn, account_id, resource, action).await
    }

    /// Every (resource, action) the account currently passes
    pub async fn effective_permissions(
        &self,
        account_id: &str,
    ) -> EngineResult<Vec<Permission>> {
        let mut conn = self.ctx.pool().acquire().await?;
        let account = load_account(&mut conn, account_id).await?;
        let role = role_of(&mut conn, &account).await?;
        Ok(Permission::all()
            .filter(|p| {
                PermissionDecision::decide(account.tier, role.as_ref(), p.resource, p.action)
                    .is_allowed()
            })
            .collect())
    }
}

async fn role_of(
    conn: &mut SqliteConnection,
    account: &Account,
) -> EngineResult<Option<AccessRole>> {
    match account.role_id.as_deref() {
        Some(role_id) => Ok(RoleRepo::find(conn, role_id).await?),
        None => Ok(None),
    }
}

pub(crate) async fn check_in(
    conn: &mut SqliteConnection,
    account_id: &str,
    resource: Resource,
    action: Action,
) -> EngineResult<PermissionDecision> {
    let account = load_account(&mut *conn, account_id).await?;
    let role = role_of(&mut *conn, &account).await?;
    let decision = PermissionDecision::decide(account.tier, role.as_ref(), resource, action);

    debug!(
        account_id,
        tier = %account.tier,
        role_id = ?account.role_id,
        %resource,
        %action,
        %decision,
        "permission check"
    );
    Ok(decision)
}

pub(crate) async fn require_in(
    conn: &mut SqliteConnection,
    account_id: &str,
    resource: Resource,
    action: Action,
) -> EngineResult<()> {
    match check_in(conn, account_id, resource, action).await? {
        PermissionDecision::Allowed => Ok(()),
        PermissionDecision::Denied(reason) => {
            Err(EngineError::denied(account_id, resource, action, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::NewAccount;
    use qrcredit_core::{DenyReason, Tier};
    use qrcredit_persistence::{Database, DatabaseConfig};

    async fn context() -> ServiceContext {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        let ctx = ServiceContext::new(db);
        let dir = ctx.hierarchy();
        dir.create_account(NewAccount::new("ADM_001", "HQ", Tier::Admin))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("ADM_ROOT", "Root", Tier::Admin).with_role("ROLE_SUPER_ADMIN"))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("DIS_001", "North", Tier::Distributor).under("ADM_001"))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("RET_001", "Shop", Tier::Retailer).under("DIS_001"))
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_admin_without_role_denied() {
        let ctx = context().await;
        let engine = ctx.permissions();

        let decision = engine
            .check("ADM_001", Resource::Users, Action::View)
            .await
            .unwrap();
        assert_eq!(decision, PermissionDecision::Denied(DenyReason::NoAccessRole));

        let err = engine
            .require("ADM_001", Resource::Users, Action::View)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoAccessRole(_)));
        assert!(engine.effective_permissions("ADM_001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_role_grants_everything() {
        let ctx = context().await;
        let engine = ctx.permissions();

        engine
            .require("ADM_ROOT", Resource::Roles, Action::Delete)
            .await
            .unwrap();
        assert_eq!(engine.effective_permissions("ADM_ROOT").await.unwrap().len(), 49);
    }

    #[tokio::test]
    async fn test_legacy_tier_fallback() {
        let ctx = context().await;
        let engine = ctx.permissions();

        engine
            .require("DIS_001", Resource::Financials, Action::Approve)
            .await
            .unwrap();
        engine
            .require("RET_001", Resource::Qrs, Action::Activate)
            .await
            .unwrap();

        let err = engine
            .require("RET_001", Resource::Financials, Action::View)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Forbidden {
                resource: Resource::Financials,
                action: Action::View,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ctx = context().await;
        let err = ctx
            .permissions()
            .check("NOPE", Resource::Qrs, Action::View)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
