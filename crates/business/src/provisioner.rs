//! # Resource Provisioner
//!
//! QR tag activation. Flipping the tag, spending the retailer's credit and
//! logging the ACTIVATION entry happen in one unit or not at all.

use crate::error::{EngineError, EngineResult, Entity};
use crate::ledger::{debit_in, LedgerReceipt};
use crate::permission::require_in;
use crate::services::{load_account, ServiceContext};
use chrono::Utc;
use qrcredit_core::{Action, EntryType, Resource, ResourceRecord, ResourceStatus, Tier};
use qrcredit_persistence::{NewLogEntry, ResourceRepo};
use serde::Serialize;
use tracing::{info, warn};

/// Credits spent per activation
pub const ACTIVATION_COST: i64 = 1;

/// Activated record plus the debit that paid for it
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub record: ResourceRecord,
    pub receipt: LedgerReceipt,
}

/// Count of tags per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    pub unused: i64,
    pub active: i64,
}

pub struct ResourceProvisioner<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ResourceProvisioner<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register a new UNUSED tag
    pub async fn register(&self, resource_id: &str) -> EngineResult<ResourceRecord> {
        let record = ResourceRecord::new(resource_id);
        ResourceRepo::insert(self.ctx.pool(), &record).await?;
        info!(resource_id, "resource registered");
        Ok(record)
    }

    pub async fn get(&self, resource_id: &str) -> EngineResult<ResourceRecord> {
        let row = ResourceRepo::find(self.ctx.pool(), resource_id)
            .await?
            .ok_or_else(|| EngineError::not_found(Entity::Resource, resource_id))?;
        Ok(ResourceRecord::try_from(row)?)
    }

    pub async fn stats(&self) -> EngineResult<ResourceStats> {
        let pool = self.ctx.pool();
        Ok(ResourceStats {
            unused: ResourceRepo::count_by_status(pool, ResourceStatus::Unused).await?,
            active: ResourceRepo::count_by_status(pool, ResourceStatus::Active).await?,
        })
    }

    /// Activate a tag on behalf of a retailer, spending one credit.
    ///
    /// The tag is claimed with a guarded write before anything else, so a
    /// second activation of the same tag waits for the first unit and then
    /// finds it ACTIVE.
    pub async fn activate(
        &self,
        resource_id: &str,
        actor_id: &str,
        payload: serde_json::Value,
    ) -> EngineResult<Activation> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;

        // 1. Resource must exist and be UNUSED
        if !ResourceRepo::claim(&mut *tx, resource_id, actor_id, &payload, now).await? {
            return match ResourceRepo::find(&mut *tx, resource_id).await? {
                None => Err(EngineError::not_found(Entity::Resource, resource_id)),
                Some(_) => {
                    warn!(resource_id, actor_id, "activation of active resource refused");
                    Err(EngineError::AlreadyActivated(resource_id.to_string()))
                }
            };
        }

        // 2. Only retailers activate, and their role may not revoke it
        let actor = load_account(&mut tx, actor_id).await?;
        if actor.tier != Tier::Retailer {
            return Err(EngineError::forbidden(
                Resource::Qrs,
                Action::Activate,
                format!("{} accounts cannot activate resources", actor.tier),
            ));
        }
        require_in(&mut tx, actor_id, Resource::Qrs, Action::Activate).await?;

        // 3. Spend the credit
        let entry = NewLogEntry::new(
            actor_id,
            EntryType::Activation,
            ACTIVATION_COST,
            &format!("activation:{}", resource_id),
        )
        .with_resource(resource_id);
        let receipt = debit_in(&mut tx, &entry).await?;

        let record = ResourceRecord::try_from(ResourceRepo::get_by_id(&mut *tx, resource_id).await?)?;
        tx.commit().await?;

        info!(
            resource_id,
            actor_id,
            available = receipt.balance.available,
            "resource activated"
        );
        Ok(Activation { record, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::NewAccount;
    use crate::paging::PageRequest;
    use qrcredit_core::Permission;
    use qrcredit_persistence::{Database, DatabaseConfig};
    use serde_json::json;

    async fn context() -> ServiceContext {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        let ctx = ServiceContext::new(db);
        let dir = ctx.hierarchy();
        dir.create_account(NewAccount::new("ADM_001", "HQ", Tier::Admin))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("DIS_001", "North", Tier::Distributor).under("ADM_001"))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("RET_001", "Shop", Tier::Retailer).under("DIS_001"))
            .await
            .unwrap();
        ctx.provisioner().register("QR_0001").await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_activate_spends_one_credit() {
        let ctx = context().await;
        ctx.ledger().credit("RET_001", 1, "seed", None).await.unwrap();

        let activation = ctx
            .provisioner()
            .activate("QR_0001", "RET_001", json!({"pet": "Rex"}))
            .await
            .unwrap();
        assert!(activation.record.is_active());
        assert_eq!(activation.record.consumed_by.as_deref(), Some("RET_001"));
        assert_eq!(activation.record.owner_payload, Some(json!({"pet": "Rex"})));
        assert_eq!(activation.receipt.balance.available, 0);

        let history = ctx
            .ledger()
            .history("RET_001", PageRequest::default())
            .await
            .unwrap();
        let latest = &history.items[0];
        assert_eq!(latest.entry_type, EntryType::Activation);
        assert_eq!(latest.resource_id.as_deref(), Some("QR_0001"));
        assert_eq!(latest.reason, "activation:QR_0001");
    }

    #[tokio::test]
    async fn test_missing_resource() {
        let ctx = context().await;
        let err = ctx
            .provisioner()
            .activate("QR_9999", "RET_001", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Resource, .. }));
    }

    #[tokio::test]
    async fn test_non_retailer_forbidden_and_rolled_back() {
        let ctx = context().await;
        ctx.ledger().credit("DIS_001", 5, "seed", None).await.unwrap();

        let err = ctx
            .provisioner()
            .activate("QR_0001", "DIS_001", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden { .. }));

        let record = ctx.provisioner().get("QR_0001").await.unwrap();
        assert_eq!(record.status, ResourceStatus::Unused);
        assert_eq!(record.consumed_by, None);
        assert_eq!(ctx.ledger().balance("DIS_001").await.unwrap().available, 5);
    }

    #[tokio::test]
    async fn test_unknown_actor_leaves_resource_unused() {
        let ctx = context().await;
        let err = ctx
            .provisioner()
            .activate("QR_0001", "RET_404", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Account, .. }));
        assert!(!ctx.provisioner().get("QR_0001").await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_role_can_deny_activation() {
        let ctx = context().await;
        ctx.ledger().credit("RET_001", 1, "seed", None).await.unwrap();
        let role = ctx
            .roles()
            .create_role("read-only", [Permission::new(Resource::Qrs, Action::View)])
            .await
            .unwrap();
        ctx.roles().assign_role("RET_001", Some(&role.id)).await.unwrap();

        let err = ctx
            .provisioner()
            .activate("QR_0001", "RET_001", json!({}))
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(ctx.ledger().balance("RET_001").await.unwrap().available, 1);
        assert_eq!(ctx.provisioner().stats().await.unwrap().unused, 1);
    }
}
