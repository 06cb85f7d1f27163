//! # Transfer Workflow
//!
//! A child account asks its parent for credits; the parent approves or
//! rejects. Approval moves the credits from parent to child in one unit.
//! Admin parents are an unlimited source: their balance is never checked
//! or debited, and a GRANT entry records what they handed out.

use crate::error::{EngineError, EngineResult, Entity};
use crate::ledger::{credit_in, debit_in, grant_in};
use crate::permission::require_in;
use crate::services::{load_account, ServiceContext};
use chrono::Utc;
use qrcredit_core::{Action, EntryType, Resource, Tier, TransferRequest, TransferStatus};
use qrcredit_persistence::{NewLogEntry, TransferRepo, TransferRow};
use sqlx::SqliteConnection;
use tracing::info;

pub struct TransferWorkflow<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransferWorkflow<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Raise a PENDING request from `from_account_id` to its parent
    pub async fn request(
        &self,
        actor_id: &str,
        from_account_id: &str,
        amount: i64,
        external_ref: &str,
    ) -> EngineResult<TransferRequest> {
        if amount <= 0 {
            return Err(EngineError::InvalidAmount(amount));
        }
        if actor_id != from_account_id {
            return Err(EngineError::forbidden(
                Resource::Financials,
                Action::Create,
                "requests can only be raised by the requesting account",
            ));
        }

        let mut conn = self.ctx.pool().acquire().await?;
        let account = load_account(&mut conn, from_account_id).await?;
        let parent_id = account
            .parent_id
            .ok_or_else(|| EngineError::NoParent(from_account_id.to_string()))?;

        let request = TransferRequest::new(from_account_id, &parent_id, amount, external_ref);
        TransferRepo::insert(&mut *conn, &request).await?;

        info!(
            request_id = %request.id,
            from = from_account_id,
            to = %parent_id,
            amount,
            "transfer requested"
        );
        Ok(request)
    }

    /// Approve a PENDING request and move the credits
    pub async fn approve(&self, actor_id: &str, request_id: &str) -> EngineResult<TransferRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;

        // Claim the request first: a concurrent decision waits here
        if !TransferRepo::decide(&mut *tx, request_id, TransferStatus::Approved, actor_id, now)
            .await?
        {
            return Err(not_pending(&mut tx, request_id).await);
        }
        let request = load_request(&mut tx, request_id).await?;
        authorize_decision(&mut tx, actor_id, &request).await?;

        let seller = load_account(&mut tx, &request.to_account).await?;
        let buyer = load_account(&mut tx, &request.from_account).await?;
        let reason = format!("transfer:{}", request.id);

        // Admin parents skip the balance check and only log a GRANT
        if seller.tier.is_unlimited_source() {
            let entry = NewLogEntry::new(&seller.id, EntryType::Grant, request.amount, &reason)
                .with_counterparty(Some(&buyer.id));
            grant_in(&mut tx, &entry).await?;
        } else {
            let entry = NewLogEntry::new(&seller.id, EntryType::Subtract, request.amount, &reason)
                .with_counterparty(Some(&buyer.id));
            debit_in(&mut tx, &entry).await?;
        }

        let buyer_entry = NewLogEntry::new(&buyer.id, EntryType::Add, request.amount, &reason)
            .with_counterparty(Some(&seller.id));
        let receipt = credit_in(&mut tx, &buyer_entry).await?;
        tx.commit().await?;

        info!(
            request_id,
            actor_id,
            seller = %seller.id,
            buyer = %buyer.id,
            amount = request.amount,
            buyer_available = receipt.balance.available,
            "transfer approved"
        );
        Ok(request)
    }

    /// Reject a PENDING request. Balances are untouched.
    pub async fn reject(&self, actor_id: &str, request_id: &str) -> EngineResult<TransferRequest> {
        let now = Utc::now();
        let mut tx = self.ctx.begin().await?;

        if !TransferRepo::decide(&mut *tx, request_id, TransferStatus::Rejected, actor_id, now)
            .await?
        {
            return Err(not_pending(&mut tx, request_id).await);
        }
        let request = load_request(&mut tx, request_id).await?;
        authorize_decision(&mut tx, actor_id, &request).await?;
        tx.commit().await?;

        info!(request_id, actor_id, "transfer rejected");
        Ok(request)
    }

    pub async fn get(&self, request_id: &str) -> EngineResult<TransferRequest> {
        let mut conn = self.ctx.pool().acquire().await?;
        load_request(&mut conn, request_id).await
    }

    /// Requests addressed to an account, newest first
    pub async fn list_incoming(
        &self,
        account_id: &str,
        status: Option<TransferStatus>,
    ) -> EngineResult<Vec<TransferRequest>> {
        let rows = TransferRepo::list_for_recipient(self.ctx.pool(), account_id, status).await?;
        into_requests(rows)
    }

    /// Requests raised by an account, newest first
    pub async fn list_outgoing(&self, account_id: &str) -> EngineResult<Vec<TransferRequest>> {
        let rows = TransferRepo::list_for_requester(self.ctx.pool(), account_id).await?;
        into_requests(rows)
    }
}

fn into_requests(rows: Vec<TransferRow>) -> EngineResult<Vec<TransferRequest>> {
    Ok(rows
        .into_iter()
        .map(TransferRequest::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

async fn load_request(conn: &mut SqliteConnection, request_id: &str) -> EngineResult<TransferRequest> {
    let row = TransferRepo::find(&mut *conn, request_id)
        .await?
        .ok_or_else(|| EngineError::not_found(Entity::Request, request_id))?;
    Ok(TransferRequest::try_from(row)?)
}

/// Error for a decision whose guard did not match
async fn not_pending(conn: &mut SqliteConnection, request_id: &str) -> EngineError {
    match load_request(conn, request_id).await {
        Ok(request) => EngineError::InvalidState {
            id: request.id,
            status: request.status,
        },
        Err(err) => err,
    }
}

/// The parent decides on its own queue. Admin staff whose role grants
/// (financials, approve) may decide on any queue. The requester never may.
async fn authorize_decision(
    conn: &mut SqliteConnection,
    actor_id: &str,
    request: &TransferRequest,
) -> EngineResult<()> {
    if actor_id == request.from_account {
        return Err(EngineError::forbidden(
            Resource::Financials,
            Action::Approve,
            "requesters cannot decide their own request",
        ));
    }
    if actor_id == request.to_account {
        return Ok(());
    }

    let actor = load_account(conn, actor_id).await?;
    if actor.tier != Tier::Admin {
        return Err(EngineError::forbidden(
            Resource::Financials,
            Action::Approve,
            format!("{} {} is not the recipient of {}", actor.tier, actor_id, request.id),
        ));
    }
    require_in(conn, actor_id, Resource::Financials, Action::Approve).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::NewAccount;
    use crate::paging::PageRequest;
    use qrcredit_core::{Balance, Permission};
    use qrcredit_persistence::{Database, DatabaseConfig};

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
        ctx
    }

    /// Second branch: DIS_002 under ADM_001 with RET_002 below it
    async fn add_branch(ctx: &ServiceContext) {
        let dir = ctx.hierarchy();
        dir.create_account(NewAccount::new("DIS_002", "South", Tier::Distributor).under("ADM_001"))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("RET_002", "Kiosk", Tier::Retailer).under("DIS_002"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_validation() {
        let ctx = context().await;
        let transfers = ctx.transfers();

        let err = transfers.request("ADM_001", "ADM_001", 5, "INV-1").await.unwrap_err();
        assert!(matches!(err, EngineError::NoParent(_)));

        let err = transfers.request("RET_001", "RET_001", 0, "INV-1").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(0)));

        let err = transfers.request("DIS_001", "RET_001", 5, "INV-1").await.unwrap_err();
        assert!(err.is_forbidden());

        let request = transfers.request("RET_001", "RET_001", 5, "INV-1").await.unwrap();
        assert_eq!(request.to_account, "DIS_001");
        assert!(request.is_pending());
    }

    #[tokio::test]
    async fn test_admin_grant_is_unlimited() {
        let ctx = context().await;
        let transfers = ctx.transfers();
        let request = transfers.request("DIS_001", "DIS_001", 50, "INV-7").await.unwrap();

        let approved = transfers.approve("ADM_001", &request.id).await.unwrap();
        assert_eq!(approved.status, TransferStatus::Approved);
        assert_eq!(approved.decided_by.as_deref(), Some("ADM_001"));

        let ledger = ctx.ledger();
        assert_eq!(ledger.balance("ADM_001").await.unwrap(), Balance::new());
        assert_eq!(
            ledger.balance("DIS_001").await.unwrap(),
            Balance::from_parts(50, 0, 50).unwrap()
        );

        let admin_log = ledger
            .history("ADM_001", PageRequest::default())
            .await
            .unwrap();
        assert_eq!(admin_log.items[0].entry_type, EntryType::Grant);
        assert_eq!(admin_log.items[0].counterparty.as_deref(), Some("DIS_001"));
    }

    #[tokio::test]
    async fn test_distributor_needs_balance() {
        let ctx = context().await;
        let transfers = ctx.transfers();
        let request = transfers.request("RET_001", "RET_001", 3, "INV-9").await.unwrap();

        let err = transfers.approve("DIS_001", &request.id).await.unwrap_err();
        assert!(err.is_insufficient_balance());
        assert!(transfers.get(&request.id).await.unwrap().is_pending());
        assert_eq!(ctx.ledger().balance("RET_001").await.unwrap().total, 0);

        ctx.ledger().credit("DIS_001", 3, "seed", None).await.unwrap();
        transfers.approve("DIS_001", &request.id).await.unwrap();
        assert_eq!(
            ctx.ledger().balance("DIS_001").await.unwrap(),
            Balance::from_parts(3, 3, 0).unwrap()
        );
        assert_eq!(ctx.ledger().balance("RET_001").await.unwrap().available, 3);
    }

    #[tokio::test]
    async fn test_decisions_require_pending() {
        let ctx = context().await;
        let transfers = ctx.transfers();
        let request = transfers.request("DIS_001", "DIS_001", 2, "INV-2").await.unwrap();

        transfers.reject("ADM_001", &request.id).await.unwrap();
        let err = transfers.approve("ADM_001", &request.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidState { status: TransferStatus::Rejected, .. }
        ));
        let err = transfers.reject("ADM_001", &request.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));

        let err = transfers.approve("ADM_001", "TRQ-MISSING").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { entity: Entity::Request, .. }));
        assert_eq!(ctx.ledger().balance("DIS_001").await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_only_parent_or_approver_decides() {
        let ctx = context().await;
        let transfers = ctx.transfers();
        let request = transfers.request("RET_001", "RET_001", 1, "INV-3").await.unwrap();

        let err = transfers.reject("RET_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());
        assert!(transfers.get(&request.id).await.unwrap().is_pending());

        let incoming = transfers
            .list_incoming("DIS_001", Some(TransferStatus::Pending))
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(transfers.list_outgoing("RET_001").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_requester_cannot_decide_own_request() {
        let ctx = context().await;
        let transfers = ctx.transfers();
        let request = transfers
            .request("DIS_001", "DIS_001", 1_000_000, "INV-SELF")
            .await
            .unwrap();

        let err = transfers.approve("DIS_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());
        let err = transfers.reject("DIS_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());

        assert!(transfers.get(&request.id).await.unwrap().is_pending());
        assert_eq!(ctx.ledger().balance("DIS_001").await.unwrap(), Balance::new());
        assert!(ctx
            .ledger()
            .history("ADM_001", PageRequest::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_other_branch_cannot_decide() {
        let ctx = context().await;
        add_branch(&ctx).await;
        let transfers = ctx.transfers();
        ctx.ledger().credit("DIS_002", 5, "seed", None).await.unwrap();
        let request = transfers.request("RET_002", "RET_002", 5, "INV-5").await.unwrap();

        // Sibling distributor, with and without a role granting approvals
        let err = transfers.approve("DIS_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());
        let approver = ctx
            .roles()
            .create_role("approver", [Permission::new(Resource::Financials, Action::Approve)])
            .await
            .unwrap();
        ctx.roles().assign_role("DIS_001", Some(&approver.id)).await.unwrap();
        let err = transfers.approve("DIS_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());

        let err = transfers.reject("RET_001", &request.id).await.unwrap_err();
        assert!(err.is_forbidden());

        assert!(transfers.get(&request.id).await.unwrap().is_pending());
        assert_eq!(
            ctx.ledger().balance("DIS_002").await.unwrap(),
            Balance::from_parts(5, 0, 5).unwrap()
        );

        let approved = transfers.approve("DIS_002", &request.id).await.unwrap();
        assert_eq!(approved.status, TransferStatus::Approved);
        assert_eq!(ctx.ledger().balance("RET_002").await.unwrap().available, 5);
    }

    #[tokio::test]
    async fn test_admin_staff_decides_with_role() {
        let ctx = context().await;
        let dir = ctx.hierarchy();
        dir.create_account(NewAccount::new("ADM_OPS", "Ops", Tier::Admin).with_role("ROLE_SUPER_ADMIN"))
            .await
            .unwrap();
        dir.create_account(NewAccount::new("ADM_NEW", "New hire", Tier::Admin))
            .await
            .unwrap();
        let transfers = ctx.transfers();
        ctx.ledger().credit("DIS_001", 2, "seed", None).await.unwrap();
        let request = transfers.request("RET_001", "RET_001", 2, "INV-8").await.unwrap();

        let err = transfers.approve("ADM_NEW", &request.id).await.unwrap_err();
        assert!(matches!(err, EngineError::NoAccessRole(_)));
        assert!(transfers.get(&request.id).await.unwrap().is_pending());

        let approved = transfers.approve("ADM_OPS", &request.id).await.unwrap();
        assert_eq!(approved.decided_by.as_deref(), Some("ADM_OPS"));
        assert_eq!(
            ctx.ledger().balance("DIS_001").await.unwrap(),
            Balance::from_parts(2, 2, 0).unwrap()
        );
        assert_eq!(ctx.ledger().balance("RET_001").await.unwrap().available, 2);
    }
}
