//! # Hierarchy Directory
//!
//! Parent lookup and paged child listing over the ADMIN → DISTRIBUTOR →
//! RETAILER tree. Account creation enforces the tier nesting, so every
//! parent pointer stays one tier up.

use crate::error::{EngineError, EngineResult, Entity};
use crate::paging::{Cursor, Page, PageRequest, PageSource};
use crate::services::{load_account, ServiceContext};
use async_trait::async_trait;
use qrcredit_core::{Account, Tier};
use qrcredit_persistence::{AccountRepo, RoleRepo};
use tracing::info;

/// Input for [`HierarchyDirectory::create_account`]
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: String,
    pub name: String,
    pub tier: Tier,
    pub parent_id: Option<String>,
    pub role_id: Option<String>,
}

impl NewAccount {
    pub fn new(id: &str, name: &str, tier: Tier) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tier,
            parent_id: None,
            role_id: None,
        }
    }

    pub fn under(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }

    pub fn with_role(mut self, role_id: &str) -> Self {
        self.role_id = Some(role_id.to_string());
        self
    }
}

pub struct HierarchyDirectory<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> HierarchyDirectory<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load one account with its balance
    pub async fn account(&self, account_id: &str) -> EngineResult<Account> {
        let mut conn = self.ctx.pool().acquire().await?;
        load_account(&mut conn, account_id).await
    }

    /// Parent ID of an account, `None` for a root
    pub async fn resolve_parent(&self, account_id: &str) -> EngineResult<Option<String>> {
        Ok(self.account(account_id).await?.parent_id)
    }

    /// Direct children, newest first
    pub async fn list_children(
        &self,
        account_id: &str,
        request: PageRequest,
    ) -> EngineResult<Page<Account>> {
        let mut conn = self.ctx.pool().acquire().await?;
        if AccountRepo::find(&mut *conn, account_id).await?.is_none() {
            return Err(EngineError::not_found(Entity::Account, account_id));
        }

        let rows = AccountRepo::children(
            &mut *conn,
            account_id,
            request.fetch_limit(),
            request.offset(),
        )
        .await?;
        let accounts = rows
            .into_iter()
            .map(Account::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_overfetch(accounts, request))
    }

    /// Lazy cursor over all children
    pub fn children_cursor(&self, account_id: &str, limit: u32) -> Cursor<ChildrenSource<'a>> {
        Cursor::new(
            ChildrenSource {
                directory: HierarchyDirectory::new(self.ctx),
                account_id: account_id.to_string(),
            },
            limit,
        )
    }

    pub async fn count_children(&self, account_id: &str) -> EngineResult<i64> {
        Ok(AccountRepo::count_children(self.ctx.pool(), account_id).await?)
    }

    /// Register an account with a zero balance under a parent of the tier above
    pub async fn create_account(&self, new: NewAccount) -> EngineResult<Account> {
        let mut tx = self.ctx.begin().await?;

        match (new.tier.parent_tier(), new.parent_id.as_deref()) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(EngineError::InvalidHierarchy(format!(
                    "{} accounts cannot have a parent",
                    new.tier
                )))
            }
            (Some(expected), None) => {
                return Err(EngineError::InvalidHierarchy(format!(
                    "{} accounts need a {} parent",
                    new.tier, expected
                )))
            }
            (Some(expected), Some(parent_id)) => {
                let parent = load_account(&mut tx, parent_id).await?;
                if parent.tier != expected {
                    return Err(EngineError::InvalidHierarchy(format!(
                        "{} accounts need a {} parent, {} is {}",
                        new.tier, expected, parent_id, parent.tier
                    )));
                }
            }
        }

        if let Some(role_id) = new.role_id.as_deref() {
            if RoleRepo::find_row(&mut *tx, role_id).await?.is_none() {
                return Err(EngineError::not_found(Entity::Role, role_id));
            }
        }

        let mut account = Account::new(&new.id, &new.name, new.tier, new.parent_id.as_deref());
        account.role_id = new.role_id;
        AccountRepo::insert(&mut *tx, &account).await?;
        tx.commit().await?;

        info!(
            account_id = %account.id,
            tier = %account.tier,
            parent_id = ?account.parent_id,
            "account created"
        );
        Ok(account)
    }
}

/// [`PageSource`] over an account's children
pub struct ChildrenSource<'a> {
    directory: HierarchyDirectory<'a>,
    account_id: String,
}

#[async_trait]
impl<'a> PageSource for ChildrenSource<'a> {
    type Item = Account;

    async fn fetch_page(&self, request: PageRequest) -> EngineResult<Page<Account>> {
        self.directory.list_children(&self.account_id, request).await
    }
}
