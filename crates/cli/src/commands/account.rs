//! Account management commands

use anyhow::{Context, Result};
use qrcredit_business::{NewAccount, PageRequest, ServiceContext};

use crate::AccountAction;

/// Handle account subcommands
pub async fn handle(ctx: &ServiceContext, action: AccountAction) -> Result<()> {
    match action {
        AccountAction::Create {
            account_id,
            name,
            tier,
            parent,
            role,
        } => {
            let mut new = NewAccount::new(&account_id, &name, tier.to_core_type());
            if let Some(parent) = parent.as_deref() {
                new = new.under(parent);
            }
            if let Some(role) = role.as_deref() {
                new = new.with_role(role);
            }
            let account = ctx
                .hierarchy()
                .create_account(new)
                .await
                .context("Failed to create account")?;
            println!("✅ Created {}", account);
        }
        AccountAction::Show { account_id } => {
            show_account(ctx, &account_id).await?;
        }
        AccountAction::Children {
            account_id,
            page,
            limit,
        } => {
            let children = ctx
                .hierarchy()
                .list_children(&account_id, PageRequest::new(page, limit))
                .await
                .context("Failed to list children")?;

            println!("👥 Children of {} (page {})", account_id, children.page);
            if children.is_empty() {
                println!("   (none)");
            }
            for child in &children.items {
                println!("   {}", child);
            }
            if children.has_more {
                println!("   … more on page {}", children.page + 1);
            }
        }
    }
    Ok(())
}

async fn show_account(ctx: &ServiceContext, account_id: &str) -> Result<()> {
    let account = ctx
        .hierarchy()
        .account(account_id)
        .await
        .context("Failed to load account")?;
    let children = ctx.hierarchy().count_children(account_id).await?;

    println!("📋 Account {}", account.id);
    println!("   Name:      {}", account.name);
    println!("   Tier:      {}", account.tier);
    println!("   Parent:    {}", account.parent_id.as_deref().unwrap_or("-"));
    println!("   Role:      {}", account.role_id.as_deref().unwrap_or("-"));
    println!("   Children:  {}", children);
    println!("   Balance:   {}", account.balance);
    println!("   Created:   {}", account.created_at.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}
