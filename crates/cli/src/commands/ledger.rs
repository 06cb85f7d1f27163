//! Ledger commands - credit, debit, history, verify

use anyhow::{bail, Context, Result};
use qrcredit_business::{PageRequest, ServiceContext};
use qrcredit_persistence::AccountRepo;

pub async fn credit(
    ctx: &ServiceContext,
    account_id: &str,
    amount: i64,
    reason: &str,
    counterparty: Option<&str>,
) -> Result<()> {
    let receipt = ctx
        .ledger()
        .credit(account_id, amount, reason, counterparty)
        .await
        .context("Credit failed")?;
    println!("✅ Credited {} to {} (entry #{})", amount, account_id, receipt.entry_id);
    println!("   Balance: {}", receipt.balance);
    Ok(())
}

pub async fn debit(ctx: &ServiceContext, account_id: &str, amount: i64, reason: &str) -> Result<()> {
    let receipt = ctx
        .ledger()
        .debit(account_id, amount, reason)
        .await
        .context("Debit failed")?;
    println!("✅ Debited {} from {} (entry #{})", amount, account_id, receipt.entry_id);
    println!("   Balance: {}", receipt.balance);
    Ok(())
}

pub async fn history(
    ctx: &ServiceContext,
    account_id: &str,
    page: u32,
    limit: u32,
    all: bool,
) -> Result<()> {
    let ledger = ctx.ledger();
    println!("📜 Credit log of {}", account_id);

    if all {
        let mut cursor = ledger.history_cursor(account_id, limit);
        let mut count = 0;
        while let Some(entries) = cursor.next_page().await? {
            for entry in entries {
                println!("   {}", entry);
                count += 1;
            }
        }
        println!("   {} entries", count);
        return Ok(());
    }

    let page = ledger
        .history(account_id, PageRequest::new(page, limit))
        .await
        .context("Failed to read history")?;
    if page.is_empty() {
        println!("   (no entries on page {})", page.page);
    }
    for entry in &page.items {
        println!("   {}", entry);
    }
    if page.has_more {
        println!("   … more on page {}", page.page + 1);
    }
    Ok(())
}

/// Verify one account, or all of them
pub async fn verify(ctx: &ServiceContext, account_id: Option<&str>) -> Result<()> {
    let ids = match account_id {
        Some(id) => vec![id.to_string()],
        None => AccountRepo::get_all(ctx.pool())
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect(),
    };

    let mut drifted = 0;
    for id in &ids {
        let audit = ctx.ledger().verify(id).await?;
        if audit.is_consistent() {
            println!("✅ {} ok ({} entries): {}", id, audit.entries, audit.stored);
        } else {
            drifted += 1;
            println!("❌ {} stored {} but log replays to {}", id, audit.stored, audit.replayed);
        }
    }

    if drifted > 0 {
        bail!("{} of {} accounts do not match their log", drifted, ids.len());
    }
    Ok(())
}
