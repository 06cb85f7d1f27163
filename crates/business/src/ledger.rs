//! # Ledger Store
//!
//! Balances and the append-only credit log. Every balance change and its
//! log entry are written in the same unit, so replaying an account's log
//! always reproduces its stored balance.
//!
//! The `*_in` functions run inside a caller's open unit; the public
//! methods wrap them in their own.

use crate::error::{EngineError, EngineResult, Entity};
use crate::paging::{Cursor, Page, PageRequest, PageSource};
use crate::services::{load_account, ServiceContext};
use async_trait::async_trait;
use qrcredit_core::{replay, Balance, CreditLogEntry, EntryType};
use qrcredit_persistence::{AccountRepo, LedgerRepo, NewLogEntry};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

/// Result of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    /// Sequence number of the log entry written
    pub entry_id: i64,
    /// Balance after the change
    pub balance: Balance,
}

/// Stored balance next to the balance rebuilt from the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub account_id: String,
    pub stored: Balance,
    pub replayed: Balance,
    pub entries: usize,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed
    }
}

pub struct LedgerStore<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerStore<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Add credits to an account and log an ADD entry
    pub async fn credit(
        &self,
        account_id: &str,
        amount: i64,
        reason: &str,
        counterparty: Option<&str>,
    ) -> EngineResult<LedgerReceipt> {
        let entry = NewLogEntry::new(account_id, EntryType::Add, amount, reason)
            .with_counterparty(counterparty);

        let mut tx = self.ctx.begin().await?;
        let receipt = credit_in(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(account_id, amount, reason, available = receipt.balance.available, "credited");
        Ok(receipt)
    }

    /// Spend credits from an account and log a SUBTRACT entry
    pub async fn debit(
        &self,
        account_id: &str,
        amount: i64,
        reason: &str,
    ) -> EngineResult<LedgerReceipt> {
        let entry = NewLogEntry::new(account_id, EntryType::Subtract, amount, reason);

        let mut tx = self.ctx.begin().await?;
        let receipt = debit_in(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(account_id, amount, reason, available = receipt.balance.available, "debited");
        Ok(receipt)
    }

    /// Current balance of an account
    pub async fn balance(&self, account_id: &str) -> EngineResult<Balance> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(load_account(&mut conn, account_id).await?.balance)
    }

    /// One page of an account's log, newest first
    pub async fn history(
        &self,
        account_id: &str,
        request: PageRequest,
    ) -> EngineResult<Page<CreditLogEntry>> {
        let mut conn = self.ctx.pool().acquire().await?;
        if AccountRepo::find(&mut *conn, account_id).await?.is_none() {
            return Err(EngineError::not_found(Entity::Account, account_id));
        }

        let rows = LedgerRepo::history(
            &mut *conn,
            account_id,
            request.fetch_limit(),
            request.offset(),
        )
        .await?;
        let entries = rows
            .into_iter()
            .map(CreditLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_overfetch(entries, request))
    }

    /// Lazy, restartable cursor over an account's whole log
    pub fn history_cursor(&self, account_id: &str, limit: u32) -> HistoryCursor<'a> {
        Cursor::new(
            HistorySource {
                ledger: LedgerStore::new(self.ctx),
                account_id: account_id.to_string(),
            },
            limit,
        )
    }

    /// Fold the full log of an account from a zero balance
    pub async fn replay(&self, account_id: &str) -> EngineResult<Balance> {
        let mut conn = self.ctx.pool().acquire().await?;
        let entries = entries_in(&mut conn, account_id).await?;
        Ok(replay(&entries)?)
    }

    /// Compare the stored balance against a replay of the log.
    ///
    /// Both reads come from one snapshot.
    pub async fn verify(&self, account_id: &str) -> EngineResult<LedgerAudit> {
        let mut tx = self.ctx.begin().await?;
        let stored = load_account(&mut tx, account_id).await?.balance;
        let entries = entries_in(&mut tx, account_id).await?;
        tx.commit().await?;

        let audit = LedgerAudit {
            account_id: account_id.to_string(),
            stored,
            replayed: replay(&entries)?,
            entries: entries.len(),
        };
        if audit.is_consistent() {
            debug!(account_id, entries = audit.entries, "ledger verified");
        } else {
            warn!(
                account_id,
                stored = %audit.stored,
                replayed = %audit.replayed,
                "ledger does not match stored balance"
            );
        }
        Ok(audit)
    }
}

/// Cursor type returned by [`LedgerStore::history_cursor`]
pub type HistoryCursor<'a> = Cursor<HistorySource<'a>>;

/// [`PageSource`] over an account's log
pub struct HistorySource<'a> {
    ledger: LedgerStore<'a>,
    account_id: String,
}

#[async_trait]
impl<'a> PageSource for HistorySource<'a> {
    type Item = CreditLogEntry;

    async fn fetch_page(&self, request: PageRequest) -> EngineResult<Page<CreditLogEntry>> {
        self.ledger.history(&self.account_id, request).await
    }
}

fn check_amount(amount: i64) -> EngineResult<()> {
    if amount <= 0 {
        return Err(EngineError::InvalidAmount(amount));
    }
    Ok(())
}

/// Credit inside an open unit. The balance write comes first.
pub(crate) async fn credit_in(
    conn: &mut SqliteConnection,
    entry: &NewLogEntry,
) -> EngineResult<LedgerReceipt> {
    check_amount(entry.amount)?;

    let Some(balance) = LedgerRepo::credit(&mut *conn, &entry.account_id, entry.amount).await?
    else {
        // The account exists, so the guard refused an overflowing total
        load_account(&mut *conn, &entry.account_id).await?;
        return Err(EngineError::InvalidAmount(entry.amount));
    };
    let entry_id = LedgerRepo::append(&mut *conn, entry).await?;

    Ok(LedgerReceipt { entry_id, balance })
}

/// Debit inside an open unit. The guarded balance write comes first, so
/// two units racing for the same credits serialize on it and the loser
/// sees the winner's result.
pub(crate) async fn debit_in(
    conn: &mut SqliteConnection,
    entry: &NewLogEntry,
) -> EngineResult<LedgerReceipt> {
    check_amount(entry.amount)?;

    let Some(balance) = LedgerRepo::debit(&mut *conn, &entry.account_id, entry.amount).await?
    else {
        let account = load_account(&mut *conn, &entry.account_id).await?;
        return Err(EngineError::insufficient_balance(
            &entry.account_id,
            entry.amount,
            account.balance.available,
        ));
    };
    let entry_id = LedgerRepo::append(&mut *conn, entry).await?;

    Ok(LedgerReceipt { entry_id, balance })
}

/// Log a GRANT from an unlimited source without touching its balance
pub(crate) async fn grant_in(
    conn: &mut SqliteConnection,
    entry: &NewLogEntry,
) -> EngineResult<LedgerReceipt> {
    check_amount(entry.amount)?;

    let balance = load_account(&mut *conn, &entry.account_id).await?.balance;
    let entry_id = LedgerRepo::append(&mut *conn, entry).await?;

    Ok(LedgerReceipt { entry_id, balance })
}

async fn entries_in(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> EngineResult<Vec<CreditLogEntry>> {
    if AccountRepo::find(&mut *conn, account_id).await?.is_none() {
        return Err(EngineError::not_found(Entity::Account, account_id));
    }
    let rows = LedgerRepo::entries_for_account(&mut *conn, account_id).await?;
    Ok(rows
        .into_iter()
        .map(CreditLogEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::NewAccount;
    use qrcredit_core::Tier;
    use qrcredit_persistence::{Database, DatabaseConfig};

    async fn context() -> ServiceContext {
        let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
        let ctx = ServiceContext::new(db);
        ctx.hierarchy()
            .create_account(NewAccount::new("ADM_001", "HQ", Tier::Admin))
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let ctx = context().await;
        let ledger = ctx.ledger();

        let receipt = ledger.credit("ADM_001", 10, "seed", None).await.unwrap();
        assert_eq!(receipt.balance, Balance::from_parts(10, 0, 10).unwrap());

        let receipt = ledger.debit("ADM_001", 4, "adjustment").await.unwrap();
        assert_eq!(receipt.balance, Balance::from_parts(10, 4, 6).unwrap());
        assert_eq!(ledger.balance("ADM_001").await.unwrap().available, 6);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let ctx = context().await;
        let ledger = ctx.ledger();

        for amount in [0, -5] {
            let err = ledger.credit("ADM_001", amount, "bad", None).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(a) if a == amount));
            let err = ledger.debit("ADM_001", amount, "bad").await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)));
        }
        assert!(ledger.history("ADM_001", PageRequest::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overdraw_leaves_no_trace() {
        let ctx = context().await;
        let ledger = ctx.ledger();
        ledger.credit("ADM_001", 2, "seed", None).await.unwrap();

        let err = ledger.debit("ADM_001", 3, "too much").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientBalance { needed: 3, available: 2, .. }
        ));

        let history = ledger.history("ADM_001", PageRequest::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(ledger.balance("ADM_001").await.unwrap().available, 2);
    }

    #[tokio::test]
    async fn test_credit_overflow_is_invalid_amount() {
        let ctx = context().await;
        let ledger = ctx.ledger();
        ledger.credit("ADM_001", i64::MAX, "ceiling", None).await.unwrap();

        let err = ledger.credit("ADM_001", 1, "one more", None).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(1)));

        assert_eq!(
            ledger.balance("ADM_001").await.unwrap(),
            Balance::from_parts(i64::MAX, 0, i64::MAX).unwrap()
        );
        let history = ledger.history("ADM_001", PageRequest::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(ledger.verify("ADM_001").await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_missing_account() {
        let ctx = context().await;
        let ledger = ctx.ledger();

        assert!(ledger.credit("NOPE", 1, "x", None).await.unwrap_err().is_not_found());
        assert!(ledger.debit("NOPE", 1, "x").await.unwrap_err().is_not_found());
        assert!(ledger.replay("NOPE").await.unwrap_err().is_not_found());
        assert!(ledger
            .history("NOPE", PageRequest::default())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_history_newest_first_and_cursor() {
        let ctx = context().await;
        let ledger = ctx.ledger();
        for i in 1..=5 {
            ledger.credit("ADM_001", i, &format!("top-up {}", i), None).await.unwrap();
        }

        let page = ledger.history("ADM_001", PageRequest::first(2)).await.unwrap();
        assert_eq!(page.items[0].amount, 5);
        assert!(page.has_more);

        let mut cursor = ledger.history_cursor("ADM_001", 2);
        assert_eq!(cursor.next_page().await.unwrap().unwrap().len(), 2);
        cursor.rewind();
        let all = cursor.collect_remaining().await.unwrap();
        let amounts: Vec<i64> = all.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_replay_matches_stored_balance() {
        let ctx = context().await;
        let ledger = ctx.ledger();
        ledger.credit("ADM_001", 7, "seed", None).await.unwrap();
        ledger.debit("ADM_001", 3, "spend").await.unwrap();
        ledger.credit("ADM_001", 1, "refund", None).await.unwrap();

        let replayed = ledger.replay("ADM_001").await.unwrap();
        assert_eq!(replayed, ledger.balance("ADM_001").await.unwrap());

        let audit = ledger.verify("ADM_001").await.unwrap();
        assert!(audit.is_consistent());
        assert_eq!(audit.entries, 3);
    }
}
