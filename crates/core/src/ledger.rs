//! # Ledger Module
//!
//! Append-only credit movement log. Each entry is typed by its effect on the
//! owning account's balance, so the balance can be rebuilt from the log alone.

use crate::account::Balance;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of credit movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Credits received (top-up or incoming transfer)
    Add,
    /// Credits passed to a child account
    Subtract,
    /// One credit consumed by a QR activation
    Activation,
    /// Admin handed out credits; no balance effect on the admin
    Grant,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Add => "add",
            EntryType::Subtract => "subtract",
            EntryType::Activation => "activation",
            EntryType::Grant => "grant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "add" => Some(EntryType::Add),
            "subtract" => Some(EntryType::Subtract),
            "activation" => Some(EntryType::Activation),
            "grant" => Some(EntryType::Grant),
            _ => None,
        }
    }

    /// Apply this movement to a balance.
    pub fn apply(&self, balance: &mut Balance, amount: i64) -> CoreResult<()> {
        match self {
            EntryType::Add => balance.credit(amount),
            EntryType::Subtract | EntryType::Activation => balance.debit(amount),
            EntryType::Grant => {
                if amount <= 0 {
                    return Err(CoreError::InvalidAmount(amount));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the credit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLogEntry {
    /// Monotonic insertion sequence
    pub id: i64,
    pub account_id: String,
    pub entry_type: EntryType,
    pub amount: i64,
    /// Free-form reason, e.g. `activation:QR_0001` or `transfer:TRQ-1A2B3C4D`
    pub reason: String,
    /// Other side of a transfer
    pub counterparty: Option<String>,
    /// QR consumed by an activation
    pub resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for CreditLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} ({})",
            self.id,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.entry_type,
            self.amount,
            self.reason
        )?;
        if let Some(counterparty) = &self.counterparty {
            write!(f, " <-> {}", counterparty)?;
        }
        Ok(())
    }
}

/// Rebuild a balance by folding entries in insertion order.
pub fn replay<'a, I>(entries: I) -> CoreResult<Balance>
where
    I: IntoIterator<Item = &'a CreditLogEntry>,
{
    let mut balance = Balance::new();
    for entry in entries {
        entry.entry_type.apply(&mut balance, entry.amount)?;
    }
    Ok(balance)
}
