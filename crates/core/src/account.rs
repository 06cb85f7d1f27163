//! # Account Module
//!
//! Account and its credit Balance. The balance is a triple kept consistent
//! on every mutation: `available = total - used`, all non-negative.

use crate::error::{CoreError, CoreResult};
use crate::tier::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credit balance of one account.
///
/// - `total`: every credit ever received
/// - `used`: credits spent on activations or passed down the hierarchy
/// - `available`: what can still be spent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: i64,
    pub used: i64,
    pub available: i64,
}

impl Balance {
    /// Empty balance
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a balance from stored columns, rejecting a broken triple.
    pub fn from_parts(total: i64, used: i64, available: i64) -> CoreResult<Self> {
        let balance = Self {
            total,
            used,
            available,
        };
        balance.check()?;
        Ok(balance)
    }

    pub fn is_consistent(&self) -> bool {
        self.used >= 0 && self.available >= 0 && self.available == self.total - self.used
    }

    pub fn check(&self) -> CoreResult<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(CoreError::BrokenBalance {
                total: self.total,
                used: self.used,
                available: self.available,
            })
        }
    }

    pub fn can_spend(&self, amount: i64) -> bool {
        self.available >= amount
    }

    /// Add credits to total and available.
    pub fn credit(&mut self, amount: i64) -> CoreResult<()> {
        if amount <= 0 {
            return Err(CoreError::InvalidAmount(amount));
        }
        self.total = self
            .total
            .checked_add(amount)
            .ok_or(CoreError::InvalidAmount(amount))?;
        self.available = self.total - self.used;
        self.check()
    }

    /// Move credits from available to used.
    pub fn debit(&mut self, amount: i64) -> CoreResult<()> {
        if amount <= 0 {
            return Err(CoreError::InvalidAmount(amount));
        }
        if !self.can_spend(amount) {
            return Err(CoreError::InsufficientBalance {
                needed: amount,
                available: self.available,
            });
        }
        self.used += amount;
        self.available = self.total - self.used;
        self.check()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} available ({} total, {} used)",
            self.available, self.total, self.used
        )
    }
}

/// An account in the three-level hierarchy.
///
/// Accounts are created by the surrounding platform; this crate only reads
/// them and mutates the balance and role assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub tier: Tier,
    /// Parent in the hierarchy, `None` for admins
    pub parent_id: Option<String>,
    /// Custom access role, if any
    pub role_id: Option<String>,
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: &str, name: &str, tier: Tier, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tier,
            parent_id: parent_id.map(str::to_string),
            role_id: None,
            balance: Balance::new(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}] {}", self.tier, self.id, self.name, self.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_credit_debit() {
        let mut balance = Balance::new();
        balance.credit(50).unwrap();
        assert_eq!(balance, Balance::from_parts(50, 0, 50).unwrap());

        balance.debit(20).unwrap();
        assert_eq!(balance.total, 50);
        assert_eq!(balance.used, 20);
        assert_eq!(balance.available, 30);
        assert!(balance.is_consistent());
    }

    #[test]
    fn test_balance_rejects_bad_amounts() {
        let mut balance = Balance::new();
        assert_eq!(balance.credit(0), Err(CoreError::InvalidAmount(0)));
        assert_eq!(balance.debit(-3), Err(CoreError::InvalidAmount(-3)));

        let err = balance.debit(1).unwrap_err();
        assert!(err.is_insufficient_balance());
        assert_eq!(balance, Balance::new());
    }

    #[test]
    fn test_balance_credit_overflow() {
        let mut balance = Balance::from_parts(i64::MAX, 0, i64::MAX).unwrap();
        assert_eq!(balance.credit(1), Err(CoreError::InvalidAmount(1)));
        assert_eq!(balance.total, i64::MAX);
    }

    #[test]
    fn test_balance_from_parts_checks_invariant() {
        assert!(Balance::from_parts(10, 4, 6).is_ok());
        assert!(Balance::from_parts(10, 4, 7).is_err());
        assert!(Balance::from_parts(3, 4, -1).is_err());
    }

    #[test]
    fn test_account_creation() {
        let account = Account::new("RET_001", "Corner Shop", Tier::Retailer, Some("DIS_001"));
        assert_eq!(account.parent_id.as_deref(), Some("DIS_001"));
        assert!(account.role_id.is_none());
        assert_eq!(account.balance.available, 0);
    }
}
