//! Database schema definitions
//!
//! Row types cho sqlx mapping từ SQLite tables.
//! Schema được định nghĩa trong migrations/20261019_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use qrcredit_core::{
    Account, Balance, CreditLogEntry, EntryType, ResourceRecord, ResourceStatus, Tier,
    TransferRequest, TransferStatus,
};
use serde::{Deserialize, Serialize};

/// Row type cho bảng `accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub name: String,
    pub tier: String,
    pub parent_id: Option<String>,
    pub role_id: Option<String>,
    pub total: i64,
    pub used: i64,
    pub available: i64,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `access_roles`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RoleRow {
    pub id: String,
    pub name: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `role_permissions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RolePermissionRow {
    pub role_id: String,
    pub resource: String,
    pub action: String,
}

/// Row type cho bảng `credit_logs`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct CreditLogRow {
    pub id: i64,
    pub account_id: String,
    pub entry_type: String,
    pub amount: i64,
    pub reason: String,
    pub counterparty: Option<String>,
    pub resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `resources`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ResourceRow {
    pub id: String,
    pub status: String,
    pub owner_payload: Option<String>, // JSON stored as TEXT
    pub consumed_by: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row type cho bảng `transfer_requests`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransferRow {
    pub id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: i64,
    pub external_ref: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

/// New log entry, before the database assigns its sequence.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub account_id: String,
    pub entry_type: EntryType,
    pub amount: i64,
    pub reason: String,
    pub counterparty: Option<String>,
    pub resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewLogEntry {
    pub fn new(account_id: &str, entry_type: EntryType, amount: i64, reason: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            entry_type,
            amount,
            reason: reason.to_string(),
            counterparty: None,
            resource_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, counterparty: Option<&str>) -> Self {
        self.counterparty = counterparty.map(str::to_string);
        self
    }

    pub fn with_resource(mut self, resource_id: &str) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }
}

// === Conversion implementations ===

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> PersistenceResult<Self> {
        let tier =
            Tier::from_str(&row.tier).ok_or_else(|| PersistenceError::invalid_enum("tier", &row.tier))?;
        Ok(Account {
            id: row.id,
            name: row.name,
            tier,
            parent_id: row.parent_id,
            role_id: row.role_id,
            balance: Balance::from_parts(row.total, row.used, row.available)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CreditLogRow> for CreditLogEntry {
    type Error = PersistenceError;

    fn try_from(row: CreditLogRow) -> PersistenceResult<Self> {
        let entry_type = EntryType::from_str(&row.entry_type)
            .ok_or_else(|| PersistenceError::invalid_enum("entry_type", &row.entry_type))?;
        Ok(CreditLogEntry {
            id: row.id,
            account_id: row.account_id,
            entry_type,
            amount: row.amount,
            reason: row.reason,
            counterparty: row.counterparty,
            resource_id: row.resource_id,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ResourceRow> for ResourceRecord {
    type Error = PersistenceError;

    fn try_from(row: ResourceRow) -> PersistenceResult<Self> {
        let status = ResourceStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?;
        let owner_payload = row
            .owner_payload
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()?;
        Ok(ResourceRecord {
            id: row.id,
            status,
            owner_payload,
            consumed_by: row.consumed_by,
            activated_at: row.activated_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<TransferRow> for TransferRequest {
    type Error = PersistenceError;

    fn try_from(row: TransferRow) -> PersistenceResult<Self> {
        let status = TransferStatus::from_str(&row.status)
            .ok_or_else(|| PersistenceError::invalid_enum("status", &row.status))?;
        Ok(TransferRequest {
            id: row.id,
            from_account: row.from_account,
            to_account: row.to_account,
            amount: row.amount,
            external_ref: row.external_ref,
            status,
            created_at: row.created_at,
            decided_at: row.decided_at,
            decided_by: row.decided_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_row_conversion() {
        let row = AccountRow {
            id: "DIS_001".to_string(),
            name: "North".to_string(),
            tier: "distributor".to_string(),
            parent_id: Some("ADM_001".to_string()),
            role_id: None,
            total: 50,
            used: 0,
            available: 50,
            created_at: Utc::now(),
        };
        let account = Account::try_from(row.clone()).unwrap();
        assert_eq!(account.tier, Tier::Distributor);
        assert_eq!(account.balance.available, 50);

        let bad = AccountRow {
            tier: "owner".to_string(),
            ..row
        };
        assert!(matches!(
            Account::try_from(bad),
            Err(PersistenceError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn test_resource_row_payload() {
        let row = ResourceRow {
            id: "QR_0001".to_string(),
            status: "active".to_string(),
            owner_payload: Some(r#"{"pet":"Rex"}"#.to_string()),
            consumed_by: Some("RET_001".to_string()),
            activated_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        let record = ResourceRecord::try_from(row).unwrap();
        assert!(record.is_active());
        assert_eq!(record.owner_payload, Some(serde_json::json!({"pet": "Rex"})));
    }
}
