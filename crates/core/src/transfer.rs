//! # Transfer Module
//!
//! Credit request from a child account to its parent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransferStatus::Pending),
            "approved" => Some(TransferStatus::Approved),
            "rejected" => Some(TransferStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending ask for credits, decided by the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: String,
    /// Buyer: the requesting child account
    pub from_account: String,
    /// Seller: the parent that approves
    pub to_account: String,
    pub amount: i64,
    /// Payment or order reference supplied by the requester
    pub external_ref: String,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl TransferRequest {
    pub fn new(from_account: &str, to_account: &str, amount: i64, external_ref: &str) -> Self {
        Self {
            id: Self::generate_id(),
            from_account: from_account.to_string(),
            to_account: to_account.to_string(),
            amount,
            external_ref: external_ref.to_string(),
            status: TransferStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
            decided_by: None,
        }
    }

    pub fn generate_id() -> String {
        format!("TRQ-{}", uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase())
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }
}

impl fmt::Display for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} : {} credits [{}] ref={}",
            self.id, self.to_account, self.from_account, self.amount, self.status, self.external_ref
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_is_pending() {
        let req = TransferRequest::new("DIS_001", "ADM_001", 20, "INV-42");
        assert!(req.id.starts_with("TRQ-"));
        assert_eq!(req.id.len(), 12);
        assert!(req.is_pending());
        assert!(req.decided_at.is_none());
        assert!(req.decided_by.is_none());
        assert_eq!(
            req.to_string(),
            format!("{} ADM_001 -> DIS_001 : 20 credits [pending] ref=INV-42", req.id)
        );
    }

    #[test]
    fn test_status_str() {
        assert_eq!(TransferStatus::from_str("REJECTED"), Some(TransferStatus::Rejected));
        assert_eq!(TransferStatus::from_str("expired"), None);
    }
}
