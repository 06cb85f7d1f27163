//! # Resource Module
//!
//! A physical QR tag record. It starts UNUSED and becomes ACTIVE exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Unused,
    Active,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Unused => "unused",
            ResourceStatus::Active => "active",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unused" => Some(ResourceStatus::Unused),
            "active" => Some(ResourceStatus::Active),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// QR tag record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub status: ResourceStatus,
    /// Owner data supplied at activation, stored verbatim
    pub owner_payload: Option<serde_json::Value>,
    /// Retailer whose credit paid for the activation
    pub consumed_by: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: ResourceStatus::Unused,
            owner_payload: None,
            consumed_by: None,
            activated_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ResourceStatus::Active
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QR {} ({})", self.id, self.status)?;
        if let Some(by) = &self.consumed_by {
            write!(f, " by {}", by)?;
        }
        Ok(())
    }
}
