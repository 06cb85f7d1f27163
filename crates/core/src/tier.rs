//! # Tier Module
//!
//! The fixed organizational rank of an account. Tier drives the hierarchy
//! (who may be whose parent) and the legacy permission fallback.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organizational tier.
///
/// - Admin: top of the hierarchy, unlimited credit source, staff accounts
/// - Distributor: child of an Admin, resells credits to retailers
/// - Retailer: child of a Distributor, spends credits on activations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Admin,
    Distributor,
    Retailer,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Admin => "admin",
            Tier::Distributor => "distributor",
            Tier::Retailer => "retailer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Tier::Admin),
            "distributor" => Some(Tier::Distributor),
            "retailer" => Some(Tier::Retailer),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        Self::from_str(s).ok_or_else(|| CoreError::unknown("tier", s))
    }

    /// Tier a parent account must have, `None` for root accounts.
    pub fn parent_tier(&self) -> Option<Tier> {
        match self {
            Tier::Admin => None,
            Tier::Distributor => Some(Tier::Admin),
            Tier::Retailer => Some(Tier::Distributor),
        }
    }

    /// Admin accounts hand out credits without spending their own balance.
    pub fn is_unlimited_source(&self) -> bool {
        matches!(self, Tier::Admin)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_str() {
        assert_eq!(Tier::Retailer.as_str(), "retailer");
        assert_eq!(Tier::from_str("DISTRIBUTOR"), Some(Tier::Distributor));
        assert_eq!(Tier::from_str("owner"), None);
        assert!(Tier::parse("owner").is_err());
    }

    #[test]
    fn test_parent_tier() {
        assert_eq!(Tier::Admin.parent_tier(), None);
        assert_eq!(Tier::Distributor.parent_tier(), Some(Tier::Admin));
        assert_eq!(Tier::Retailer.parent_tier(), Some(Tier::Distributor));
    }
}
