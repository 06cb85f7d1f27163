//! Engine errors
//!
//! Every operation either completes fully or returns one of these, with all
//! of its writes discarded.

use qrcredit_core::{Action, CoreError, DenyReason, Resource, TransferStatus};
use qrcredit_persistence::PersistenceError;
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Resource,
    Role,
    Request,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Account => "Account",
            Entity::Resource => "Resource",
            Entity::Role => "Role",
            Entity::Request => "Transfer request",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine operation errors
#[derive(Debug, Error)]
pub enum EngineError {
    // === Lookup errors ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Account has no parent: {0}")]
    NoParent(String),

    // === Validation errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance on {account_id}: need {needed}, available {available}")]
    InsufficientBalance {
        account_id: String,
        needed: i64,
        available: i64,
    },

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    // === Permission errors ===
    #[error("Forbidden: {action} on {resource} ({reason})")]
    Forbidden {
        resource: Resource,
        action: Action,
        reason: String,
    },

    #[error("No access role assigned to account {0}")]
    NoAccessRole(String),

    #[error("System role cannot be modified: {0}")]
    SystemRoleImmutable(String),

    // === State errors ===
    #[error("Resource already activated: {0}")]
    AlreadyActivated(String),

    #[error("Transfer request {id} is {status}, expected pending")]
    InvalidState { id: String, status: TransferStatus },

    // === Wrapped errors ===
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(PersistenceError::Database(err))
    }
}

impl EngineError {
    pub fn not_found(entity: Entity, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_balance(account_id: &str, needed: i64, available: i64) -> Self {
        Self::InsufficientBalance {
            account_id: account_id.to_string(),
            needed,
            available,
        }
    }

    pub fn forbidden(resource: Resource, action: Action, reason: impl fmt::Display) -> Self {
        Self::Forbidden {
            resource,
            action,
            reason: reason.to_string(),
        }
    }

    /// Map a denied check to the error callers see
    pub fn denied(account_id: &str, resource: Resource, action: Action, reason: DenyReason) -> Self {
        match reason {
            DenyReason::NoAccessRole => Self::NoAccessRole(account_id.to_string()),
            other => Self::forbidden(resource, action, other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::NoAccessRole(_))
    }

    /// Storage or corruption failure rather than a business rule
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Core(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EngineError::not_found(Entity::Request, "TRQ-00000001");
        assert_eq!(err.to_string(), "Transfer request not found: TRQ-00000001");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_denied_mapping() {
        let err = EngineError::denied(
            "ADM_001",
            Resource::Users,
            Action::View,
            DenyReason::NoAccessRole,
        );
        assert!(matches!(err, EngineError::NoAccessRole(ref id) if id == "ADM_001"));
        assert!(err.is_forbidden());

        let err = EngineError::denied(
            "RET_001",
            Resource::Users,
            Action::View,
            DenyReason::TierNotAllowed {
                tier: qrcredit_core::Tier::Retailer,
            },
        );
        assert_eq!(
            err.to_string(),
            "Forbidden: view on users (not available to retailer tier)"
        );
    }

    #[test]
    fn test_insufficient_balance_display() {
        let err = EngineError::insufficient_balance("RET_001", 1, 0);
        assert!(err.to_string().contains("need 1, available 0"));
        assert!(!err.is_infrastructure());
    }
}
