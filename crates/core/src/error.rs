//! # Error Module
//!
//! Domain errors raised by the core types themselves, independent of storage.

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    // === Balance errors ===
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Insufficient balance: need {needed}, available {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("Balance invariant violated: total {total}, used {used}, available {available}")]
    BrokenBalance { total: i64, used: i64, available: i64 },

    // === Parse errors ===
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }

    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, CoreError::InsufficientBalance { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InsufficientBalance {
            needed: 1,
            available: 0,
        };
        assert_eq!(err.to_string(), "Insufficient balance: need 1, available 0");
        assert!(err.is_insufficient_balance());

        let err = CoreError::unknown("tier", "owner");
        assert_eq!(err.to_string(), "Unknown tier: owner");
    }
}
