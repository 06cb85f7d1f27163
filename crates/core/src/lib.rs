//! # QRCredit Core
//!
//! Domain types for the credit ledger, the permission model and the
//! QR activation workflow. No I/O lives here.

pub mod account;
pub mod error;
pub mod ledger;
pub mod permission;
pub mod resource;
pub mod tier;
pub mod transfer;

pub use account::{Account, Balance};
pub use error::{CoreError, CoreResult};
pub use ledger::{replay, CreditLogEntry, EntryType};
pub use permission::{
    legacy_allows, AccessRole, Action, DenyReason, Permission, PermissionDecision, Resource,
};
pub use resource::{ResourceRecord, ResourceStatus};
pub use tier::Tier;
pub use transfer::{TransferRequest, TransferStatus};
