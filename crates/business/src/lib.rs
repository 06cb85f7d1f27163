//! # QRCredit Business
//!
//! Engine services over the persistence layer: hierarchy, ledger,
//! permissions, roles, QR activation and credit transfers.
//!
//! Every mutating operation runs as one SQLite transaction whose first
//! statement is a guarded write, so concurrent callers serialize on the
//! database write lock and each sees the state the previous one committed.
//!
//! ```rust,ignore
//! let ctx = ServiceContext::connect(&DatabaseConfig::from_env()?).await?;
//! ctx.provisioner().activate("QR_0001", "RET_001", payload).await?;
//! ```

pub mod error;
pub mod hierarchy;
pub mod ledger;
pub mod paging;
pub mod permission;
pub mod provisioner;
pub mod roles;
pub mod services;
pub mod transfer;

pub use error::{EngineError, EngineResult, Entity};
pub use hierarchy::{ChildrenSource, HierarchyDirectory, NewAccount};
pub use ledger::{HistoryCursor, HistorySource, LedgerAudit, LedgerReceipt, LedgerStore};
pub use paging::{Cursor, Page, PageRequest, PageSource, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use permission::PermissionEngine;
pub use provisioner::{Activation, ResourceProvisioner, ResourceStats, ACTIVATION_COST};
pub use roles::RoleService;
pub use services::ServiceContext;
pub use transfer::TransferWorkflow;
