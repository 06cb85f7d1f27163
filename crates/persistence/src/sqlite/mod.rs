//! SQLite persistence module
//!
//! Repository pattern cho SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, run_migrations, AccountRepo, LedgerRepo, ResourceRepo, RoleRepo,
    TransferRepo,
};
pub use schema::{
    AccountRow, CreditLogRow, NewLogEntry, ResourceRow, RolePermissionRow, RoleRow, TransferRow,
};
