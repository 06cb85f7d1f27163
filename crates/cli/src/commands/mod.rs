//! CLI command handlers

pub mod account;
pub mod ledger;
pub mod resource;
pub mod role;
pub mod transfer;
