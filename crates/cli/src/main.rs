//! QRCredit CLI - operator tool for the credit ledger
//!
//! Usage:
//! ```bash
//! qrcredit init --seed
//! qrcredit account create DIS_002 "South" --tier distributor --parent ADM_001
//! qrcredit transfer request RET_001 10 --ref INV-42
//! qrcredit transfer approve TRQ-1A2B3C4D --as DIS_001
//! qrcredit activate QR_0001 RET_001 --payload '{"pet": "Rex"}'
//! qrcredit check ADM_001 financials approve
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use qrcredit_core::{Action, Permission, Resource, Tier, TransferStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{account, ledger, resource, role, transfer};

/// QRCredit - hierarchical credit ledger with QR activation
#[derive(Parser)]
#[command(name = "qrcredit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path (overrides QRCREDIT_DATABASE_URL)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the schema, optionally with a demo hierarchy
    Init {
        /// Delete the existing database file first
        #[arg(long)]
        force: bool,
        /// Seed an admin, a distributor, a retailer and a few QR tags
        #[arg(long)]
        seed: bool,
    },

    /// Account management
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Credit an account (ADD entry)
    Credit {
        account_id: String,
        amount: i64,
        #[arg(long, default_value = "manual credit")]
        reason: String,
        /// Account on the other side of the movement
        #[arg(long)]
        counterparty: Option<String>,
    },

    /// Debit an account (SUBTRACT entry)
    Debit {
        account_id: String,
        amount: i64,
        #[arg(long, default_value = "manual debit")]
        reason: String,
    },

    /// Show an account's credit log, newest first
    History {
        account_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = qrcredit_business::DEFAULT_PAGE_LIMIT)]
        limit: u32,
        /// Walk every page
        #[arg(long)]
        all: bool,
    },

    /// Replay an account's log and compare with its stored balance
    Verify {
        /// Account ID; every account when omitted
        account_id: Option<String>,
    },

    /// Check whether an account may perform an action
    Check {
        account_id: String,
        #[arg(value_parser = parse_resource)]
        resource: Resource,
        #[arg(value_parser = parse_action)]
        action: Action,
    },

    /// Access role management
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },

    /// QR tag management
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },

    /// Activate a QR tag with a retailer's credit
    Activate {
        resource_id: String,
        /// Retailer performing the activation
        actor_id: String,
        /// Owner data stored on the tag (JSON)
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Credit transfer requests
    Transfer {
        #[command(subcommand)]
        action: TransferAction,
    },

    /// Show database status
    Status,
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// Create an account with a zero balance
    Create {
        account_id: String,
        name: String,
        #[arg(long, short = 't')]
        tier: TierArg,
        /// Parent account (required below admin)
        #[arg(long, short)]
        parent: Option<String>,
        /// Access role to assign
        #[arg(long)]
        role: Option<String>,
    },
    /// Show account details and balance
    Show { account_id: String },
    /// List direct children, newest first
    Children {
        account_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = qrcredit_business::DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub enum RoleAction {
    /// Create a custom role
    Create {
        name: String,
        /// Grants as resource:action, comma-separated
        #[arg(long, value_delimiter = ',', value_parser = parse_permission)]
        grant: Vec<Permission>,
    },
    /// Add a grant to a role
    Grant {
        role_id: String,
        #[arg(value_parser = parse_resource)]
        resource: Resource,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Remove a grant from a role
    Revoke {
        role_id: String,
        #[arg(value_parser = parse_resource)]
        resource: Resource,
        #[arg(value_parser = parse_action)]
        action: Action,
    },
    /// Assign a role to an account
    Assign {
        account_id: String,
        /// Role ID; omit with --clear
        role_id: Option<String>,
        #[arg(long, conflicts_with = "role_id")]
        clear: bool,
    },
    /// Delete a custom role
    Delete { role_id: String },
    /// List roles and their grants
    List,
}

#[derive(Subcommand)]
pub enum ResourceAction {
    /// Register unused QR tags
    Add {
        #[arg(required = true)]
        resource_ids: Vec<String>,
    },
    /// Show a QR tag
    Show { resource_id: String },
}

#[derive(Subcommand)]
pub enum TransferAction {
    /// Ask the parent account for credits
    Request {
        account_id: String,
        amount: i64,
        /// External reference (invoice, payment id)
        #[arg(long = "ref")]
        external_ref: String,
    },
    /// Approve a pending request
    Approve {
        request_id: String,
        /// Deciding account
        #[arg(long = "as")]
        actor: String,
    },
    /// Reject a pending request
    Reject {
        request_id: String,
        #[arg(long = "as")]
        actor: String,
    },
    /// List requests addressed to an account
    List {
        account_id: String,
        #[arg(long)]
        status: Option<StatusArg>,
        /// List requests raised by the account instead
        #[arg(long)]
        outgoing: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TierArg {
    Admin,
    Distributor,
    Retailer,
}

impl TierArg {
    pub fn to_core_type(&self) -> Tier {
        match self {
            TierArg::Admin => Tier::Admin,
            TierArg::Distributor => Tier::Distributor,
            TierArg::Retailer => Tier::Retailer,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Approved,
    Rejected,
}

impl StatusArg {
    pub fn to_core_type(&self) -> TransferStatus {
        match self {
            StatusArg::Pending => TransferStatus::Pending,
            StatusArg::Approved => TransferStatus::Approved,
            StatusArg::Rejected => TransferStatus::Rejected,
        }
    }
}

fn parse_resource(s: &str) -> Result<Resource, String> {
    Resource::parse(s).map_err(|e| e.to_string())
}

fn parse_action(s: &str) -> Result<Action, String> {
    Action::parse(s).map_err(|e| e.to_string())
}

fn parse_permission(s: &str) -> Result<Permission, String> {
    let (resource, action) = s
        .split_once(':')
        .ok_or_else(|| format!("expected resource:action, got {:?}", s))?;
    Ok(Permission::new(parse_resource(resource)?, parse_action(action)?))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = db::config(cli.db.as_deref())?;

    match cli.command {
        Commands::Init { force, seed } => {
            db::init_database(&config, force, seed).await?;
            println!("✅ Database initialized at {}", config.url);
        }

        Commands::Status => {
            db::show_status(&config).await?;
        }

        Commands::Account { action } => {
            let ctx = db::connect(&config).await?;
            account::handle(&ctx, action).await?;
        }

        Commands::Credit {
            account_id,
            amount,
            reason,
            counterparty,
        } => {
            let ctx = db::connect(&config).await?;
            ledger::credit(&ctx, &account_id, amount, &reason, counterparty.as_deref()).await?;
        }

        Commands::Debit {
            account_id,
            amount,
            reason,
        } => {
            let ctx = db::connect(&config).await?;
            ledger::debit(&ctx, &account_id, amount, &reason).await?;
        }

        Commands::History {
            account_id,
            page,
            limit,
            all,
        } => {
            let ctx = db::connect(&config).await?;
            ledger::history(&ctx, &account_id, page, limit, all).await?;
        }

        Commands::Verify { account_id } => {
            let ctx = db::connect(&config).await?;
            ledger::verify(&ctx, account_id.as_deref()).await?;
        }

        Commands::Check {
            account_id,
            resource,
            action,
        } => {
            let ctx = db::connect(&config).await?;
            role::check(&ctx, &account_id, resource, action).await?;
        }

        Commands::Role { action } => {
            let ctx = db::connect(&config).await?;
            role::handle(&ctx, action).await?;
        }

        Commands::Resource { action } => {
            let ctx = db::connect(&config).await?;
            resource::handle(&ctx, action).await?;
        }

        Commands::Activate {
            resource_id,
            actor_id,
            payload,
        } => {
            let ctx = db::connect(&config).await?;
            resource::activate(&ctx, &resource_id, &actor_id, &payload).await?;
        }

        Commands::Transfer { action } => {
            let ctx = db::connect(&config).await?;
            transfer::handle(&ctx, action).await?;
        }
    }

    Ok(())
}
