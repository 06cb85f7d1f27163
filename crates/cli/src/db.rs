//! Database configuration, initialization and status

use anyhow::{Context, Result};
use qrcredit_business::{NewAccount, ServiceContext};
use qrcredit_core::{ResourceStatus, Tier, TransferStatus};
use qrcredit_persistence::{AccountRepo, DatabaseConfig, LedgerRepo, ResourceRepo};
use std::path::{Path, PathBuf};

/// Environment configuration, with `--db` taking precedence over the URL
pub fn config(db: Option<&Path>) -> Result<DatabaseConfig> {
    let env = DatabaseConfig::from_env().context("Invalid database configuration")?;
    let config = match db {
        Some(path) => env.with_url(&DatabaseConfig::for_path(path).url),
        None => env,
    };

    if let Some(parent) = file_path(&config.url).as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(config)
}

/// Open the database and wrap it for the engine services
pub async fn connect(config: &DatabaseConfig) -> Result<ServiceContext> {
    ServiceContext::connect(config)
        .await
        .with_context(|| format!("Failed to open database {}", config.url))
}

/// Initialize the database with schema
pub async fn init_database(config: &DatabaseConfig, force: bool, seed: bool) -> Result<()> {
    if force {
        if let Some(path) = file_path(&config.url).filter(|p| p.exists()) {
            std::fs::remove_file(&path).context("Failed to remove existing database")?;
            println!("🗑️  Removed existing database");
        }
    }

    let ctx = connect(config).await?;
    if seed {
        seed_data(&ctx).await?;
    }
    ctx.database().close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(config: &DatabaseConfig) -> Result<()> {
    if let Some(path) = file_path(&config.url).filter(|p| !p.exists()) {
        println!("❌ Database not found at {}", path.display());
        println!("   Run 'qrcredit init' to create the database");
        return Ok(());
    }

    let ctx = connect(config).await?;
    let pool = ctx.pool();

    let accounts = AccountRepo::get_all(pool).await?;
    let count_tier = |tier: Tier| accounts.iter().filter(|a| a.tier == tier.as_str()).count();
    let log_entries = LedgerRepo::count(pool).await?;
    let unused = ResourceRepo::count_by_status(pool, ResourceStatus::Unused).await?;
    let active = ResourceRepo::count_by_status(pool, ResourceStatus::Active).await?;

    let mut pending = 0;
    for account in &accounts {
        pending += ctx
            .transfers()
            .list_incoming(&account.id, Some(TransferStatus::Pending))
            .await?
            .len();
    }

    println!("📊 Database Status");
    println!("   URL: {}", config.url);
    println!();
    println!("   Accounts:      {}", accounts.len());
    println!("     admin:       {}", count_tier(Tier::Admin));
    println!("     distributor: {}", count_tier(Tier::Distributor));
    println!("     retailer:    {}", count_tier(Tier::Retailer));
    println!("   Log entries:   {}", log_entries);
    println!("   QR tags:       {} unused, {} active", unused, active);
    println!("   Pending transfers: {}", pending);

    ctx.database().close().await;
    Ok(())
}

/// Demo hierarchy: one account per tier and five unused tags
async fn seed_data(ctx: &ServiceContext) -> Result<()> {
    let hierarchy = ctx.hierarchy();
    if AccountRepo::find(ctx.pool(), "ADM_001").await?.is_some() {
        println!("   Seed data already present");
        return Ok(());
    }

    hierarchy
        .create_account(NewAccount::new("ADM_001", "Headquarters", Tier::Admin).with_role("ROLE_SUPER_ADMIN"))
        .await?;
    hierarchy
        .create_account(NewAccount::new("DIS_001", "North Distribution", Tier::Distributor).under("ADM_001"))
        .await?;
    hierarchy
        .create_account(NewAccount::new("RET_001", "Corner Shop", Tier::Retailer).under("DIS_001"))
        .await?;

    for i in 1..=5 {
        ctx.provisioner().register(&format!("QR_{:04}", i)).await?;
    }

    println!("   Seeded ADM_001 → DIS_001 → RET_001 and QR_0001..QR_0005");
    Ok(())
}

/// Filesystem path behind a SQLite URL, `None` for in-memory databases
fn file_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(PathBuf::from(path))
}
