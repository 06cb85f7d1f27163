//! QR tag commands

use anyhow::{Context, Result};
use qrcredit_business::ServiceContext;

use crate::ResourceAction;

/// Handle resource subcommands
pub async fn handle(ctx: &ServiceContext, action: ResourceAction) -> Result<()> {
    let provisioner = ctx.provisioner();

    match action {
        ResourceAction::Add { resource_ids } => {
            for id in &resource_ids {
                provisioner
                    .register(id)
                    .await
                    .with_context(|| format!("Failed to register {}", id))?;
            }
            println!("✅ Registered {} QR tags", resource_ids.len());
        }
        ResourceAction::Show { resource_id } => {
            let record = provisioner.get(&resource_id).await?;
            println!("🏷️  {}", record);
            if let Some(at) = record.activated_at {
                println!("   Activated: {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(payload) = &record.owner_payload {
                println!("   Owner: {}", serde_json::to_string_pretty(payload)?);
            }
        }
    }
    Ok(())
}

pub async fn activate(
    ctx: &ServiceContext,
    resource_id: &str,
    actor_id: &str,
    payload: &str,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("--payload must be valid JSON")?;

    let activation = ctx
        .provisioner()
        .activate(resource_id, actor_id, payload)
        .await
        .context("Activation failed")?;
    println!("✅ {}", activation.record);
    println!("   {} balance: {}", actor_id, activation.receipt.balance);
    Ok(())
}
