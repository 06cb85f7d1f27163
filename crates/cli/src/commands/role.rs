//! Role and permission commands

use anyhow::{Context, Result};
use qrcredit_business::ServiceContext;
use qrcredit_core::{Action, PermissionDecision, Resource};

use crate::RoleAction;

/// Handle role subcommands
pub async fn handle(ctx: &ServiceContext, action: RoleAction) -> Result<()> {
    let roles = ctx.roles();

    match action {
        RoleAction::Create { name, grant } => {
            let role = roles
                .create_role(&name, grant)
                .await
                .context("Failed to create role")?;
            println!("✅ Created role {} ({}) with {} grants", role.id, role.name, role.permissions.len());
        }
        RoleAction::Grant {
            role_id,
            resource,
            action,
        } => {
            let added = roles.grant(&role_id, resource, action).await?;
            if added {
                println!("✅ {} may now {} {}", role_id, action, resource);
            } else {
                println!("ℹ️  {} already grants {}:{}", role_id, resource, action);
            }
        }
        RoleAction::Revoke {
            role_id,
            resource,
            action,
        } => {
            let removed = roles.revoke(&role_id, resource, action).await?;
            if removed {
                println!("✅ Revoked {}:{} from {}", resource, action, role_id);
            } else {
                println!("ℹ️  {} did not grant {}:{}", role_id, resource, action);
            }
        }
        RoleAction::Assign {
            account_id,
            role_id,
            clear,
        } => {
            let role_id = if clear { None } else { role_id };
            roles.assign_role(&account_id, role_id.as_deref()).await?;
            match role_id {
                Some(role_id) => println!("✅ Assigned {} to {}", role_id, account_id),
                None => println!("✅ Cleared role of {}", account_id),
            }
        }
        RoleAction::Delete { role_id } => {
            let unassigned = roles.delete_role(&role_id).await?;
            println!("✅ Deleted {} ({} accounts unassigned)", role_id, unassigned);
        }
        RoleAction::List => {
            println!("🔐 Roles");
            for role in roles.list_roles().await? {
                let marker = if role.is_system { " [system]" } else { "" };
                println!("   {} {}{}", role.id, role.name, marker);
                for resource in Resource::ALL {
                    let actions = role.actions_on(resource);
                    if !actions.is_empty() {
                        let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
                        println!("      {:<11} {}", resource, names.join(", "));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Print a permission decision
pub async fn check(
    ctx: &ServiceContext,
    account_id: &str,
    resource: Resource,
    action: Action,
) -> Result<()> {
    let decision = ctx.permissions().check(account_id, resource, action).await?;
    match decision {
        PermissionDecision::Allowed => println!("✅ {} may {} {}", account_id, action, resource),
        PermissionDecision::Denied(reason) => {
            println!("⛔ {} may not {} {}: {}", account_id, action, resource, reason)
        }
    }
    Ok(())
}
