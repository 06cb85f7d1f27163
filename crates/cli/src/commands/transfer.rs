//! Credit transfer commands

use anyhow::{Context, Result};
use qrcredit_business::ServiceContext;

use crate::TransferAction;

/// Handle transfer subcommands
pub async fn handle(ctx: &ServiceContext, action: TransferAction) -> Result<()> {
    let transfers = ctx.transfers();

    match action {
        TransferAction::Request {
            account_id,
            amount,
            external_ref,
        } => {
            let request = transfers
                .request(&account_id, &account_id, amount, &external_ref)
                .await
                .context("Failed to raise request")?;
            println!("✅ Requested {}", request);
        }
        TransferAction::Approve { request_id, actor } => {
            let request = transfers
                .approve(&actor, &request_id)
                .await
                .context("Approval failed")?;
            println!("✅ Approved {}", request);
        }
        TransferAction::Reject { request_id, actor } => {
            let request = transfers
                .reject(&actor, &request_id)
                .await
                .context("Rejection failed")?;
            println!("✅ Rejected {}", request);
        }
        TransferAction::List {
            account_id,
            status,
            outgoing,
        } => {
            let requests = if outgoing {
                transfers.list_outgoing(&account_id).await?
            } else {
                transfers
                    .list_incoming(&account_id, status.map(|s| s.to_core_type()))
                    .await?
            };

            let direction = if outgoing { "raised by" } else { "addressed to" };
            println!("📨 Requests {} {}", direction, account_id);
            if requests.is_empty() {
                println!("   (none)");
            }
            for request in &requests {
                println!("   {}", request);
            }
        }
    }
    Ok(())
}
