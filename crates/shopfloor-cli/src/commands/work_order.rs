use shopfloor_core::{WorkOrder, WorkOrderEvent};

use crate::cli::WorkOrderCommands;
use crate::commands::common::{format_stats, format_work_order_lines, ProfileContext};
use crate::error::CliError;

pub async fn run_work_order(
    command: WorkOrderCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let context = ProfileContext::load(global_profile)?;
    match execute(&context, command).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(CliError::Core(error)) => Err(context.explain(error)),
        Err(error) => Err(error),
    }
}

async fn execute(context: &ProfileContext, command: WorkOrderCommands) -> Result<String, CliError> {
    let client = context.work_orders();
    let updated = match command {
        WorkOrderCommands::Show { id, json } => {
            let order = client.get(&id).await?;
            if json {
                return Ok(serde_json::to_string_pretty(&order)?);
            }
            return Ok(format_work_order_lines(&order).join("\n"));
        }
        WorkOrderCommands::Start { id } => client.start(&client.get(&id).await?).await?,
        WorkOrderCommands::Issue {
            id,
            item,
            quantity,
            queue,
        } => {
            let order = client.get(&id).await?;
            if queue {
                let event = WorkOrderEvent::IssueMaterials {
                    item_id: item.trim().to_string(),
                    quantity,
                };
                return queue_event(context, &order, &event).await;
            }
            client.issue_materials(&order, &item, quantity).await?
        }
        WorkOrderCommands::Produce {
            id,
            quantity,
            scrap,
            queue,
        } => {
            let order = client.get(&id).await?;
            if queue {
                let event = WorkOrderEvent::RecordProduction {
                    quantity,
                    scrap_quantity: scrap,
                };
                return queue_event(context, &order, &event).await;
            }
            client.record_production(&order, quantity, scrap).await?
        }
        WorkOrderCommands::SubmitQc { id } => {
            client.submit_for_qc(&client.get(&id).await?).await?
        }
        WorkOrderCommands::Approve { id } => client.qc_approve(&client.get(&id).await?).await?,
        WorkOrderCommands::Reject { id, reason } => {
            client.qc_reject(&client.get(&id).await?, &reason).await?
        }
        WorkOrderCommands::Rework { id } => client.rework(&client.get(&id).await?).await?,
    };

    Ok(format_work_order_lines(&updated).join("\n"))
}

/// Check the event against the current order, then put it on the offline
/// queue instead of sending it.
async fn queue_event(
    context: &ProfileContext,
    order: &WorkOrder,
    event: &WorkOrderEvent,
) -> Result<String, CliError> {
    order.check(event).map_err(shopfloor_core::Error::from)?;
    let payload = event.offline_payload(&order.id).ok_or_else(|| {
        CliError::Config(format!("'{}' cannot be queued offline", event.name()))
    })?;
    let stats = context.sync_controller().enqueue(&payload).await?;
    Ok(format!(
        "Queued {} for {}. {}",
        payload.kind(),
        order.display_name(),
        format_stats(&stats)
    ))
}
