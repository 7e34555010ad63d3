use std::time::Duration;

use shopfloor_core::connectivity::{run_monitor, HttpReachabilityProbe};
use shopfloor_core::offline::TransactionStore;
use shopfloor_core::sync::{ClearOutcome, SyncAttempt, SyncTrigger};
use shopfloor_core::{ConflictResolution, SyncController};
use tokio::sync::watch;

use crate::cli::OfflineCommands;
use crate::commands::common::{
    confirm, format_stats, format_transaction_lines, transaction_to_item, ProfileContext,
    TransactionListItem,
};
use crate::error::CliError;

pub async fn run_offline(
    command: OfflineCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let context = ProfileContext::load(global_profile)?;
    let controller = context.sync_controller();

    let result = match command {
        OfflineCommands::List { conflicts, json } => {
            list_output(&controller, conflicts, json).await
        }
        OfflineCommands::Stats { json } => stats_output(&controller, json).await,
        OfflineCommands::CreateTest => create_test_output(&controller).await,
        OfflineCommands::Sync => sync_output(&controller).await,
        OfflineCommands::Resolve { id, keep } => {
            resolve_output(&controller, &id, keep.into()).await
        }
        OfflineCommands::ClearSynced { yes } => clear_synced_output(&controller, yes).await,
        OfflineCommands::Watch { interval_secs } => {
            run_watch(
                &context,
                &controller,
                Duration::from_secs(interval_secs.max(1)),
            )
            .await
        }
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(CliError::Core(error)) => Err(context.explain(error)),
        Err(error) => Err(error),
    }
}

pub async fn list_output<S: TransactionStore>(
    controller: &SyncController<S>,
    conflicts_only: bool,
    as_json: bool,
) -> Result<String, CliError> {
    controller.refresh().await?;
    let transactions = if conflicts_only {
        controller.conflicts()
    } else {
        controller.snapshot().transactions
    };

    if as_json {
        let items = transactions
            .iter()
            .map(transaction_to_item)
            .collect::<Vec<TransactionListItem>>();
        return Ok(serde_json::to_string_pretty(&items)?);
    }

    if transactions.is_empty() {
        return Ok(if conflicts_only {
            "No conflicting transactions.".to_string()
        } else {
            "No queued transactions.".to_string()
        });
    }
    Ok(format_transaction_lines(&transactions).join("\n"))
}

pub async fn stats_output<S: TransactionStore>(
    controller: &SyncController<S>,
    as_json: bool,
) -> Result<String, CliError> {
    let stats = controller.refresh().await?;
    if as_json {
        return Ok(serde_json::to_string_pretty(&stats)?);
    }
    Ok(format_stats(&stats))
}

pub async fn create_test_output<S: TransactionStore>(
    controller: &SyncController<S>,
) -> Result<String, CliError> {
    let stats = controller.create_test_transaction().await?;
    Ok(format_stats(&stats))
}

pub async fn sync_output<S: TransactionStore>(
    controller: &SyncController<S>,
) -> Result<String, CliError> {
    controller.refresh().await?;
    match controller.sync_now(SyncTrigger::Manual).await {
        SyncAttempt::Completed(report) => Ok(format!(
            "Synced {} transaction(s), {} conflict(s) remaining",
            report.synced_count, report.conflicts
        )),
        SyncAttempt::Skipped(reason) => Ok(format!("Nothing to sync: {reason}")),
        SyncAttempt::Failed(message) => Err(CliError::SyncFailed(message)),
        SyncAttempt::SignedOut => Err(CliError::Core(shopfloor_core::Error::Unauthorized)),
    }
}

pub async fn resolve_output<S: TransactionStore>(
    controller: &SyncController<S>,
    id: &str,
    resolution: ConflictResolution,
) -> Result<String, CliError> {
    let stats = controller.resolve_conflict(id, resolution).await?;
    Ok(format!(
        "Resolved {} ({resolution}); {} conflict(s) remaining",
        id.trim(),
        stats.conflicts
    ))
}

pub async fn clear_synced_output<S: TransactionStore>(
    controller: &SyncController<S>,
    assume_yes: bool,
) -> Result<String, CliError> {
    let stats = controller.refresh().await?;
    let approved = if stats.synced == 0 || assume_yes {
        true
    } else {
        confirm(&format!(
            "Delete {} synced transaction(s) from the queue?",
            stats.synced
        ))?
    };

    let outcome = controller.clear_synced(|_| approved).await?;
    Ok(match outcome {
        ClearOutcome::NothingToClear => "No synced transactions to clear.".to_string(),
        ClearOutcome::Cancelled => "Cancelled.".to_string(),
        ClearOutcome::Cleared(count) => format!("Cleared {count} synced transaction(s)"),
    })
}

async fn run_watch<S: TransactionStore>(
    context: &ProfileContext,
    controller: &SyncController<S>,
    interval: Duration,
) -> Result<String, CliError> {
    let stats = controller.refresh().await?;
    println!("{}", format_stats(&stats));
    match controller.sync_now(SyncTrigger::Manual).await {
        SyncAttempt::Failed(message) => tracing::warn!("Initial sync failed: {message}"),
        SyncAttempt::SignedOut => {
            return Err(CliError::Core(shopfloor_core::Error::Unauthorized));
        }
        SyncAttempt::Skipped(_) | SyncAttempt::Completed(_) => {}
    }

    let probe = HttpReachabilityProbe::new(
        context.api.base_url(),
        interval,
        context.config.request_timeout,
    )?;
    let (sender, receiver) = watch::channel(true);
    let probe_task = tokio::spawn(probe.run(sender));
    let monitor_task = tokio::spawn(run_monitor(receiver, controller.clone()));

    println!(
        "Watching {} every {}s. Press Ctrl-C to stop.",
        context.api.base_url(),
        interval.as_secs()
    );
    tokio::signal::ctrl_c().await?;
    probe_task.abort();
    monitor_task.abort();

    Ok(format_stats(&controller.stats()))
}
