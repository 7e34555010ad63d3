use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shopfloor_core::api::ApiClient;
use shopfloor_core::config::ClientConfig;
use shopfloor_core::notice::NoticeSink;
use shopfloor_core::offline::{RemoteTransactionStore, TransactionStatus};
use shopfloor_core::workorder::WorkOrderClient;
use shopfloor_core::{OfflineTransaction, QueueStats, SyncController, WorkOrder};

use crate::auth::{ProfileSessionManager, SupabaseAuthService};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;
use crate::notices::TerminalNoticeSink;

pub type ProfileApi = ApiClient<ProfileSessionManager>;
pub type ProfileStore = RemoteTransactionStore<ProfileSessionManager>;

/// Everything a backend command needs for one profile.
pub struct ProfileContext {
    pub profile_name: String,
    pub config: ClientConfig,
    pub api: ProfileApi,
}

impl ProfileContext {
    pub fn load(global_profile: Option<&str>) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(global_profile);
        let profile = profiles.profile(&profile_name).cloned().unwrap_or_default();
        let config = profile.client_config().map_err(|error| {
            CliError::Config(format!(
                "{error}. Run `shopfloor config init --profile {profile_name}` first."
            ))
        })?;

        let auth = SupabaseAuthService::new_for_profile(&profile_name, &config)?;
        let notices: Arc<dyn NoticeSink> = Arc::new(TerminalNoticeSink);
        let api = ApiClient::new(&config, Arc::new(auth.into_session_manager()), notices)?;

        Ok(Self {
            profile_name,
            config,
            api,
        })
    }

    pub fn sync_controller(&self) -> SyncController<ProfileStore> {
        let store = RemoteTransactionStore::new(self.api.clone(), self.config.device_id.clone());
        SyncController::new(store, self.api.notices(), self.config.sync_reset_delay)
    }

    /// Map an unauthenticated failure onto a sign-in hint for this profile.
    pub fn explain(&self, error: shopfloor_core::Error) -> CliError {
        if error.is_auth_failure() {
            CliError::NotSignedIn(self.profile_name.clone())
        } else {
            CliError::Core(error)
        }
    }

    pub fn work_orders(&self) -> WorkOrderClient<ProfileSessionManager> {
        WorkOrderClient::new(self.api.clone())
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListItem {
    pub id: String,
    pub transaction_type: String,
    pub status: TransactionStatus,
    pub device_id: String,
    pub created_at: String,
    pub synced_at: Option<String>,
    pub summary: String,
}

pub fn transaction_to_item(transaction: &OfflineTransaction) -> TransactionListItem {
    TransactionListItem {
        id: transaction.id.clone(),
        transaction_type: transaction.transaction_type.clone(),
        status: transaction.status(),
        device_id: transaction.device_id.clone(),
        created_at: transaction.created_at.to_rfc3339(),
        synced_at: transaction.synced_at.map(|synced_at| synced_at.to_rfc3339()),
        summary: transaction_summary(transaction),
    }
}

pub fn format_transaction_lines(transactions: &[OfflineTransaction]) -> Vec<String> {
    transactions
        .iter()
        .map(|transaction| {
            format!(
                "{}  {:<9}  {:<18}  {}  {}",
                transaction.id,
                transaction.status(),
                transaction.transaction_type,
                format_timestamp(transaction.created_at),
                transaction_summary(transaction)
            )
        })
        .collect()
}

/// One-line description of the payload, or the raw data when it is not a
/// known transaction type.
pub fn transaction_summary(transaction: &OfflineTransaction) -> String {
    transaction.payload().map_or_else(
        |_| shopfloor_core::util::compact_text(&transaction.transaction_data),
        |payload| payload.summary(),
    )
}

pub fn format_stats(stats: &QueueStats) -> String {
    format!(
        "total={} pending={} synced={} conflicts={}",
        stats.total, stats.pending, stats.synced, stats.conflicts
    )
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn format_work_order_lines(order: &WorkOrder) -> Vec<String> {
    vec![
        format!("Work order  {}", order.display_name()),
        format!("Item        {}", order.item_id),
        format!("Status      {}", order.status),
        format!(
            "Produced    {} / {} (remaining {})",
            order.produced_quantity,
            order.planned_quantity,
            order.remaining_quantity()
        ),
    ]
}

/// Ask on stdin; refuses when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(CliError::ConfirmationRequired);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
