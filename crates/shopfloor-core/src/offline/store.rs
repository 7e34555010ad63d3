//! Remote transaction store

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::models::{ConflictResolution, OfflineTransaction};
use super::payload::{PayloadError, TransactionPayload};
use crate::api::{path_segment, ApiClient};
use crate::auth::SessionProvider;
use crate::error::{Error, Result};

const TRANSACTIONS_PATH: &str = "/offline/transactions";
const SYNC_PATH: &str = "/offline/sync";
const RESOLVE_PATH: &str = "/offline/resolve";
const CLEAR_SYNCED_PATH: &str = "/offline/clear-synced";

/// Trait for offline queue operations
pub trait TransactionStore: Send + Sync + 'static {
    /// Device identifier stamped on transactions created through this store
    fn device_id(&self) -> &str;

    /// Fetch every queued transaction
    fn list(&self) -> impl Future<Output = Result<Vec<OfflineTransaction>>> + Send;

    /// Enqueue a new transaction
    fn create(&self, transaction: NewTransaction) -> impl Future<Output = Result<()>> + Send;

    /// Ask the backend to reconcile all pending transactions
    fn sync(&self) -> impl Future<Output = Result<SyncReport>> + Send;

    /// Record the user's decision for one conflicting transaction
    fn resolve_conflict(
        &self,
        id: &str,
        resolution: ConflictResolution,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete every synced transaction
    fn clear_synced(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Request body for creating a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTransaction {
    pub transaction_type: String,
    pub transaction_data: String,
    pub device_id: String,
}

impl NewTransaction {
    pub fn from_payload(
        payload: &TransactionPayload,
        device_id: impl Into<String>,
    ) -> std::result::Result<Self, PayloadError> {
        let (transaction_type, transaction_data) = payload.encode()?;
        Ok(Self {
            transaction_type,
            transaction_data,
            device_id: device_id.into(),
        })
    }

    /// Synthetic transaction for exercising the queue.
    pub fn test(device_id: impl Into<String>) -> std::result::Result<Self, PayloadError> {
        let message = format!(
            "Test transaction created at {}",
            chrono::Utc::now().to_rfc3339()
        );
        Self::from_payload(&TransactionPayload::test(message), device_id)
    }
}

/// Aggregate result of a sync request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub synced_count: usize,
    #[serde(default)]
    pub conflicts: usize,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResolveRequest {
    resolution: ConflictResolution,
}

/// `TransactionStore` backed by the functions REST API
pub struct RemoteTransactionStore<P: SessionProvider> {
    api: ApiClient<P>,
    device_id: String,
}

impl<P: SessionProvider> RemoteTransactionStore<P> {
    pub fn new(api: ApiClient<P>, device_id: impl Into<String>) -> Self {
        Self {
            api,
            device_id: device_id.into(),
        }
    }
}

impl<P: SessionProvider> TransactionStore for RemoteTransactionStore<P> {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn list(&self) -> Result<Vec<OfflineTransaction>> {
        let response: Value = self.api.get(TRANSACTIONS_PATH).await?;
        let transactions = decode_rows(list_rows(response)?);
        tracing::debug!(count = transactions.len(), "Fetched offline transactions");
        Ok(transactions)
    }

    async fn create(&self, transaction: NewTransaction) -> Result<()> {
        if transaction.device_id.trim().is_empty() {
            return Err(Error::InvalidInput("device_id is required".to_string()));
        }
        let _: serde_json::Value = self.api.post(TRANSACTIONS_PATH, &transaction).await?;
        tracing::info!(
            transaction_type = %transaction.transaction_type,
            "Queued offline transaction"
        );
        Ok(())
    }

    async fn sync(&self) -> Result<SyncReport> {
        self.api.post_empty(SYNC_PATH).await
    }

    async fn resolve_conflict(&self, id: &str, resolution: ConflictResolution) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::InvalidInput(
                "transaction id cannot be empty".to_string(),
            ));
        }
        let path = format!("{RESOLVE_PATH}/{}", path_segment(id));
        let _: serde_json::Value = self.api.post(&path, &ResolveRequest { resolution }).await?;
        tracing::info!(transaction_id = %id, %resolution, "Resolved conflict");
        Ok(())
    }

    async fn clear_synced(&self) -> Result<()> {
        let _: serde_json::Value = self.api.delete(CLEAR_SYNCED_PATH).await?;
        Ok(())
    }
}

/// Accepts a bare array or `{ "transactions": [...] }`.
fn list_rows(response: Value) -> Result<Vec<Value>> {
    match response {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut body) => match body.remove("transactions") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(Error::UnexpectedResponse(
                "transaction list is missing a `transactions` array".to_string(),
            )),
        },
        _ => Err(Error::UnexpectedResponse(
            "transaction list is not an array".to_string(),
        )),
    }
}

/// Rows that fail to decode are logged and left out; the rest still load.
fn decode_rows(rows: Vec<Value>) -> Vec<OfflineTransaction> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_str).map(str::to_string);
            serde_json::from_value::<OfflineTransaction>(row)
                .map_err(|error| {
                    tracing::warn!(
                        transaction_id = id.as_deref().unwrap_or("?"),
                        %error,
                        "Skipping unreadable offline transaction"
                    );
                })
                .ok()
        })
        .collect()
}
