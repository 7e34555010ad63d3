//! Sync controller
//!
//! Owns the client-side view of the offline queue (last fetched rows, derived
//! counts, sync status, reachability) and performs the user-facing
//! operations against a [`TransactionStore`]. Every remote failure is logged,
//! turned into an error notice and returned; nothing is retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use super::state::{can_clear_synced, check_sync, SkipReason, SyncStatus};
use crate::error::{Error, Result};
use crate::notice::{Notice, NoticeSink};
use crate::offline::{
    ConflictResolution, NewTransaction, OfflineTransaction, QueueStats, SyncReport,
    TransactionPayload, TransactionStore,
};

/// What started a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    Reconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAttempt {
    Skipped(SkipReason),
    Completed(SyncReport),
    Failed(String),
    /// The backend refused the session; the user has to sign in again.
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    NothingToClear,
    Cancelled,
    Cleared(usize),
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub is_online: bool,
    pub stats: QueueStats,
    pub transactions: Vec<OfflineTransaction>,
}

struct ControllerState {
    snapshot: SyncSnapshot,
    generation: u64,
}

struct Inner<S> {
    store: S,
    notices: Arc<dyn NoticeSink>,
    reset_delay: Duration,
    state: Mutex<ControllerState>,
}

pub struct SyncController<S: TransactionStore> {
    inner: Arc<Inner<S>>,
}

impl<S: TransactionStore> Clone for SyncController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TransactionStore> SyncController<S> {
    pub fn new(store: S, notices: Arc<dyn NoticeSink>, reset_delay: Duration) -> Self {
        let state = ControllerState {
            snapshot: SyncSnapshot {
                is_online: true,
                ..SyncSnapshot::default()
            },
            generation: 0,
        };
        Self {
            inner: Arc::new(Inner {
                store,
                notices,
                reset_delay,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().snapshot.status.clone()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().snapshot.stats
    }

    pub fn is_online(&self) -> bool {
        self.lock().snapshot.is_online
    }

    pub fn set_online(&self, online: bool) {
        self.lock().snapshot.is_online = online;
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.inner.notices.notify(notice);
    }

    /// Whether a manual sync would be sent right now.
    pub fn can_sync(&self) -> bool {
        let state = self.lock();
        let snapshot = &state.snapshot;
        check_sync(snapshot.is_online, &snapshot.status, snapshot.stats.pending).is_ok()
    }

    /// Conflicting rows from the last fetch, in server order.
    pub fn conflicts(&self) -> Vec<OfflineTransaction> {
        self.lock()
            .snapshot
            .transactions
            .iter()
            .filter(|transaction| transaction.conflict)
            .cloned()
            .collect()
    }

    /// Re-fetch the queue and recompute the counts.
    pub async fn refresh(&self) -> Result<QueueStats> {
        match self.inner.store.list().await {
            Ok(transactions) => {
                let stats = QueueStats::from_transactions(&transactions);
                let mut state = self.lock();
                state.snapshot.transactions = transactions;
                state.snapshot.stats = stats;
                Ok(stats)
            }
            Err(error) => Err(self.report("Failed to load offline transactions", error)),
        }
    }

    /// Ask the backend to reconcile pending transactions.
    ///
    /// Skipped unless online, idle or settled, and something is pending.
    /// Success and error both fall back to idle after the reset delay.
    pub async fn sync_now(&self, trigger: SyncTrigger) -> SyncAttempt {
        let generation = {
            let mut state = self.lock();
            let snapshot = &state.snapshot;
            if let Err(reason) =
                check_sync(snapshot.is_online, &snapshot.status, snapshot.stats.pending)
            {
                tracing::debug!(?trigger, %reason, "Sync skipped");
                return SyncAttempt::Skipped(reason);
            }
            state.snapshot.status = SyncStatus::Syncing;
            state.generation += 1;
            state.generation
        };
        tracing::info!(?trigger, "Starting sync");

        let attempt = match self.inner.store.sync().await {
            Ok(report) if report.success => {
                self.set_status(SyncStatus::Success {
                    synced_count: report.synced_count,
                    conflicts: report.conflicts,
                });
                tracing::info!(
                    synced = report.synced_count,
                    conflicts = report.conflicts,
                    "Sync finished"
                );
                self.inner.notices.notify(Notice::success(format!(
                    "Synced {} transaction(s)",
                    report.synced_count
                )));
                if report.conflicts > 0 {
                    self.inner.notices.notify(Notice::warning(format!(
                        "{} conflict(s) need resolution",
                        report.conflicts
                    )));
                }
                SyncAttempt::Completed(report)
            }
            Ok(report) => {
                let message = report
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Sync failed".to_string());
                self.fail_sync(&message);
                SyncAttempt::Failed(message)
            }
            Err(error) if error.is_auth_failure() => {
                self.fail_sync(&error.to_string());
                SyncAttempt::SignedOut
            }
            Err(error) => {
                let message = error.to_string();
                self.fail_sync(&message);
                SyncAttempt::Failed(message)
            }
        };

        self.schedule_reset(generation);
        if matches!(attempt, SyncAttempt::Completed(_)) {
            if let Err(error) = self.refresh().await {
                tracing::warn!(%error, "Sync finished but the queue could not be reloaded");
            }
        }
        attempt
    }

    /// Queue the synthetic test transaction.
    pub async fn create_test_transaction(&self) -> Result<QueueStats> {
        let transaction = NewTransaction::test(self.inner.store.device_id())
            .map_err(|error| self.report("Failed to create test transaction", error.into()))?;
        self.create(transaction, "Test transaction created").await
    }

    /// Queue a typed business transaction.
    pub async fn enqueue(&self, payload: &TransactionPayload) -> Result<QueueStats> {
        let transaction = NewTransaction::from_payload(payload, self.inner.store.device_id())
            .map_err(|error| self.report("Invalid transaction", error.into()))?;
        let message = format!("Queued {} transaction", payload.kind());
        self.create(transaction, &message).await
    }

    /// Forward one conflict decision, then re-fetch the whole queue.
    ///
    /// The local copy is never patched; the refreshed list is the only source
    /// of the row's new state.
    pub async fn resolve_conflict(
        &self,
        id: &str,
        resolution: ConflictResolution,
    ) -> Result<QueueStats> {
        if let Err(error) = self.inner.store.resolve_conflict(id, resolution).await {
            return Err(self.report("Failed to resolve conflict", error));
        }
        self.inner.notices.notify(Notice::success(format!(
            "Conflict resolved ({resolution})"
        )));
        self.refresh().await
    }

    /// Delete synced rows after `confirm` approves the count.
    ///
    /// Nothing is sent when the last fetch showed no synced rows.
    pub async fn clear_synced<F>(&self, confirm: F) -> Result<ClearOutcome>
    where
        F: FnOnce(usize) -> bool,
    {
        let stats = self.stats();
        if !can_clear_synced(&stats) {
            return Ok(ClearOutcome::NothingToClear);
        }
        let synced = stats.synced;
        if !confirm(synced) {
            return Ok(ClearOutcome::Cancelled);
        }

        if let Err(error) = self.inner.store.clear_synced().await {
            return Err(self.report("Failed to clear synced transactions", error));
        }
        self.inner.notices.notify(Notice::success(format!(
            "Cleared {synced} synced transaction(s)"
        )));
        self.refresh().await?;
        Ok(ClearOutcome::Cleared(synced))
    }

    async fn create(&self, transaction: NewTransaction, message: &str) -> Result<QueueStats> {
        if let Err(error) = self.inner.store.create(transaction).await {
            return Err(self.report("Failed to queue transaction", error));
        }
        self.inner.notices.notify(Notice::success(message));
        self.refresh().await
    }

    fn fail_sync(&self, message: &str) {
        tracing::debug!(%message, "Sync failed");
        self.set_status(SyncStatus::Error {
            message: message.to_string(),
        });
        self.inner
            .notices
            .notify(Notice::error(format!("Sync failed: {message}")));
    }

    fn schedule_reset(&self, generation: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.reset_delay).await;
            let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation == generation && state.snapshot.status.is_terminal() {
                state.snapshot.status = SyncStatus::Idle;
            }
        });
    }

    fn set_status(&self, status: SyncStatus) {
        self.lock().snapshot.status = status;
    }

    fn report(&self, context: &str, error: Error) -> Error {
        tracing::debug!("{context}: {error}");
        self.inner
            .notices
            .notify(Notice::error(format!("{context}: {error}")));
        error
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
