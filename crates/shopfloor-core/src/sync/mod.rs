//! Sync orchestration.
//!
//! [`SyncStatus`] is the four-state machine shown to the user; the
//! [`SyncController`] drives it against a [`crate::offline::TransactionStore`].

mod controller;
mod state;

pub use controller::{ClearOutcome, SyncAttempt, SyncController, SyncSnapshot, SyncTrigger};
pub use state::{can_clear_synced, can_sync, check_sync, SkipReason, SyncStatus};
