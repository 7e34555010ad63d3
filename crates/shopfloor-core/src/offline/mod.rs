//! Offline transaction queue.
//!
//! The queue itself lives on the backend; this module holds its client-side
//! view: the transaction model, the typed payloads recorded in it, summary
//! counts, and the store that proxies list/create/sync/resolve/clear calls.

mod models;
mod payload;
mod stats;
mod store;

pub use models::{ConflictResolution, OfflineTransaction, TransactionStatus};
pub use payload::{PayloadError, TransactionPayload};
pub use stats::QueueStats;
pub use store::{NewTransaction, RemoteTransactionStore, SyncReport, TransactionStore};
