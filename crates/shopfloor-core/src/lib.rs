//! shopfloor-core - Core library for Shopfloor
//!
//! This crate contains the offline transaction models, the REST client for the
//! hosted functions backend, the sync controller and connectivity monitor, and
//! the work-order lifecycle rules shared by every Shopfloor interface.

pub mod api;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod notice;
pub mod offline;
pub mod sync;
pub mod util;
pub mod workorder;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use offline::{ConflictResolution, OfflineTransaction, QueueStats, TransactionPayload};
pub use sync::{SyncController, SyncStatus};
pub use workorder::{WorkOrder, WorkOrderEvent, WorkOrderStatus};
