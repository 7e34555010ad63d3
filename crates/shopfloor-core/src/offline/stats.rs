use serde::Serialize;

use super::models::OfflineTransaction;

/// Summary counts derived from the fetched queue.
///
/// `pending` counts every unsynced row, so a conflicted row that has not
/// synced is counted in both `pending` and `conflicts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub synced: usize,
    pub conflicts: usize,
}

impl QueueStats {
    pub fn from_transactions(transactions: &[OfflineTransaction]) -> Self {
        transactions
            .iter()
            .fold(Self::default(), |mut stats, transaction| {
                stats.total += 1;
                if transaction.synced {
                    stats.synced += 1;
                } else {
                    stats.pending += 1;
                }
                if transaction.conflict {
                    stats.conflicts += 1;
                }
                stats
            })
    }
}
