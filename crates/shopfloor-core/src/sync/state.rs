use std::fmt;

use serde::Serialize;

use crate::offline::QueueStats;

/// `Idle → Syncing → Success | Error → Idle`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success { synced_count: usize, conflicts: usize },
    Error { message: String },
}

impl SyncStatus {
    pub const fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Syncing => f.write_str("syncing"),
            Self::Success {
                synced_count,
                conflicts,
            } => write!(f, "success ({synced_count} synced, {conflicts} conflicts)"),
            Self::Error { message } => write!(f, "error ({message})"),
        }
    }
}

/// Why a sync request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
    NothingPending,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Offline => "device is offline",
            Self::AlreadySyncing => "a sync is already running",
            Self::NothingPending => "no pending transactions",
        };
        f.write_str(label)
    }
}

/// Guard for starting a sync; `Err` names the first failing condition.
pub const fn check_sync(
    is_online: bool,
    status: &SyncStatus,
    pending: usize,
) -> Result<(), SkipReason> {
    if !is_online {
        Err(SkipReason::Offline)
    } else if status.is_syncing() {
        Err(SkipReason::AlreadySyncing)
    } else if pending == 0 {
        Err(SkipReason::NothingPending)
    } else {
        Ok(())
    }
}

pub const fn can_sync(is_online: bool, status: &SyncStatus, pending: usize) -> bool {
    check_sync(is_online, status, pending).is_ok()
}

pub const fn can_clear_synced(stats: &QueueStats) -> bool {
    stats.synced > 0
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sync_guard_covers_every_combination() {
        for is_online in [false, true] {
            for syncing in [false, true] {
                for pending in [0_usize, 3] {
                    let status = if syncing {
                        SyncStatus::Syncing
                    } else {
                        SyncStatus::Idle
                    };
                    let expected = is_online && !syncing && pending > 0;
                    assert_eq!(
                        can_sync(is_online, &status, pending),
                        expected,
                        "online={is_online} syncing={syncing} pending={pending}"
                    );
                }
            }
        }
    }

    #[test]
    fn terminal_states_allow_a_new_sync() {
        let success = SyncStatus::Success {
            synced_count: 1,
            conflicts: 0,
        };
        let error = SyncStatus::Error {
            message: "boom".to_string(),
        };
        assert!(can_sync(true, &success, 1));
        assert!(can_sync(true, &error, 1));
        assert!(success.is_terminal());
        assert!(!SyncStatus::Syncing.is_terminal());
    }

    #[test]
    fn check_sync_reports_offline_first() {
        assert_eq!(
            check_sync(false, &SyncStatus::Syncing, 0),
            Err(SkipReason::Offline)
        );
        assert_eq!(
            check_sync(true, &SyncStatus::Syncing, 0),
            Err(SkipReason::AlreadySyncing)
        );
    }

    #[test]
    fn clear_synced_needs_synced_rows() {
        assert!(!can_clear_synced(&QueueStats::default()));
        assert!(can_clear_synced(&QueueStats {
            total: 1,
            pending: 0,
            synced: 1,
            conflicts: 0,
        }));
    }
}
