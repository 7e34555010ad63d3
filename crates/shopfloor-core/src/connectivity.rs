//! Connectivity monitoring
//!
//! Raw reachability signals are reduced to offline/online edges. Coming back
//! online triggers exactly one automatic sync per edge; going offline marks
//! the controller so manual syncs are refused.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;

use crate::error::Result;
use crate::notice::Notice;
use crate::offline::TransactionStore;
use crate::sync::{SyncAttempt, SyncController, SyncTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Online,
    Offline,
}

/// Edge detector over reachability signals.
#[derive(Debug, Clone, Copy)]
pub struct ConnectivityMonitor {
    online: bool,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Starts from the assumption that the device is online.
    pub const fn new() -> Self {
        Self { online: true }
    }

    pub const fn is_online(&self) -> bool {
        self.online
    }

    /// Record a signal; returns the edge it caused, if any.
    pub fn observe(&mut self, online: bool) -> Option<Transition> {
        if online == self.online {
            return None;
        }
        self.online = online;
        Some(if online {
            Transition::Online
        } else {
            Transition::Offline
        })
    }
}

/// Apply one edge to the controller.
///
/// Returns the automatic sync attempt for an online edge.
pub async fn apply_transition<S: TransactionStore>(
    controller: &SyncController<S>,
    transition: Transition,
) -> Option<SyncAttempt> {
    match transition {
        Transition::Offline => {
            tracing::warn!("Connection lost");
            controller.set_online(false);
            controller.notify(Notice::warning(
                "You are offline. Changes are kept on the server queue until the connection returns.",
            ));
            None
        }
        Transition::Online => {
            tracing::info!("Connection restored");
            controller.set_online(true);
            controller.notify(Notice::info("Back online. Syncing pending transactions."));
            // Failures are already reported through the controller's notices.
            let _ = controller.refresh().await;
            Some(controller.sync_now(SyncTrigger::Reconnect).await)
        }
    }
}

/// Drive the controller from a reachability channel until the sender drops.
pub async fn run_monitor<S: TransactionStore>(
    mut signals: watch::Receiver<bool>,
    controller: SyncController<S>,
) {
    let mut monitor = ConnectivityMonitor::new();
    let initial = *signals.borrow_and_update();
    if let Some(transition) = monitor.observe(initial) {
        apply_transition(&controller, transition).await;
    }

    while signals.changed().await.is_ok() {
        let online = *signals.borrow_and_update();
        if let Some(transition) = monitor.observe(online) {
            apply_transition(&controller, transition).await;
        }
    }
    tracing::debug!("Connectivity monitor stopped");
}

/// Polls a URL and reports whether anything answered.
#[derive(Clone)]
pub struct HttpReachabilityProbe {
    http: Client,
    url: String,
    interval: Duration,
}

impl HttpReachabilityProbe {
    pub fn new(url: impl Into<String>, interval: Duration, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            interval,
        })
    }

    /// Any HTTP response counts as reachable, including error statuses.
    pub async fn check(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Reachability check failed: {error}");
                false
            }
        }
    }

    /// Publish a signal every interval until all receivers are gone.
    pub async fn run(self, sender: watch::Sender<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let online = self.check().await;
            if sender.send(online).is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::notice::{NoticeLevel, NoticeSink};
    use crate::sync::SkipReason;
    use crate::test_support::{row, FakeServer, FakeStore, RecordingSink};

    fn controller(store: FakeStore) -> (SyncController<FakeStore>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let notices: Arc<dyn NoticeSink> = sink.clone();
        (
            SyncController::new(store, notices, Duration::from_secs(3)),
            sink,
        )
    }

    #[test]
    fn repeated_signals_do_not_produce_edges() {
        let mut monitor = ConnectivityMonitor::new();
        assert_eq!(monitor.observe(true), None);
        assert_eq!(monitor.observe(false), Some(Transition::Offline));
        assert_eq!(monitor.observe(false), None);
        assert_eq!(monitor.observe(true), Some(Transition::Online));
        assert_eq!(monitor.observe(true), None);
        assert!(monitor.is_online());
    }

    #[test]
    fn flapping_yields_one_online_edge_per_reconnect() {
        let mut monitor = ConnectivityMonitor::new();
        let online_edges = [false, true, false, true, true, false, true]
            .into_iter()
            .filter_map(|signal| monitor.observe(signal))
            .filter(|edge| *edge == Transition::Online)
            .count();
        assert_eq!(online_edges, 3);
    }

    #[tokio::test]
    async fn going_offline_warns_and_blocks_manual_sync() {
        let (controller, sink) = controller(FakeStore::new(vec![row("a", false, false)]));
        controller.refresh().await.unwrap();

        assert_eq!(apply_transition(&controller, Transition::Offline).await, None);
        assert!(!controller.is_online());
        assert_eq!(sink.notices()[0].level, NoticeLevel::Warning);
        assert_eq!(
            controller.sync_now(SyncTrigger::Manual).await,
            SyncAttempt::Skipped(SkipReason::Offline)
        );
    }

    #[tokio::test]
    async fn reconnect_refreshes_and_syncs_once() {
        let (controller, sink) = controller(FakeStore::new(vec![row("a", false, false)]));
        controller.set_online(false);

        let attempt = apply_transition(&controller, Transition::Online).await;
        assert!(matches!(attempt, Some(SyncAttempt::Completed(_))));
        assert!(controller.is_online());
        assert_eq!(FakeStore::calls(&controller.store().sync_calls), 1);
        assert_eq!(sink.notices()[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn reconnect_with_empty_queue_skips_sync() {
        let (controller, _) = controller(FakeStore::new(vec![row("a", true, false)]));
        controller.set_online(false);

        let attempt = apply_transition(&controller, Transition::Online).await;
        assert_eq!(attempt, Some(SyncAttempt::Skipped(SkipReason::NothingPending)));
        assert_eq!(FakeStore::calls(&controller.store().sync_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_follows_channel_until_sender_drops() {
        let (controller, _) = controller(FakeStore::new(vec![row("a", false, false)]));
        let (sender, receiver) = watch::channel(true);
        let task = tokio::spawn(run_monitor(receiver, controller.clone()));

        sender.send(false).unwrap();
        while controller.is_online() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        sender.send(true).unwrap();
        while FakeStore::calls(&controller.store().sync_calls) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(sender);
        task.await.unwrap();
        assert!(controller.is_online());
        assert_eq!(FakeStore::calls(&controller.store().sync_calls), 1);
    }

    #[tokio::test]
    async fn probe_treats_error_status_as_reachable() {
        let server = FakeServer::start(vec![(500, "{}".to_string())]).await;
        let probe =
            HttpReachabilityProbe::new(server.url(), Duration::from_secs(1), Duration::from_secs(2))
                .unwrap();
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn probe_reports_refused_connection_as_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpReachabilityProbe::new(
            format!("http://{address}"),
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(!probe.check().await);
    }
}
