//! Live buy detection for a single token
//!
//! The monitor watches every transaction that touches a mint, either through
//! a `logsSubscribe` push feed or by polling recent signatures, and publishes
//! one [`BuyEvent`] per wallet whose balance of the mint went up.
//!
//! Lifecycle: `Idle -> Priming -> Active -> Stopped`. Priming marks the most
//! recent signatures as seen so historical buys are not reported.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::rpc::{SolanaRpc, TransactionDetail};
use crate::stream::dedup::SignatureSet;
use crate::stream::logs::{LogNotification, LogsClient, LogsConfig, LogsEvent};

/// A wallet increased its balance of the watched token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyEvent {
    pub wallet: String,
    pub signature: String,
    pub token: String,
}

/// Transport used while active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    /// WebSocket `logsSubscribe`
    Push,
    /// Periodic `getSignaturesForAddress`
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Priming,
    Active,
    Stopped,
}

/// Wallets whose balance of `mint` grew in this transaction.
///
/// Owners come out in order of first appearance (pre-balances, then
/// post-balances). A side with no entry for an owner counts as zero.
pub fn extract_buyers(tx: &TransactionDetail, mint: &str) -> Vec<String> {
    tx.token_deltas(mint)
        .into_iter()
        .filter(|(_, pre, post)| post > pre)
        .map(|(owner, _, _)| owner)
        .collect()
}

pub struct TransactionMonitor {
    rpc: Arc<dyn SolanaRpc>,
    token: String,
    ws_url: String,
    config: MonitorConfig,
    seen: SignatureSet,
    state: MonitorState,
    event_tx: mpsc::Sender<BuyEvent>,
    cancel: CancellationToken,
}

impl TransactionMonitor {
    /// Create a monitor and the receiving end of its buy event channel
    pub fn new(
        rpc: Arc<dyn SolanaRpc>,
        token: impl Into<String>,
        ws_url: impl Into<String>,
        config: MonitorConfig,
    ) -> (Self, mpsc::Receiver<BuyEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let seen = SignatureSet::new(config.dedup_capacity, config.dedup_retain);

        let monitor = Self {
            rpc,
            token: token.into(),
            ws_url: ws_url.into(),
            config,
            seen,
            state: MonitorState::Idle,
            event_tx,
            cancel: CancellationToken::new(),
        };

        (monitor, event_rx)
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Token that stops the monitor when cancelled, usable from other tasks
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request a cooperative stop. In-flight calls finish; no new cycle starts.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Mark the latest signatures as seen. Returns how many were loaded.
    ///
    /// Failure is logged and monitoring carries on with whatever is already seen.
    pub async fn prime(&mut self) -> usize {
        self.state = MonitorState::Priming;

        match self
            .rpc
            .get_signatures_for_address(&self.token, self.config.prime_signature_limit)
            .await
        {
            Ok(sigs) => {
                let loaded = sigs.iter().filter(|s| self.seen.insert(&s.signature)).count();
                info!("Loaded {} existing signatures", loaded);
                loaded
            }
            Err(e) => {
                warn!("Could not load existing signatures: {}", e);
                0
            }
        }
    }

    /// One polling pass. Returns the number of new signatures handled.
    pub async fn poll_cycle(&mut self) -> Result<usize> {
        let sigs = self
            .rpc
            .get_signatures_for_address(&self.token, self.config.poll_signature_limit)
            .await?;

        let mut handled = 0;
        for sig in sigs {
            if self.cancel.is_cancelled() {
                break;
            }
            let new = if sig.err.is_some() {
                self.skip_failed(&sig.signature)
            } else {
                self.process_signature(&sig.signature).await.is_some()
            };
            if new {
                handled += 1;
            }
        }

        Ok(handled)
    }

    /// Handle a signature if it has not been seen yet.
    ///
    /// Returns `None` for duplicates, otherwise the number of buy events
    /// published. The signature stays marked as seen even if the fetch fails.
    pub async fn process_signature(&mut self, signature: &str) -> Option<usize> {
        if !self.seen.insert(signature) {
            return None;
        }

        let tx = match self.rpc.get_transaction(signature).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                debug!(signature = %signature, "Transaction not available yet");
                return Some(0);
            }
            Err(e) => {
                let short: String = signature.chars().take(20).collect();
                warn!("Error getting transaction {}...: {}", short, e);
                return Some(0);
            }
        };

        let mut published = 0;
        for wallet in extract_buyers(&tx, &self.token) {
            info!(wallet = %wallet, signature = %signature, "Buy detected");
            let event = BuyEvent {
                wallet,
                signature: signature.to_string(),
                token: self.token.clone(),
            };
            if self.event_tx.send(event).await.is_err() {
                warn!("Buy event receiver dropped, stopping monitor");
                self.cancel.cancel();
                break;
            }
            published += 1;
        }

        Some(published)
    }

    /// Mark a signature that failed on chain as seen without fetching it.
    ///
    /// A failed transaction moves no balances, so both transports drop it
    /// here. Returns whether it was new.
    fn skip_failed(&mut self, signature: &str) -> bool {
        let new = self.seen.insert(signature);
        if new {
            debug!(signature = %signature, "Skipping failed transaction");
        }
        new
    }

    async fn handle_log(&mut self, log: LogNotification) {
        if log.failed {
            self.skip_failed(&log.signature);
            return;
        }
        self.process_signature(&log.signature).await;
    }

    /// Prime, then run in `mode` until stopped
    pub async fn run(&mut self, mode: MonitorMode) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.state = MonitorState::Stopped;
            return Ok(());
        }

        self.prime().await;
        self.state = MonitorState::Active;
        info!(token = %self.token, ?mode, "Monitoring started");

        let result = match mode {
            MonitorMode::Push => self.run_push().await,
            MonitorMode::Poll => self.run_poll().await,
        };

        self.state = MonitorState::Stopped;
        info!(token = %self.token, "Monitoring stopped");
        result
    }

    async fn run_poll(&mut self) -> Result<()> {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        info!("Starting transaction polling every {:?}", interval);

        while !self.cancel.is_cancelled() {
            if let Err(e) = self.poll_cycle().await {
                warn!("Polling error: {}", e);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        Ok(())
    }

    async fn run_push(&mut self) -> Result<()> {
        let (log_tx, mut log_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let client = LogsClient::new(
            LogsConfig {
                ws_url: self.ws_url.clone(),
                reconnect_delay_ms: self.config.reconnect_delay_ms,
                ping_interval_secs: self.config.ping_interval_secs,
            },
            log_tx,
        );
        let stream_cancel = self.cancel.child_token();
        let handle = client.start(self.token.clone(), stream_cancel.clone());

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = log_rx.recv() => match event {
                    Some(LogsEvent::Log(log)) => self.handle_log(log).await,
                    Some(LogsEvent::Subscribed(id)) => debug!(subscription = id, "Logs subscription active"),
                    Some(LogsEvent::Connected) => debug!("Logs stream connected"),
                    Some(LogsEvent::Disconnected) => debug!("Logs stream disconnected"),
                    None => break,
                },
            }
        }

        stream_cancel.cancel();
        handle
            .await
            .map_err(|e| Error::Internal(format!("Logs task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{balance_change_tx, failed_sig, sig, MockRpc};

    const MINT: &str = "MintAddr1111111111111111111111111111111111";

    fn config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_secs: 1,
            ..MonitorConfig::default()
        }
    }

    fn monitor_with(rpc: MockRpc, cfg: MonitorConfig) -> (TransactionMonitor, mpsc::Receiver<BuyEvent>) {
        TransactionMonitor::new(Arc::new(rpc), MINT, "ws://127.0.0.1:1", cfg)
    }

    #[test]
    fn test_extract_buyers_ordering_and_missing_sides() {
        let tx = balance_change_tx(
            MINT,
            &[
                ("seller", 100.0, 40.0),
                ("topup", 5.0, 10.0),
                ("newbie", 0.0, 50.0),
                ("flat", 7.0, 7.0),
            ],
        );
        assert_eq!(extract_buyers(&tx, MINT), vec!["topup", "newbie"]);
        assert!(extract_buyers(&tx, "OtherMint").is_empty());
    }

    #[tokio::test]
    async fn test_same_signature_emits_once() {
        let rpc = MockRpc::new().with_transaction("sigA", balance_change_tx(MINT, &[("buyer", 0.0, 10.0)]));
        let (mut monitor, mut rx) = monitor_with(rpc, config());

        assert_eq!(monitor.process_signature("sigA").await, Some(1));
        assert_eq!(monitor.process_signature("sigA").await, None);

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            BuyEvent {
                wallet: "buyer".into(),
                signature: "sigA".into(),
                token: MINT.into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_prime_suppresses_history() {
        let rpc = MockRpc::new()
            .with_signatures(MINT, vec![sig("old1", 2, None), sig("old2", 1, None)])
            .with_transaction("old1", balance_change_tx(MINT, &[("buyer", 0.0, 10.0)]));
        let rpc = Arc::new(rpc);
        let (mut monitor, mut rx) =
            TransactionMonitor::new(rpc.clone(), MINT, "ws://127.0.0.1:1", config());

        assert_eq!(monitor.prime().await, 2);
        assert_eq!(monitor.poll_cycle().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(rpc.fetch_count("old1"), 0);
    }

    #[tokio::test]
    async fn test_priming_failure_is_not_fatal() {
        let rpc = MockRpc::new().failing(MINT);
        let (mut monitor, _rx) = monitor_with(rpc, config());
        assert_eq!(monitor.prime().await, 0);
        assert_eq!(monitor.seen_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_stays_seen() {
        let rpc = Arc::new(MockRpc::new().failing("broken"));
        let (mut monitor, mut rx) =
            TransactionMonitor::new(rpc.clone(), MINT, "ws://127.0.0.1:1", config());

        assert_eq!(monitor.process_signature("broken").await, Some(0));
        assert_eq!(monitor.process_signature("broken").await, None);
        assert_eq!(rpc.fetch_count("broken"), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_cycle_publishes_in_discovery_order() {
        let rpc = MockRpc::new()
            .with_signatures(MINT, vec![sig("s2", 20, None), sig("s1", 10, None)])
            .with_transaction("s2", balance_change_tx(MINT, &[("w2a", 0.0, 1.0), ("w2b", 1.0, 3.0)]))
            .with_transaction("s1", balance_change_tx(MINT, &[("w1", 0.0, 5.0), ("seller", 5.0, 0.0)]));
        let (mut monitor, mut rx) = monitor_with(rpc, config());

        assert_eq!(monitor.poll_cycle().await.unwrap(), 2);

        let wallets: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.wallet)
            .collect();
        // w2b appears in the pre-balances, so it is discovered before w2a
        assert_eq!(wallets, vec!["w2b", "w2a", "w1"]);

        // Nothing new on the next pass
        assert_eq!(monitor.poll_cycle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dedup_trim_does_not_redeliver_recent() {
        let cfg = MonitorConfig {
            dedup_capacity: 1000,
            dedup_retain: 500,
            ..config()
        };
        let (mut monitor, _rx) = monitor_with(MockRpc::new(), cfg);

        for i in 0..1001 {
            monitor.process_signature(&format!("sig{}", i)).await;
        }
        assert!(monitor.seen_count() <= 500);
        assert_eq!(monitor.process_signature("sig1000").await, None);
        assert_eq!(monitor.process_signature("sig999").await, None);
    }

    #[tokio::test]
    async fn test_failed_log_is_skipped_but_seen() {
        let rpc = Arc::new(MockRpc::new());
        let (mut monitor, _rx) =
            TransactionMonitor::new(rpc.clone(), MINT, "ws://127.0.0.1:1", config());

        monitor
            .handle_log(LogNotification {
                signature: "failedSig".into(),
                slot: 1,
                failed: true,
            })
            .await;
        assert_eq!(rpc.fetch_count("failedSig"), 0);
        assert_eq!(monitor.process_signature("failedSig").await, None);
    }

    #[tokio::test]
    async fn test_failed_signature_is_skipped_when_polling() {
        let rpc = Arc::new(
            MockRpc::new()
                .with_signatures(MINT, vec![failed_sig("failedSig", 2), sig("okSig", 1, None)])
                .with_transaction("failedSig", balance_change_tx(MINT, &[("ghost", 0.0, 1.0)]))
                .with_transaction("okSig", balance_change_tx(MINT, &[("buyer", 0.0, 1.0)])),
        );
        let (mut monitor, mut rx) =
            TransactionMonitor::new(rpc.clone(), MINT, "ws://127.0.0.1:1", config());

        assert_eq!(monitor.poll_cycle().await.unwrap(), 2);
        assert_eq!(rpc.fetch_count("failedSig"), 0);
        assert_eq!(rx.try_recv().unwrap().wallet, "buyer");
        assert!(rx.try_recv().is_err());
        assert_eq!(monitor.poll_cycle().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_poll_until_stopped() {
        let cfg = MonitorConfig {
            prime_signature_limit: 0,
            ..config()
        };
        let rpc = MockRpc::new()
            .with_signatures(MINT, vec![sig("fresh", 5, None)])
            .with_transaction("fresh", balance_change_tx(MINT, &[("buyer", 0.0, 2.0)]));
        let (mut monitor, mut rx) = monitor_with(rpc, cfg);
        let stop = monitor.stop_handle();
        assert_eq!(monitor.state(), MonitorState::Idle);

        let task = tokio::spawn(async move {
            monitor.run(MonitorMode::Poll).await.unwrap();
            monitor.state()
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.wallet, "buyer");

        stop.cancel();
        assert_eq!(task.await.unwrap(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_run_after_stop_returns_immediately() {
        let (mut monitor, _rx) = monitor_with(MockRpc::new(), config());
        monitor.stop();
        monitor.run(MonitorMode::Push).await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }
}
