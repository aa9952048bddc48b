//! Wallet history reconstruction and age classification
//!
//! A wallet's "age" here is about trading experience, not wall-clock time:
//! the number of distinct mints it has touched in its recent history decides
//! whether it is fresh, semi-new or old.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::rpc::{SolanaRpc, LAMPORTS_PER_SOL};

/// Trading-diversity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletAge {
    /// No other token activity
    Fresh,
    /// Some activity, below the old threshold
    SemiNew,
    /// At or above the old threshold
    Old,
}

impl fmt::Display for WalletAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletAge::Fresh => write!(f, "FRESH"),
            WalletAge::SemiNew => write!(f, "SEMI_NEW"),
            WalletAge::Old => write!(f, "OLD"),
        }
    }
}

/// Classify by unique token count against the old-wallet threshold
pub fn classify(unique_tokens: usize, old_threshold: usize) -> WalletAge {
    if unique_tokens == 0 {
        WalletAge::Fresh
    } else if unique_tokens < old_threshold {
        WalletAge::SemiNew
    } else {
        WalletAge::Old
    }
}

/// Reconstructed profile of one wallet
#[derive(Debug, Clone, Serialize)]
pub struct WalletRecord {
    pub address: String,
    pub age: WalletAge,
    pub unique_token_count: usize,
    /// Block time of the oldest fetched signature
    pub first_tx_time: Option<DateTime<Utc>>,
    /// First account that sent SOL in the oldest fetched transaction
    pub funder: Option<String>,
    /// Native balance in SOL, `None` if the lookup failed
    pub sol_balance: Option<f64>,
    pub total_transactions: usize,
}

pub struct WalletAnalyzer {
    rpc: Arc<dyn SolanaRpc>,
    config: AnalyzerConfig,
}

impl WalletAnalyzer {
    pub fn new(rpc: Arc<dyn SolanaRpc>, config: AnalyzerConfig) -> Self {
        Self { rpc, config }
    }

    /// Walk the wallet's recent history and classify it.
    ///
    /// `exclude` is the token currently being watched; it does not count
    /// towards diversity. Only the initial signature fetch can fail the call.
    pub async fn analyze(&self, address: &str, exclude: Option<&str>) -> Result<WalletRecord> {
        let signatures = self
            .rpc
            .get_signatures_for_address(address, self.config.signature_limit)
            .await?;

        // Newest first on the wire, so the last entry is the oldest we can see
        let Some(oldest) = signatures.last() else {
            debug!(wallet = %address, "No transaction history");
            return Ok(WalletRecord {
                address: address.to_string(),
                age: WalletAge::Fresh,
                unique_token_count: 0,
                first_tx_time: None,
                funder: None,
                sol_balance: self.sol_balance(address).await,
                total_transactions: 0,
            });
        };

        let first_tx_time = oldest.block_time_utc();
        let funder = match self.rpc.get_transaction(&oldest.signature).await {
            Ok(Some(tx)) => tx.native_funder(address),
            Ok(None) => None,
            Err(e) => {
                debug!(wallet = %address, "Funder lookup failed: {}", e);
                None
            }
        };

        let pacing = Duration::from_millis(self.config.pacing_delay_ms);
        let mut unique_tokens: HashSet<String> = HashSet::new();

        for sig in signatures.iter().take(self.config.diversity_scan_limit) {
            match self.rpc.get_transaction(&sig.signature).await {
                Ok(Some(tx)) => unique_tokens.extend(tx.traded_mints(None, exclude)),
                Ok(None) => {}
                Err(e) => debug!(signature = %sig.signature, "Skipping transaction: {}", e),
            }

            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
        }

        let unique_token_count = unique_tokens.len();

        Ok(WalletRecord {
            address: address.to_string(),
            age: classify(unique_token_count, self.config.old_wallet_threshold),
            unique_token_count,
            first_tx_time,
            funder,
            sol_balance: self.sol_balance(address).await,
            total_transactions: signatures.len(),
        })
    }

    async fn sol_balance(&self, address: &str) -> Option<f64> {
        match self.rpc.get_balance(address).await {
            Ok(lamports) => Some(lamports as f64 / LAMPORTS_PER_SOL),
            Err(e) => {
                warn!(wallet = %address, "Balance lookup failed: {}", e);
                None
            }
        }
    }
}

/// `first8...last8`, or the whole string if it is short
pub fn truncate_address(address: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= head + tail {
        return address.to_string();
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", start, end)
}

/// Human-readable report for one analysed buyer
pub fn format_wallet_report(record: &WalletRecord) -> String {
    let rule = "─".repeat(60);

    let first_tx = record
        .first_tx_time
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let funder = record
        .funder
        .as_deref()
        .map(|f| truncate_address(f, 8, 8))
        .unwrap_or_else(|| "Unknown".to_string());
    let balance = record
        .sol_balance
        .map(|b| format!("{:.4} SOL", b))
        .unwrap_or_else(|| "Unknown".to_string());

    format!(
        "[{}] NEW BUYER DETECTED\n{}\n\
         Wallet:        {}\n\
         Status:        {}\n\
         Unique Tokens: {} different tokens traded\n\
         Total Txns:    {} transactions\n\
         First Txn:     {}\n\
         Funded By:     {}\n\
         SOL Balance:   {}\n{}",
        Local::now().format("%H:%M:%S"),
        rule,
        truncate_address(&record.address, 20, 10),
        record.age,
        record.unique_token_count,
        record.total_transactions,
        first_tx,
        funder,
        balance,
        rule,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::{funding_tx, holdings_tx, sig, MockRpc};

    const WALLET: &str = "Wa11et1111111111111111111111111111111111111";

    fn fast_config() -> AnalyzerConfig {
        AnalyzerConfig {
            pacing_delay_ms: 0,
            ..AnalyzerConfig::default()
        }
    }

    #[test]
    fn test_classify_tiers() {
        assert_eq!(classify(0, 5), WalletAge::Fresh);
        assert_eq!(classify(4, 5), WalletAge::SemiNew);
        assert_eq!(classify(5, 5), WalletAge::Old);
        assert_eq!(classify(1, 1), WalletAge::Old);
    }

    #[test]
    fn test_age_display() {
        assert_eq!(WalletAge::SemiNew.to_string(), "SEMI_NEW");
        assert_eq!(WalletAge::Fresh.to_string(), "FRESH");
    }

    #[tokio::test]
    async fn test_empty_history_is_fresh() {
        let rpc = MockRpc::new().with_balance(WALLET, 2_500_000_000);
        let analyzer = WalletAnalyzer::new(Arc::new(rpc), fast_config());

        let record = analyzer.analyze(WALLET, None).await.unwrap();
        assert_eq!(record.age, WalletAge::Fresh);
        assert_eq!(record.total_transactions, 0);
        assert!(record.first_tx_time.is_none());
        assert!(record.funder.is_none());
        assert_eq!(record.sol_balance, Some(2.5));
    }

    #[tokio::test]
    async fn test_reconstructs_history() {
        let rpc = MockRpc::new()
            .with_signatures(
                WALLET,
                vec![
                    sig("buy3", 30, Some(1_700_000_300)),
                    sig("buy2", 20, Some(1_700_000_200)),
                    sig("fund", 10, Some(1_700_000_000)),
                ],
            )
            .with_transaction("buy3", holdings_tx(WALLET, &["WATCHED", "M1"], None))
            .with_transaction("buy2", holdings_tx(WALLET, &["M1", "M2"], None))
            .with_transaction("fund", funding_tx("FunderAddr", WALLET, 1_700_000_000));
        let analyzer = WalletAnalyzer::new(Arc::new(rpc), fast_config());

        let record = analyzer.analyze(WALLET, Some("WATCHED")).await.unwrap();
        assert_eq!(record.unique_token_count, 2);
        assert_eq!(record.age, WalletAge::SemiNew);
        assert_eq!(record.total_transactions, 3);
        assert_eq!(record.funder.as_deref(), Some("FunderAddr"));
        assert_eq!(record.first_tx_time.map(|t| t.timestamp()), Some(1_700_000_000));
        // Balance unknown to the fake
        assert!(record.sol_balance.is_none());
    }

    #[tokio::test]
    async fn test_per_transaction_failures_are_skipped() {
        let rpc = MockRpc::new()
            .with_signatures(WALLET, vec![sig("bad", 2, None), sig("good", 1, None)])
            .with_transaction("good", holdings_tx(WALLET, &["A", "B", "C", "D", "E"], None))
            .failing("bad");
        let analyzer = WalletAnalyzer::new(Arc::new(rpc), fast_config());

        let record = analyzer.analyze(WALLET, None).await.unwrap();
        assert_eq!(record.unique_token_count, 5);
        assert_eq!(record.age, WalletAge::Old);
    }

    #[tokio::test]
    async fn test_signature_fetch_failure_propagates() {
        let rpc = MockRpc::new().failing(WALLET);
        let analyzer = WalletAnalyzer::new(Arc::new(rpc), fast_config());
        assert!(analyzer.analyze(WALLET, None).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_diversity_scan_is_paced() {
        let sigs = (0..4).map(|i| sig(&format!("s{}", i), 10 - i, None)).collect();
        let rpc = (0..4).fold(MockRpc::new().with_signatures(WALLET, sigs), |rpc, i| {
            rpc.with_transaction(&format!("s{}", i), holdings_tx(WALLET, &["M1"], None))
        });
        let config = AnalyzerConfig {
            pacing_delay_ms: 100,
            ..AnalyzerConfig::default()
        };
        let analyzer = WalletAnalyzer::new(Arc::new(rpc), config);

        let start = tokio::time::Instant::now();
        let record = analyzer.analyze(WALLET, None).await.unwrap();
        assert_eq!(record.unique_token_count, 1);
        assert!(start.elapsed() >= Duration::from_millis(4 * 100));
    }

    #[test]
    fn test_report_placeholders() {
        let record = WalletRecord {
            address: WALLET.to_string(),
            age: WalletAge::Old,
            unique_token_count: 7,
            first_tx_time: None,
            funder: Some("FunderAddress1234567890abcdefgh".to_string()),
            sol_balance: None,
            total_transactions: 100,
        };
        let report = format_wallet_report(&record);
        assert!(report.contains("Status:        OLD"));
        assert!(report.contains("First Txn:     Unknown"));
        assert!(report.contains("Funded By:     FunderAd...abcdefgh"));
        assert!(report.contains("SOL Balance:   Unknown"));
    }

    #[test]
    fn test_truncate_address() {
        assert_eq!(truncate_address("short", 8, 8), "short");
        assert_eq!(truncate_address("abcdefghijklmnopqrstuvwxyz", 3, 2), "abc...yz");
    }
}
