//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub holders: HoldersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries for top-level calls that opt into a retry policy
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            ws_endpoint: default_ws_endpoint(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Live transaction monitor settings
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Signatures marked as seen before monitoring starts
    #[serde(default = "default_prime_signature_limit")]
    pub prime_signature_limit: usize,
    #[serde(default = "default_poll_signature_limit")]
    pub poll_signature_limit: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Processed-signature set is trimmed once it grows past this
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Number of most recent signatures kept after a trim
    #[serde(default = "default_dedup_retain")]
    pub dedup_retain: usize,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            prime_signature_limit: default_prime_signature_limit(),
            poll_signature_limit: default_poll_signature_limit(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            ping_interval_secs: default_ping_interval_secs(),
            dedup_capacity: default_dedup_capacity(),
            dedup_retain: default_dedup_retain(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Wallet history reconstruction settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Unique tokens at or above which a wallet counts as old
    #[serde(default = "default_old_wallet_threshold")]
    pub old_wallet_threshold: usize,
    #[serde(default = "default_analyzer_signature_limit")]
    pub signature_limit: usize,
    #[serde(default = "default_diversity_scan_limit")]
    pub diversity_scan_limit: usize,
    #[serde(default = "default_analyzer_pacing_ms")]
    pub pacing_delay_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            old_wallet_threshold: default_old_wallet_threshold(),
            signature_limit: default_analyzer_signature_limit(),
            diversity_scan_limit: default_diversity_scan_limit(),
            pacing_delay_ms: default_analyzer_pacing_ms(),
        }
    }
}

/// Holder retrieval and clustering settings
#[derive(Debug, Clone, Deserialize)]
pub struct HoldersConfig {
    #[serde(default = "default_holder_limit")]
    pub default_limit: usize,
    /// Transactions scanned per holder for trading history
    #[serde(default = "default_history_tx_limit")]
    pub history_tx_limit: usize,
    /// Signatures scanned when looking for a first purchase
    #[serde(default = "default_purchase_scan_limit")]
    pub purchase_scan_limit: usize,
    /// Shared tokens needed for two wallets to be linked
    #[serde(default = "default_min_common_tokens")]
    pub min_common_tokens: usize,
    #[serde(default = "default_holders_pacing_ms")]
    pub pacing_delay_ms: u64,
    #[serde(default = "default_burst_delay_ms")]
    pub burst_delay_ms: u64,
    /// Apply the longer burst delay after every Nth transaction
    #[serde(default = "default_burst_every")]
    pub burst_every: usize,
    /// Holders whose history is walked at the same time
    #[serde(default = "default_max_concurrent_wallets")]
    pub max_concurrent_wallets: usize,
}

impl Default for HoldersConfig {
    fn default() -> Self {
        Self {
            default_limit: default_holder_limit(),
            history_tx_limit: default_history_tx_limit(),
            purchase_scan_limit: default_purchase_scan_limit(),
            min_common_tokens: default_min_common_tokens(),
            pacing_delay_ms: default_holders_pacing_ms(),
            burst_delay_ms: default_burst_delay_ms(),
            burst_every: default_burst_every(),
            max_concurrent_wallets: default_max_concurrent_wallets(),
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_ws_endpoint() -> String {
    std::env::var("SOLANA_WSS_URL").unwrap_or_else(|_| "wss://api.mainnet-beta.solana.com".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    std::env::var("POLL_INTERVAL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

fn default_prime_signature_limit() -> usize { 50 }
fn default_poll_signature_limit() -> usize { 20 }

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_dedup_capacity() -> usize { 1000 }
fn default_dedup_retain() -> usize { 500 }

fn default_channel_capacity() -> usize {
    1024
}

fn default_old_wallet_threshold() -> usize {
    std::env::var("OLD_WALLET_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5)
}

fn default_analyzer_signature_limit() -> usize { 100 }
fn default_diversity_scan_limit() -> usize { 50 }
fn default_analyzer_pacing_ms() -> u64 { 100 }

fn default_holder_limit() -> usize { 20 }
fn default_history_tx_limit() -> usize { 50 }
fn default_purchase_scan_limit() -> usize { 1000 }
fn default_min_common_tokens() -> usize { 3 }
fn default_holders_pacing_ms() -> u64 { 50 }
fn default_burst_delay_ms() -> u64 { 300 }
fn default_burst_every() -> usize { 5 }
fn default_max_concurrent_wallets() -> usize { 4 }

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.ws_endpoint", default_ws_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("rpc.max_retries", default_max_retries() as i64)?
            .set_default("monitor.poll_interval_secs", default_poll_interval_secs() as i64)?
            .set_default("analyzer.old_wallet_threshold", default_old_wallet_threshold() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix CHECKER__)
            .add_source(
                config::Environment::with_prefix("CHECKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, url, schemes) in [
            ("rpc.endpoint", &self.rpc.endpoint, ["http", "https"]),
            ("rpc.ws_endpoint", &self.rpc.ws_endpoint, ["ws", "wss"]),
        ] {
            let parsed = url::Url::parse(url).with_context(|| format!("Invalid {}: {}", name, url))?;
            if !schemes.contains(&parsed.scheme()) {
                anyhow::bail!("{} must use {} or {}, got {}", name, schemes[0], schemes[1], url);
            }
        }

        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        if self.monitor.poll_interval_secs == 0 {
            anyhow::bail!("monitor.poll_interval_secs must be positive");
        }

        if self.monitor.dedup_retain == 0 || self.monitor.dedup_retain > self.monitor.dedup_capacity {
            anyhow::bail!(
                "monitor.dedup_retain ({}) must be between 1 and dedup_capacity ({})",
                self.monitor.dedup_retain,
                self.monitor.dedup_capacity
            );
        }

        if self.monitor.channel_capacity == 0 {
            anyhow::bail!("monitor.channel_capacity must be positive");
        }

        if self.analyzer.old_wallet_threshold == 0 {
            anyhow::bail!("analyzer.old_wallet_threshold must be at least 1");
        }

        if self.analyzer.signature_limit == 0 || self.analyzer.signature_limit > 1000 {
            anyhow::bail!("analyzer.signature_limit must be between 1 and 1000");
        }

        if self.holders.purchase_scan_limit > 1000 || self.holders.history_tx_limit > 1000 {
            anyhow::bail!("holders scan limits cannot exceed 1000 signatures per request");
        }

        if self.holders.min_common_tokens == 0 {
            anyhow::bail!("holders.min_common_tokens must be at least 1");
        }

        if self.holders.burst_every == 0 {
            anyhow::bail!("holders.burst_every must be at least 1");
        }

        if self.holders.max_concurrent_wallets == 0 {
            anyhow::bail!("holders.max_concurrent_wallets must be at least 1");
        }

        if self.monitor.ping_interval_secs == 0 {
            tracing::warn!("monitor.ping_interval_secs is 0, keep-alive pings disabled");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    ws_endpoint: {}
    timeout: {}ms
    max_retries: {}
  Monitor:
    poll_interval: {}s
    prime_signatures: {}
    poll_signatures: {}
    reconnect_delay: {}ms
    dedup: trim past {} to {}
  Analyzer:
    old_wallet_threshold: {} tokens
    signature_limit: {}
    diversity_scan: {}
  Holders:
    default_limit: {}
    history_tx_limit: {}
    min_common_tokens: {}
    concurrent_wallets: {}
"#,
            mask_url(&self.rpc.endpoint),
            mask_url(&self.rpc.ws_endpoint),
            self.rpc.timeout_ms,
            self.rpc.max_retries,
            self.monitor.poll_interval_secs,
            self.monitor.prime_signature_limit,
            self.monitor.poll_signature_limit,
            self.monitor.reconnect_delay_ms,
            self.monitor.dedup_capacity,
            self.monitor.dedup_retain,
            self.analyzer.old_wallet_threshold,
            self.analyzer.signature_limit,
            self.analyzer.diversity_scan_limit,
            self.holders.default_limit,
            self.holders.history_tx_limit,
            self.holders.min_common_tokens,
            self.holders.max_concurrent_wallets,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
pub fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
