//! Holder Analyzer - largest holders of a token and how they relate
//!
//! Pipeline: largest token accounts -> owner resolution -> liquidity-pool
//! filtering -> first purchase lookup. Similarity analysis is a separate,
//! slower pass that fetches each holder's recent trading history and groups
//! wallets that keep buying the same things.
//!
//! Every per-transaction scan is paced, and at most
//! `max_concurrent_wallets` holders are scanned at once.

pub mod clustering;
pub mod report;
pub mod risk;
pub mod types;

use backoff::{future::retry, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::HoldersConfig;
use crate::error::{Error, Result};
use crate::rpc::types::to_ui_amount;
use crate::rpc::{LargestAccount, SolanaRpc};

pub use clustering::{analyze_groups, GroupingResult, SimilarityEdge, WalletGroup};
pub use report::format_report;
pub use risk::{score_risk, RiskLevel, RiskScore};
pub use types::Holder;

/// Owners that are AMM / pool programs rather than people
pub const LIQUIDITY_PROGRAMS: [(&str, &str); 6] = [
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "Raydium AMM"),
    ("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1", "Raydium V4"),
    ("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK", "Raydium CLMM"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "Orca Whirlpool"),
    ("9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP", "Orca V1"),
    ("DjVE6JNiYqPL2QXyCUUh8rNjHrbz9hXHNYt99MQ59qw1", "Orca V2"),
];

pub fn is_liquidity_program(owner: &str) -> bool {
    LIQUIDITY_PROGRAMS.iter().any(|(id, _)| *id == owner)
}

pub struct HolderAnalyzer {
    rpc: Arc<dyn SolanaRpc>,
    config: HoldersConfig,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HolderAnalyzer {
    pub fn new(rpc: Arc<dyn SolanaRpc>, config: HoldersConfig) -> Self {
        Self {
            rpc,
            config,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }

    /// Retry policy for the top-level largest-accounts call
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    pub fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    /// Largest non-pool holders of `mint`, biggest first, at most `limit`.
    ///
    /// Providers cap `getTokenLargestAccounts` (around 20), so fewer holders
    /// than requested is normal and not an error. No accounts at all is.
    pub async fn get_holders(&self, mint: &str, limit: usize) -> Result<Vec<Holder>> {
        info!("Fetching token accounts for {}...", mint);

        let accounts = self.largest_accounts(mint).await?;
        if accounts.is_empty() {
            return Err(Error::NotFound(format!("no token accounts found for {}", mint)));
        }

        info!("Found {} token accounts", accounts.len());
        if limit > accounts.len() {
            info!(
                "Requested {} holders but the provider only returns {}",
                limit,
                accounts.len()
            );
        }

        let mut holders: Vec<Holder> = Vec::new();
        for account in &accounts {
            let raw = account.raw_amount();
            if raw <= 0.0 {
                continue;
            }

            let info = match self.rpc.get_token_account(&account.address).await {
                Ok(Some(info)) => info,
                Ok(None) => continue,
                Err(e) => {
                    debug!(account = %account.address, "Owner lookup failed: {}", e);
                    continue;
                }
            };

            if info.mint.as_deref().is_some_and(|m| m != mint) {
                debug!(account = %account.address, "Token account belongs to another mint");
                continue;
            }
            if is_liquidity_program(&info.owner) {
                debug!(account = %account.address, owner = %info.owner, "Skipping liquidity pool");
                continue;
            }
            // Short keys are program-like placeholders, not wallets
            if info.owner.len() < 32 {
                continue;
            }

            let decimals = account.decimals.unwrap_or(info.decimals);
            holders.push(
                Holder::new(info.owner, to_ui_amount(raw, decimals))
                    .with_token_account(account.address.clone()),
            );
        }

        info!("After filtering: {} valid holders", holders.len());

        holders.sort_by(|a, b| b.balance.total_cmp(&a.balance));
        holders.truncate(limit);

        info!("Looking up first purchase for top {} holders...", holders.len());
        let times: Vec<Option<DateTime<Utc>>> = stream::iter(
            holders
                .iter()
                .map(|h| self.first_purchase_or_none(&h.owner, mint)),
        )
        .buffered(self.concurrency())
        .collect()
        .await;

        for (holder, time) in holders.iter_mut().zip(times) {
            holder.purchase_time = time;
        }

        Ok(holders)
    }

    async fn largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_base_delay)
            .with_max_interval(self.retry_base_delay * 8)
            .with_max_elapsed_time(Some(self.retry_base_delay * 64))
            .build();

        let max_retries = self.max_retries;
        let mut attempts = 0u32;

        retry(backoff, || {
            attempts += 1;
            let attempt = attempts;
            async move {
                match self.rpc.get_token_largest_accounts(mint).await {
                    Ok(accounts) => Ok(accounts),
                    Err(e) if e.is_retryable() && attempt <= max_retries => {
                        warn!(attempt, "getTokenLargestAccounts failed, retrying: {}", e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent_wallets.max(1)
    }

    /// Sleep after the `fetched`-th transaction of a scan
    async fn pace(&self, fetched: usize) {
        let delay = if fetched % self.config.burst_every.max(1) == 0 {
            self.config.burst_delay_ms
        } else {
            self.config.pacing_delay_ms
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    async fn first_purchase_or_none(&self, wallet: &str, mint: &str) -> Option<DateTime<Utc>> {
        match self.first_purchase_time(wallet, mint).await {
            Ok(time) => time,
            Err(e) => {
                debug!(wallet = %wallet, "First purchase lookup failed: {}", e);
                None
            }
        }
    }

    /// Block time of the oldest transaction that left `wallet` holding `mint`.
    ///
    /// Falls back to now when that transaction has no block time.
    pub async fn first_purchase_time(&self, wallet: &str, mint: &str) -> Result<Option<DateTime<Utc>>> {
        let mut signatures = self
            .rpc
            .get_signatures_for_address(wallet, self.config.purchase_scan_limit)
            .await?;
        signatures.sort_by_key(|s| s.slot);

        for (i, sig) in signatures.iter().enumerate() {
            match self.rpc.get_transaction(&sig.signature).await {
                Ok(Some(tx)) if tx.has_post_balance(mint, wallet) => {
                    return Ok(Some(sig.block_time_utc().unwrap_or_else(Utc::now)));
                }
                Ok(_) => {}
                Err(e) => debug!(signature = %sig.signature, "Skipping transaction: {}", e),
            }
            self.pace(i + 1).await;
        }

        Ok(None)
    }

    /// Mints `wallet` traded in its recent history, excluding `exclude`
    pub async fn wallet_token_history(&self, wallet: &str, exclude: &str) -> Result<BTreeSet<String>> {
        let signatures = self
            .rpc
            .get_signatures_for_address(wallet, self.config.history_tx_limit)
            .await?;

        let mut tokens = BTreeSet::new();

        for (i, sig) in signatures.iter().take(self.config.history_tx_limit).enumerate() {
            match self.rpc.get_transaction(&sig.signature).await {
                Ok(Some(tx)) => tokens.extend(tx.traded_mints(Some(wallet), Some(exclude))),
                Ok(None) => {}
                Err(e) => debug!(signature = %sig.signature, "Skipping transaction: {}", e),
            }
            self.pace(i + 1).await;
        }

        Ok(tokens)
    }

    /// Fill each holder's trading history, then group overlapping wallets
    pub async fn analyze_similarities(&self, holders: &mut [Holder], token: &str) -> GroupingResult {
        info!("Analyzing trading patterns for {} holders...", holders.len());

        let histories: Vec<BTreeSet<String>> = stream::iter(holders.iter().map(|h| async move {
            match self.wallet_token_history(&h.owner, token).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!(wallet = %h.owner, "Trading history unavailable: {}", e);
                    BTreeSet::new()
                }
            }
        }))
        .buffered(self.concurrency())
        .collect()
        .await;

        for (holder, tokens) in holders.iter_mut().zip(histories) {
            holder.set_traded_tokens(tokens);
        }

        let result = analyze_groups(holders, self.config.min_common_tokens);
        info!(
            edges = result.edges.len(),
            groups = result.total_groups(),
            "Trading pattern analysis complete"
        );
        result
    }
}
