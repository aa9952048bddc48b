//! Holder record shared by on-chain retrieval and CSV import

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// One holder of the analysed token
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Holder {
    /// Wallet that owns the token account
    pub owner: String,
    /// Token account address; absent for rows imported from CSV
    pub token_account: Option<String>,
    /// Balance in UI units
    pub balance: f64,
    /// First time the wallet is seen holding the token
    pub purchase_time: Option<DateTime<Utc>>,
    /// Other mints this wallet traded recently (filled by similarity analysis)
    pub traded_tokens: BTreeSet<String>,
    pub token_count: usize,
    /// Rank as given by an external export
    pub rank: Option<u32>,
    /// Share of supply as given by an external export
    pub percentage: Option<f64>,
}

impl Holder {
    pub fn new(owner: impl Into<String>, balance: f64) -> Self {
        Self {
            owner: owner.into(),
            token_account: None,
            balance,
            purchase_time: None,
            traded_tokens: BTreeSet::new(),
            token_count: 0,
            rank: None,
            percentage: None,
        }
    }

    pub fn with_token_account(mut self, account: impl Into<String>) -> Self {
        self.token_account = Some(account.into());
        self
    }

    /// Replace the trading history and keep `token_count` in step with it
    pub fn set_traded_tokens(&mut self, tokens: BTreeSet<String>) {
        self.token_count = tokens.len();
        self.traded_tokens = tokens;
    }

    pub fn purchase_time_display(&self) -> String {
        self.purchase_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Sum of balances across a holder set
pub fn total_balance(holders: &[Holder]) -> f64 {
    holders.iter().map(|h| h.balance).sum()
}
