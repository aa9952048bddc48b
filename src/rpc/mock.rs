//! In-process fake of the RPC surface for unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::rpc::client::SolanaRpc;
use crate::rpc::types::{LargestAccount, SignatureInfo, TokenAccountInfo, TransactionDetail};

#[derive(Default)]
pub struct MockRpc {
    signatures: Mutex<HashMap<String, Vec<SignatureInfo>>>,
    transactions: Mutex<HashMap<String, TransactionDetail>>,
    balances: Mutex<HashMap<String, u64>>,
    largest: Mutex<HashMap<String, Vec<LargestAccount>>>,
    token_accounts: Mutex<HashMap<String, TokenAccountInfo>>,
    /// Addresses / signatures whose calls fail with a network error
    failing: Mutex<HashSet<String>>,
    /// Count of getTransaction calls per signature
    pub tx_fetches: Mutex<HashMap<String, usize>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signature list for an address (give it newest first)
    pub fn with_signatures(self, address: &str, sigs: Vec<SignatureInfo>) -> Self {
        self.set_signatures(address, sigs);
        self
    }

    pub fn set_signatures(&self, address: &str, sigs: Vec<SignatureInfo>) {
        self.signatures
            .lock()
            .unwrap()
            .insert(address.to_string(), sigs);
    }

    pub fn with_transaction(self, signature: &str, tx: TransactionDetail) -> Self {
        self.add_transaction(signature, tx);
        self
    }

    pub fn add_transaction(&self, signature: &str, tx: TransactionDetail) {
        self.transactions
            .lock()
            .unwrap()
            .insert(signature.to_string(), tx);
    }

    pub fn with_balance(self, address: &str, lamports: u64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), lamports);
        self
    }

    pub fn with_largest_accounts(self, mint: &str, accounts: Vec<LargestAccount>) -> Self {
        self.largest
            .lock()
            .unwrap()
            .insert(mint.to_string(), accounts);
        self
    }

    pub fn with_token_account(self, account: TokenAccountInfo) -> Self {
        self.token_accounts
            .lock()
            .unwrap()
            .insert(account.address.clone(), account);
        self
    }

    pub fn failing(self, key: &str) -> Self {
        self.failing.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn fetch_count(&self, signature: &str) -> usize {
        self.tx_fetches
            .lock()
            .unwrap()
            .get(signature)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            Err(Error::Network(format!("mock failure for {}", key)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SolanaRpc for MockRpc {
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        self.check(address)?;
        let sigs = self
            .signatures
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default();
        Ok(sigs.into_iter().take(limit).collect())
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>> {
        *self
            .tx_fetches
            .lock()
            .unwrap()
            .entry(signature.to_string())
            .or_default() += 1;
        self.check(signature)?;
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        self.check(&format!("balance:{}", address))?;
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| Error::Rpc {
                code: -32602,
                message: "unknown account".into(),
            })
    }

    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>> {
        self.check(mint)?;
        Ok(self
            .largest
            .lock()
            .unwrap()
            .get(mint)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_token_account(&self, address: &str) -> Result<Option<TokenAccountInfo>> {
        self.check(address)?;
        Ok(self.token_accounts.lock().unwrap().get(address).cloned())
    }
}

// ============ Fixture helpers ============

pub fn sig(signature: &str, slot: u64, block_time: Option<i64>) -> SignatureInfo {
    SignatureInfo {
        signature: signature.to_string(),
        slot,
        block_time,
        err: None,
    }
}

/// Signature entry for a transaction that failed on chain
pub fn failed_sig(signature: &str, slot: u64) -> SignatureInfo {
    SignatureInfo {
        err: Some(json!({"InstructionError": [0, {"Custom": 1}]})),
        ..sig(signature, slot, None)
    }
}

fn token_balance(mint: &str, owner: &str, amount: f64) -> Value {
    json!({
        "accountIndex": 0,
        "mint": mint,
        "owner": owner,
        "uiTokenAmount": {"amount": amount.to_string(), "decimals": 0, "uiAmount": amount}
    })
}

/// Transaction whose token balances move `mint` for each (owner, pre, post)
pub fn balance_change_tx(mint: &str, changes: &[(&str, f64, f64)]) -> TransactionDetail {
    let pre: Vec<Value> = changes
        .iter()
        .filter(|(_, pre, _)| *pre > 0.0)
        .map(|(owner, pre, _)| token_balance(mint, owner, *pre))
        .collect();
    let post: Vec<Value> = changes
        .iter()
        .filter(|(_, _, post)| *post > 0.0)
        .map(|(owner, _, post)| token_balance(mint, owner, *post))
        .collect();

    serde_json::from_value(json!({
        "slot": 1,
        "meta": {
            "preBalances": [],
            "postBalances": [],
            "preTokenBalances": pre,
            "postTokenBalances": post,
            "innerInstructions": []
        }
    }))
    .unwrap()
}

/// Transaction where `owner` holds a post balance for each of `mints`
pub fn holdings_tx(owner: &str, mints: &[&str], block_time: Option<i64>) -> TransactionDetail {
    let post: Vec<Value> = mints
        .iter()
        .map(|mint| token_balance(mint, owner, 1.0))
        .collect();

    serde_json::from_value(json!({
        "slot": 1,
        "blockTime": block_time,
        "meta": {
            "preTokenBalances": [],
            "postTokenBalances": post,
        }
    }))
    .unwrap()
}

/// Native SOL transfer from `funder` to `wallet`
pub fn funding_tx(funder: &str, wallet: &str, block_time: i64) -> TransactionDetail {
    serde_json::from_value(json!({
        "slot": 1,
        "blockTime": block_time,
        "meta": {
            "preBalances": [2_000_000_000u64, 0],
            "postBalances": [999_995_000u64, 1_000_000_000u64],
        },
        "transaction": {
            "message": {
                "accountKeys": [{"pubkey": funder}, {"pubkey": wallet}]
            }
        }
    }))
    .unwrap()
}
