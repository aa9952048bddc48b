//! Typed views over the JSON-RPC responses we consume
//!
//! Only the fields we actually read are modelled. Everything optional on the
//! wire is optional here; a response that does not fit these shapes surfaces
//! as `Error::Data` from the gateway instead of silently propagating nulls.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// SPL Token program
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
/// SPL Token-2022 program
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// One entry of `getSignaturesForAddress` (newest first on the wire)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub err: Option<Value>,
}

impl SignatureInfo {
    pub fn block_time_utc(&self) -> Option<DateTime<Utc>> {
        self.block_time.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// `getTransaction` with `jsonParsed` encoding
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    #[serde(default)]
    pub transaction: Option<TransactionEnvelope>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub post_token_balances: Vec<TokenBalance>,
    #[serde(default)]
    pub inner_instructions: Vec<InnerInstructionSet>,
}

/// Pre/post token balance snapshot for one token account
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(default)]
    pub account_index: u32,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub ui_token_amount: Option<UiTokenAmount>,
}

impl TokenBalance {
    /// UI amount, missing or null treated as zero
    pub fn ui_amount(&self) -> f64 {
        self.ui_token_amount
            .as_ref()
            .and_then(|a| a.ui_amount)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct InnerInstructionSet {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program_id: Option<String>,
    /// Object for parsed programs, plain string for some others
    #[serde(default)]
    pub parsed: Option<Value>,
}

impl ParsedInstruction {
    pub fn is_token_program(&self) -> bool {
        matches!(
            self.program_id.as_deref(),
            Some(TOKEN_PROGRAM_ID) | Some(TOKEN_2022_PROGRAM_ID)
        )
    }

    /// `parsed.info.mint` when the instruction carries one
    pub fn mint(&self) -> Option<&str> {
        self.parsed
            .as_ref()?
            .as_object()?
            .get("info")?
            .get("mint")?
            .as_str()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransactionEnvelope {
    #[serde(default)]
    pub message: TransactionMessage,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
}

/// `jsonParsed` yields objects, legacy encodings yield bare strings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AccountKey {
    Parsed { pubkey: String },
    Plain(String),
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Parsed { pubkey } => pubkey,
            AccountKey::Plain(key) => key,
        }
    }
}

impl TransactionDetail {
    pub fn block_time_utc(&self) -> Option<DateTime<Utc>> {
        self.block_time.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn account_keys(&self) -> &[AccountKey] {
        self.transaction
            .as_ref()
            .map(|t| t.message.account_keys.as_slice())
            .unwrap_or(&[])
    }

    /// Owner -> UI amount for `mint`, before and after the transaction.
    ///
    /// Owners are also returned in order of first appearance (pre list, then
    /// post list) so callers can iterate deterministically.
    pub fn token_deltas(&self, mint: &str) -> Vec<(String, f64, f64)> {
        let Some(meta) = &self.meta else {
            return Vec::new();
        };

        let mut order: Vec<String> = Vec::new();
        let mut pre: HashMap<String, f64> = HashMap::new();
        let mut post: HashMap<String, f64> = HashMap::new();

        for (balances, target) in [
            (&meta.pre_token_balances, &mut pre),
            (&meta.post_token_balances, &mut post),
        ] {
            for bal in balances.iter().filter(|b| b.mint == mint) {
                if let Some(owner) = bal.owner.as_deref().filter(|o| !o.is_empty()) {
                    if !order.iter().any(|o| o == owner) {
                        order.push(owner.to_string());
                    }
                    target.insert(owner.to_string(), bal.ui_amount());
                }
            }
        }

        order
            .into_iter()
            .map(|owner| {
                let before = pre.get(&owner).copied().unwrap_or(0.0);
                let after = post.get(&owner).copied().unwrap_or(0.0);
                (owner, before, after)
            })
            .collect()
    }

    /// Mints this transaction touched, from token balance snapshots and
    /// token-program inner instructions.
    ///
    /// With `owner` set, balance snapshots only count when that wallet owns
    /// the token account; inner instructions are counted regardless since the
    /// signature was already scoped to the wallet.
    pub fn traded_mints(&self, owner: Option<&str>, exclude: Option<&str>) -> HashSet<String> {
        let mut mints = HashSet::new();
        let Some(meta) = &self.meta else {
            return mints;
        };

        for bal in meta
            .pre_token_balances
            .iter()
            .chain(meta.post_token_balances.iter())
        {
            if bal.mint.is_empty() || Some(bal.mint.as_str()) == exclude {
                continue;
            }
            if let Some(wallet) = owner {
                if bal.owner.as_deref() != Some(wallet) {
                    continue;
                }
            }
            mints.insert(bal.mint.clone());
        }

        for inst in meta
            .inner_instructions
            .iter()
            .flat_map(|set| set.instructions.iter())
            .filter(|i| i.is_token_program())
        {
            if let Some(mint) = inst.mint() {
                if !mint.is_empty() && Some(mint) != exclude {
                    mints.insert(mint.to_string());
                }
            }
        }

        mints
    }

    /// First account (in key order) whose native balance went down, skipping `wallet`
    pub fn native_funder(&self, wallet: &str) -> Option<String> {
        let meta = self.meta.as_ref()?;
        let keys = self.account_keys();

        meta.pre_balances
            .iter()
            .zip(meta.post_balances.iter())
            .enumerate()
            .filter(|(_, (pre, post))| pre > post)
            .filter_map(|(i, _)| keys.get(i).map(|k| k.pubkey()))
            .find(|key| *key != wallet)
            .map(str::to_string)
    }

    /// Whether `wallet` holds a post-transaction balance of `mint`
    pub fn has_post_balance(&self, mint: &str, wallet: &str) -> bool {
        self.meta
            .as_ref()
            .map(|meta| {
                meta.post_token_balances
                    .iter()
                    .any(|b| b.mint == mint && b.owner.as_deref() == Some(wallet))
            })
            .unwrap_or(false)
    }
}

/// Wrapper for RPC results that carry `{context, value}`
#[derive(Debug, Clone, Deserialize)]
pub struct WithContext<T> {
    pub value: T,
}

/// Entry of `getTokenLargestAccounts`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LargestAccount {
    pub address: String,
    /// Raw amount in base units, as a decimal string
    pub amount: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl LargestAccount {
    pub fn raw_amount(&self) -> f64 {
        self.amount.parse::<f64>().unwrap_or(0.0)
    }
}

/// Owner and decimals of an SPL token account, from `getAccountInfo`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountInfo {
    pub address: String,
    pub owner: String,
    pub mint: Option<String>,
    pub decimals: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountInfoValue {
    pub data: AccountData,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AccountData {
    Parsed { parsed: ParsedAccountData },
    // [base64, encoding] when the node could not parse the account
    Raw(Vec<Value>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedAccountData {
    pub info: ParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParsedTokenAccount {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub token_amount: Option<UiTokenAmount>,
}

/// Convert a raw base-unit amount into UI units
pub fn to_ui_amount(raw: f64, decimals: u8) -> f64 {
    if decimals == 0 {
        raw
    } else {
        raw / 10f64.powi(decimals as i32)
    }
}
