//! JSON-RPC gateway to a Solana node
//!
//! A thin request/response layer: one reusable HTTP connection pool, one
//! `call` that maps failures into `Error::Network`, `Error::Rpc` or
//! `Error::Data`, and typed wrappers for the handful of methods the checker
//! needs. No retries happen here; callers pick their own policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::rpc::types::{
    AccountData, AccountInfoValue, LargestAccount, SignatureInfo, TokenAccountInfo,
    TransactionDetail, WithContext,
};

/// The RPC surface every component depends on.
///
/// Held as `Arc<dyn SolanaRpc>` so the monitor, the wallet analyzer and the
/// holder analyzer can share one connection, and so tests can swap in a fake.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Recent signatures for an address, newest first
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// Parsed transaction detail; `None` when the node does not know the signature
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>>;

    /// Native balance in lamports
    async fn get_balance(&self, address: &str) -> Result<u64>;

    /// Largest token accounts for a mint (providers usually cap this around 20)
    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>>;

    /// Owner and decimals of a token account; `None` if the account is gone
    /// or is not a parsable token account
    async fn get_token_account(&self, address: &str) -> Result<Option<TokenAccountInfo>>;
}

/// HTTP JSON-RPC client
pub struct RpcClient {
    /// HTTP client (connection pool reused across calls)
    client: Client,
    /// Endpoint URL
    endpoint: String,
    /// Monotonic request id
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcClient {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC call and decode its `result` into `T`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        trace!(method, id, "RPC request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("{} body read failed: {}", method, e)))?;

        decode_envelope(method, status.is_success(), status.as_u16(), &body)
    }
}

/// Map a raw HTTP body into the typed result or a classified error
fn decode_envelope<T: DeserializeOwned>(
    method: &str,
    http_ok: bool,
    http_status: u16,
    body: &str,
) -> Result<T> {
    let envelope: RpcEnvelope = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(e) if http_ok => {
            return Err(Error::Data(format!(
                "{} returned a non JSON-RPC body: {}",
                method, e
            )))
        }
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Network(format!(
                "{} HTTP {}: {}",
                method, http_status, snippet
            )));
        }
    };

    if let Some(err) = envelope.error {
        debug!(method, code = err.code, data = ?err.data, "RPC error envelope");
        return Err(Error::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    if !http_ok {
        return Err(Error::Network(format!("{} HTTP {}", method, http_status)));
    }

    let result = envelope.result.unwrap_or(Value::Null);
    serde_json::from_value(result)
        .map_err(|e| Error::Data(format!("{} result has unexpected shape: {}", method, e)))
}

#[async_trait]
impl SolanaRpc for RpcClient {
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        self.call(
            "getSignaturesForAddress",
            json!([address, { "limit": limit }]),
        )
        .await
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionDetail>> {
        self.call(
            "getTransaction",
            json!([
                signature,
                { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
            ]),
        )
        .await
    }

    async fn get_balance(&self, address: &str) -> Result<u64> {
        let res: WithContext<u64> = self.call("getBalance", json!([address])).await?;
        Ok(res.value)
    }

    async fn get_token_largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>> {
        let res: WithContext<Vec<LargestAccount>> = self
            .call("getTokenLargestAccounts", json!([mint]))
            .await?;
        Ok(res.value)
    }

    async fn get_token_account(&self, address: &str) -> Result<Option<TokenAccountInfo>> {
        let res: WithContext<Option<AccountInfoValue>> = self
            .call(
                "getAccountInfo",
                json!([address, { "encoding": "jsonParsed" }]),
            )
            .await?;

        let Some(value) = res.value else {
            return Ok(None);
        };

        match value.data {
            AccountData::Parsed { parsed } => {
                let info = parsed.info;
                let Some(owner) = info.owner else {
                    return Ok(None);
                };
                Ok(Some(TokenAccountInfo {
                    address: address.to_string(),
                    owner,
                    mint: info.mint,
                    decimals: info.token_amount.map(|a| a.decimals).unwrap_or(0),
                }))
            }
            AccountData::Raw(raw) => {
                debug!(
                    account = %address,
                    encoding = ?raw.get(1),
                    "Account data is not parsable as a token account"
                );
                Ok(None)
            }
        }
    }
}
