//! Solana JSON-RPC access
//!
//! - `client`: HTTP gateway and the `SolanaRpc` trait every component depends on
//! - `types`: typed response shapes and balance/mint helpers

pub mod client;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{RpcClient, SolanaRpc};
pub use types::{
    LargestAccount, SignatureInfo, TokenAccountInfo, TokenBalance, TransactionDetail,
    LAMPORTS_PER_SOL,
};
