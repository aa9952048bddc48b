//! Solana Wallet Checker Library
//!
//! Watches a token for new buyers, classifies each buyer wallet by trading
//! history, and scores a token's largest holders for coordination risk.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod holders;
pub mod import;
pub mod rpc;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
