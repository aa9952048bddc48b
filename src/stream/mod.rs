//! Stream module - live transaction ingestion for a watched token
//!
//! Supports:
//! - WebSocket `logsSubscribe` push feed (default)
//! - Polling `getSignaturesForAddress` (fallback)

pub mod dedup;
pub mod logs;
pub mod monitor;

pub use dedup::SignatureSet;
pub use logs::{LogsClient, LogsConfig, LogsEvent};
pub use monitor::{extract_buyers, BuyEvent, MonitorMode, MonitorState, TransactionMonitor};
