//! WebSocket `logsSubscribe` client for a single token
//!
//! Opens a subscription for every log that mentions the watched mint and
//! forwards each notification's signature on a channel. The connection is
//! re-established after any error or close until the cancellation token
//! fires.

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Configuration for the logs subscription client
#[derive(Debug, Clone)]
pub struct LogsConfig {
    /// WebSocket URL of the RPC provider
    pub ws_url: String,
    /// Reconnect delay in milliseconds
    pub reconnect_delay_ms: u64,
    /// Ping interval in seconds (0 disables pings)
    pub ping_interval_secs: u64,
}

/// One `logsNotification`
#[derive(Debug, Clone, PartialEq)]
pub struct LogNotification {
    pub signature: String,
    pub slot: u64,
    /// The transaction failed on chain
    pub failed: bool,
}

/// Event from the logs client
#[derive(Debug, Clone, PartialEq)]
pub enum LogsEvent {
    /// Connected to WebSocket
    Connected,
    /// Provider confirmed the subscription with this id
    Subscribed(u64),
    /// A transaction mentioning the token landed
    Log(LogNotification),
    /// Disconnected from WebSocket
    Disconnected,
}

/// Incoming frame, decoded
#[derive(Debug, Clone, PartialEq)]
pub enum LogsMessage {
    Confirmed(u64),
    Notification(LogNotification),
    /// JSON-RPC error reply to the subscribe request
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct NotificationFrame {
    method: String,
    params: NotificationParams,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    result: NotificationResult,
}

#[derive(Debug, Deserialize)]
struct NotificationResult {
    #[serde(default)]
    context: Option<NotificationContext>,
    value: NotificationValue,
}

#[derive(Debug, Deserialize)]
struct NotificationContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct NotificationValue {
    signature: String,
    #[serde(default)]
    err: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ReplyFrame {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Build the `logsSubscribe` request for a mint
pub fn subscribe_request(token: &str, id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "logsSubscribe",
        "params": [
            { "mentions": [token] },
            { "commitment": "confirmed" }
        ]
    })
}

/// Decode one text frame. Unknown or malformed frames yield `None`.
pub fn parse_message(text: &str) -> Option<LogsMessage> {
    if let Ok(frame) = serde_json::from_str::<NotificationFrame>(text) {
        if frame.method == "logsNotification" {
            let result = frame.params.result;
            return Some(LogsMessage::Notification(LogNotification {
                signature: result.value.signature,
                slot: result.context.map(|c| c.slot).unwrap_or_default(),
                failed: result.value.err.is_some_and(|e| !e.is_null()),
            }));
        }
        return None;
    }

    let reply = serde_json::from_str::<ReplyFrame>(text).ok()?;
    if let Some(err) = reply.error {
        return Some(LogsMessage::Rejected(err.to_string()));
    }
    reply
        .result
        .and_then(|r| r.as_u64())
        .map(LogsMessage::Confirmed)
}

/// logsSubscribe client
pub struct LogsClient {
    config: LogsConfig,
    event_tx: mpsc::Sender<LogsEvent>,
}

impl LogsClient {
    pub fn new(config: LogsConfig, event_tx: mpsc::Sender<LogsEvent>) -> Self {
        Self { config, event_tx }
    }

    /// Spawn the connect / reconnect loop for `token`
    pub fn start(&self, token: String, cancel: CancellationToken) -> JoinHandle<()> {
        info!(url = %self.config.ws_url, token = %token, "Starting logs subscription");

        let config = self.config.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }

                match Self::connect_and_stream(&config, &event_tx, &token, &cancel).await {
                    Ok(()) => debug!("Logs stream finished"),
                    Err(e) => error!("Logs WebSocket error: {}", e),
                }

                if cancel.is_cancelled() || event_tx.send(LogsEvent::Disconnected).await.is_err() {
                    break;
                }

                let delay = Duration::from_millis(config.reconnect_delay_ms);
                warn!("WebSocket disconnected, reconnecting in {:?}...", delay);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!("Logs subscription stopped");
        })
    }

    async fn connect_and_stream(
        config: &LogsConfig,
        event_tx: &mpsc::Sender<LogsEvent>,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = url::Url::parse(&config.ws_url)
            .map_err(|e| Error::Config(format!("Invalid WebSocket URL: {}", e)))?;

        let (ws_stream, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            res = connect_async(url.as_str()) => res?,
        };

        let (mut write, mut read) = ws_stream.split();

        let request = subscribe_request(token, 1);
        write.send(Message::Text(request.to_string())).await?;
        info!("WebSocket connected, monitoring token...");

        Self::emit(event_tx, LogsEvent::Connected).await?;

        // A zero interval disables pings; tick far in the future instead
        let ping_every = if config.ping_interval_secs == 0 {
            Duration::from_secs(u32::MAX as u64)
        } else {
            Duration::from_secs(config.ping_interval_secs)
        };
        let mut ping_timer = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }

                _ = ping_timer.tick() => {
                    if let Err(e) = write.send(Message::Ping(vec![])).await {
                        error!("Failed to send ping: {}", e);
                        break;
                    }
                    debug!("Sent ping");
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match parse_message(&text) {
                            Some(LogsMessage::Confirmed(id)) => {
                                info!(subscription = id, "Subscription confirmed");
                                Self::emit(event_tx, LogsEvent::Subscribed(id)).await?;
                            }
                            Some(LogsMessage::Notification(log)) => {
                                Self::emit(event_tx, LogsEvent::Log(log)).await?;
                            }
                            Some(LogsMessage::Rejected(reason)) => {
                                return Err(Error::WebSocket(format!("Subscription rejected: {}", reason)));
                            }
                            None => {
                                let snippet: String = text.chars().take(100).collect();
                                debug!("Unknown message: {}", snippet);
                            }
                        },
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!("WebSocket closed by server");
                            break;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            info!("WebSocket stream ended");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    async fn emit(event_tx: &mpsc::Sender<LogsEvent>, event: LogsEvent) -> Result<()> {
        event_tx
            .send(event)
            .await
            .map_err(|e| Error::Internal(format!("Failed to send event: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_shape() {
        let req = subscribe_request("MintAddr111", 1);
        assert_eq!(req["method"], "logsSubscribe");
        assert_eq!(req["params"][0]["mentions"][0], "MintAddr111");
        assert_eq!(req["params"][1]["commitment"], "confirmed");
    }

    #[test]
    fn test_parse_confirmation() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","result":23784,"id":1}"#);
        assert_eq!(msg, Some(LogsMessage::Confirmed(23784)));
    }

    #[test]
    fn test_parse_notification() {
        let text = r#"{
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": {"slot": 5208469},
                    "value": {
                        "signature": "5h6xBEauJ3PK6SWCZ1PGjBvj8vDdWG3KpwATGy1ARAXFSDwt8GFXM7W5Ncn16wmqokgpiKRLuS83KUxyZyv2sUYv",
                        "err": null,
                        "logs": ["Program TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA invoke [1]"]
                    }
                },
                "subscription": 24040
            }
        }"#;

        match parse_message(text) {
            Some(LogsMessage::Notification(log)) => {
                assert!(log.signature.starts_with("5h6xBEau"));
                assert_eq!(log.slot, 5208469);
                assert!(!log.failed);
            }
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_failed_notification() {
        let text = r#"{"jsonrpc":"2.0","method":"logsNotification","params":{"result":{"context":{"slot":1},"value":{"signature":"sigX","err":{"InstructionError":[0,"Custom"]},"logs":[]}},"subscription":1}}"#;
        match parse_message(text) {
            Some(LogsMessage::Notification(log)) => assert!(log.failed),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejection_and_garbage() {
        let rejected = parse_message(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params"},"id":1}"#,
        );
        assert!(matches!(rejected, Some(LogsMessage::Rejected(_))));

        assert_eq!(parse_message("not json"), None);
        assert_eq!(parse_message(r#"{"method":"slotNotification","params":{"result":{"value":{"signature":"x"}}}}"#), None);
    }

    fn notification(signature: &str) -> String {
        json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {
                    "context": {"slot": 1},
                    "value": {"signature": signature, "err": null, "logs": []}
                },
                "subscription": 7
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_reconnects_and_resubscribes_after_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Each connection gets one notification, then the server hangs up
        let server = tokio::spawn(async move {
            let mut requests = Vec::new();
            for i in 0..2 {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => requests.push(text),
                    other => panic!("expected subscribe request, got {:?}", other),
                }
                ws.send(Message::Text(notification(&format!("sig{}", i))))
                    .await
                    .unwrap();
                let _ = ws.close(None).await;
            }
            requests
        });

        let (tx, mut rx) = mpsc::channel(16);
        let client = LogsClient::new(
            LogsConfig {
                ws_url: format!("ws://{}", addr),
                reconnect_delay_ms: 10,
                ping_interval_secs: 0,
            },
            tx,
        );
        let cancel = CancellationToken::new();
        let handle = client.start("Mint".into(), cancel.clone());

        let mut signatures = Vec::new();
        let mut disconnects = 0;
        while signatures.len() < 2 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for logs")
                .expect("logs channel closed");
            match event {
                LogsEvent::Log(log) => signatures.push(log.signature),
                LogsEvent::Disconnected => disconnects += 1,
                _ => {}
            }
        }

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(signatures, vec!["sig0", "sig1"]);
        assert!(disconnects >= 1);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests {
            let value: Value = serde_json::from_str(&request).unwrap();
            assert_eq!(value["method"], "logsSubscribe");
            assert_eq!(value["params"][0]["mentions"][0], "Mint");
        }
    }

    #[tokio::test]
    async fn test_cancelled_client_stops_without_connecting() {
        let (tx, mut rx) = mpsc::channel(8);
        let client = LogsClient::new(
            LogsConfig {
                ws_url: "ws://127.0.0.1:1".into(),
                reconnect_delay_ms: 10,
                ping_interval_secs: 30,
            },
            tx,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let handle = client.start("Mint".into(), cancel);
        handle.await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
