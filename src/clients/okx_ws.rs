// WebSocket client for the OKX public book feed

use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{error, info, warn};

use crate::book::{BookAction, BookMessage};

/// Initial reconnect delay; doubled after every failed attempt.
pub const INITIAL_RECONNECT_DELAY_SECS: u64 = 1;
/// Ceiling for the reconnect backoff.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("subscription failed: {0}")]
    Subscribe(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("feed closed by remote")]
    Closed,
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub struct OkxWebSocketClient {
    ws_sender: futures_util::stream::SplitSink<WsStream, Message>,
    ws_receiver: futures_util::stream::SplitStream<WsStream>,
}

impl OkxWebSocketClient {
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        info!(url, "connected to OKX WebSocket");

        let (ws_sender, ws_receiver) = ws_stream.split();

        Ok(Self {
            ws_sender,
            ws_receiver,
        })
    }

    /// Subscribe to the level-2 book channel for one instrument.
    pub async fn subscribe_to_books(&mut self, instrument: &str) -> Result<(), FeedError> {
        let subscribe_message = json!({
            "op": "subscribe",
            "args": [{
                "channel": "books",
                "instId": instrument
            }]
        });

        self.ws_sender
            .send(Message::Text(subscribe_message.to_string()))
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))?;
        info!(instrument, "subscribed to order book channel");

        Ok(())
    }

    /// Application-level keep-alive; OKX drops idle connections after 30s.
    pub async fn send_ping(&mut self) -> Result<(), FeedError> {
        self.ws_sender
            .send(Message::Text("ping".to_string()))
            .await
            .map_err(|e| FeedError::Protocol(e.to_string()))
    }

    /// Next text frame from the feed; `None` once the stream is closed.
    /// Control frames are skipped (tungstenite answers pings internally).
    pub async fn next_text(&mut self) -> Result<Option<String>, FeedError> {
        loop {
            match self.ws_receiver.next().await {
                Some(Ok(Message::Text(text))) => {
                    if text == "pong" {
                        continue;
                    }
                    return Ok(Some(text));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(FeedError::Protocol(e.to_string())),
            }
        }
    }
}

/// Parse a `books` channel frame into a [`BookMessage`].
///
/// Returns `None` for frames that are not book data (event acks, other
/// channels); those go through [`handle_event_message`] instead.
pub fn parse_book_message(data: &Value) -> Option<BookMessage> {
    let channel = data.get("arg")?.get("channel")?.as_str()?;
    if !channel.starts_with("books") {
        return None;
    }

    let entry = data.get("data")?.get(0)?;

    // Shallow-book channels carry no action field and always send full state
    let action = match data.get("action").and_then(|a| a.as_str()) {
        Some("update") => BookAction::Update,
        Some("snapshot") | None => BookAction::Snapshot,
        Some(other) => {
            warn!(action = other, "unknown book action, treating as snapshot");
            BookAction::Snapshot
        }
    };

    Some(BookMessage {
        action,
        bids: parse_levels(entry.get("bids")),
        asks: parse_levels(entry.get("asks")),
        timestamp: parse_timestamp(entry.get("ts")),
        sequence: entry
            .get("seqId")
            .and_then(|s| s.as_i64())
            .filter(|&s| s > 0)
            .map(|s| s as u64),
    })
}

/// Parse one side of a book payload: arrays of `[price, size, ...]` strings.
pub(crate) fn parse_levels(value: Option<&Value>) -> Vec<(f64, f64)> {
    let mut levels = Vec::new();
    if let Some(entries) = value.and_then(|v| v.as_array()) {
        for entry in entries {
            if let Some(fields) = entry.as_array() {
                if fields.len() >= 2 {
                    if let (Some(price_str), Some(size_str)) =
                        (fields[0].as_str(), fields[1].as_str())
                    {
                        if let (Ok(price), Ok(size)) =
                            (price_str.parse::<f64>(), size_str.parse::<f64>())
                        {
                            levels.push((price, size));
                        }
                    }
                }
            }
        }
    }
    levels
}

pub(crate) fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

/// Log subscription acks and feed-side errors.
pub fn handle_event_message(data: &Value) {
    if let Some(event) = data.get("event").and_then(|e| e.as_str()) {
        match event {
            "subscribe" => {
                info!("subscription confirmed");
            }
            "error" => {
                let code = data.get("code").and_then(|c| c.as_str()).unwrap_or("?");
                let msg = data.get("msg").and_then(|m| m.as_str()).unwrap_or("");
                error!(code, msg, "feed reported an error");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot_frame() {
        let frame = json!({
            "arg": {"channel": "books", "instId": "BTC-USDT"},
            "action": "snapshot",
            "data": [{
                "bids": [["41000.5", "2.5", "0", "4"], ["41000.0", "1.0", "0", "1"]],
                "asks": [["41001.0", "0.5", "0", "2"]],
                "ts": "1697026383085",
                "seqId": 123456
            }]
        });

        let message = parse_book_message(&frame).unwrap();
        assert_eq!(message.action, BookAction::Snapshot);
        assert_eq!(message.bids, vec![(41000.5, 2.5), (41000.0, 1.0)]);
        assert_eq!(message.asks, vec![(41001.0, 0.5)]);
        assert_eq!(message.sequence, Some(123456));
        assert_eq!(message.timestamp.timestamp_millis(), 1697026383085);
    }

    #[test]
    fn test_parse_update_frame() {
        let frame = json!({
            "arg": {"channel": "books", "instId": "BTC-USDT"},
            "action": "update",
            "data": [{
                "bids": [["41000.5", "0", "0", "0"]],
                "asks": [],
                "ts": "1697026383185",
                "seqId": 123457
            }]
        });

        let message = parse_book_message(&frame).unwrap();
        assert_eq!(message.action, BookAction::Update);
        assert_eq!(message.bids, vec![(41000.5, 0.0)]);
        assert!(message.asks.is_empty());
    }

    #[test]
    fn test_non_book_frames_ignored() {
        let ack = json!({"event": "subscribe", "arg": {"channel": "books", "instId": "BTC-USDT"}});
        assert!(parse_book_message(&ack).is_none());

        let ticker = json!({
            "arg": {"channel": "tickers", "instId": "BTC-USDT"},
            "data": [{"last": "41000.0"}]
        });
        assert!(parse_book_message(&ticker).is_none());
    }

    #[test]
    fn test_negative_seq_id_treated_as_unsequenced() {
        let frame = json!({
            "arg": {"channel": "books5", "instId": "BTC-USDT"},
            "data": [{
                "bids": [["41000.5", "2.5"]],
                "asks": [["41001.0", "0.5"]],
                "ts": "1697026383085",
                "seqId": -1
            }]
        });

        let message = parse_book_message(&frame).unwrap();
        // books5 frames carry no action and replace the visible window
        assert_eq!(message.action, BookAction::Snapshot);
        assert_eq!(message.sequence, None);
    }

    #[test]
    fn test_unparsable_levels_skipped() {
        let frame = json!({
            "arg": {"channel": "books", "instId": "BTC-USDT"},
            "action": "update",
            "data": [{
                "bids": [["not-a-number", "1.0"], ["41000.0", "1.0"]],
                "asks": [["41001.0"]],
                "ts": "1697026383085",
                "seqId": 5
            }]
        });

        let message = parse_book_message(&frame).unwrap();
        assert_eq!(message.bids, vec![(41000.0, 1.0)]);
        assert!(message.asks.is_empty());
    }
}
