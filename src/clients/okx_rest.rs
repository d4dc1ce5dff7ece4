// OKX REST client for depth-snapshot bootstrap
//
// Used to seed the book before the WebSocket stream starts and to re-seed it
// after a reconnect, so ingestion resumes from a full snapshot.

use serde_json::Value;

use crate::book::{BookAction, BookMessage};
use crate::clients::okx_ws::{parse_levels, parse_timestamp};

#[derive(Debug, thiserror::Error)]
pub enum OkxApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error: {0}")]
    HttpError(u16),

    #[error("API error {code}: {msg}")]
    ApiError { code: String, msg: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug)]
pub struct OkxRestClient {
    client: reqwest::Client,
    base_url: String,
}

impl OkxRestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch a full depth snapshot for one instrument.
    pub async fn fetch_book_snapshot(
        &self,
        instrument: &str,
        depth: u32,
    ) -> Result<BookMessage, OkxApiError> {
        let url = format!("{}/api/v5/market/books", self.base_url);
        let params = [("instId", instrument.to_string()), ("sz", depth.to_string())];

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| OkxApiError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OkxApiError::HttpError(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| OkxApiError::ParseError(e.to_string()))?;

        parse_book_response(&json)
    }
}

/// Parse the REST depth response into a snapshot-action [`BookMessage`].
pub fn parse_book_response(json: &Value) -> Result<BookMessage, OkxApiError> {
    let code = json
        .get("code")
        .and_then(|c| c.as_str())
        .ok_or_else(|| OkxApiError::ParseError("missing code field".to_string()))?;
    if code != "0" {
        return Err(OkxApiError::ApiError {
            code: code.to_string(),
            msg: json
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }

    let entry = json
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| OkxApiError::ParseError("missing data entry".to_string()))?;

    Ok(BookMessage {
        action: BookAction::Snapshot,
        bids: parse_levels(entry.get("bids")),
        asks: parse_levels(entry.get("asks")),
        timestamp: parse_timestamp(entry.get("ts")),
        // The REST endpoint carries no sequence; the first sequenced delta
        // after the snapshot re-establishes gating
        sequence: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_book_response() {
        let response = json!({
            "code": "0",
            "msg": "",
            "data": [{
                "bids": [["41006.8", "0.60", "0", "1"]],
                "asks": [["41006.9", "0.88", "0", "4"]],
                "ts": "1629966436396"
            }]
        });

        let message = parse_book_response(&response).unwrap();
        assert_eq!(message.action, BookAction::Snapshot);
        assert_eq!(message.bids, vec![(41006.8, 0.60)]);
        assert_eq!(message.asks, vec![(41006.9, 0.88)]);
        assert_eq!(message.sequence, None);
    }

    #[test]
    fn test_api_error_code_surfaces() {
        let response = json!({
            "code": "51001",
            "msg": "Instrument ID does not exist",
            "data": []
        });

        match parse_book_response(&response) {
            Err(OkxApiError::ApiError { code, msg }) => {
                assert_eq!(code, "51001");
                assert!(msg.contains("Instrument"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_data_is_parse_error() {
        let response = json!({"code": "0", "msg": "", "data": []});
        assert!(matches!(
            parse_book_response(&response),
            Err(OkxApiError::ParseError(_))
        ));
    }
}
