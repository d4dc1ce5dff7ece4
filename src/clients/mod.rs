// Exchange feed clients

pub mod okx_rest;
pub mod okx_ws;

// Re-export client types
pub use okx_rest::{OkxApiError, OkxRestClient};
pub use okx_ws::{handle_event_message, parse_book_message, FeedError, OkxWebSocketClient};
