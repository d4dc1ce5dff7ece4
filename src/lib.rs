// Trade Cost Estimator Library
//
// Real-time order book state and a cost-estimation pipeline on top of it:
// expected slippage, market impact, maker/taker fee split, and net cost for
// a hypothetical order, with per-stage latency tracking.

pub mod book;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod models;

// Re-export book types
pub use book::{
    BookAction, BookMessage, BookSnapshot, PriceLevel, PriceLevelBook, SharedBook, Side,
    TradeSide, UpdateRecord,
};

// Re-export error types
pub use error::{BookError, CostError};

// Re-export the estimation pipeline
pub use core::{
    aggregate, CostBreakdown, CostEngine, CostEstimateRequest, CostEstimateResult, FeeSchedule,
    LatencyBreakdown, LatencyStats, LatencyTracker,
};

// Re-export models
pub use models::{BookFill, ImpactParams, MakerTakerParams, MakerTakerPredictor, MarketImpactModel};

// Re-export client types
pub use clients::{OkxRestClient, OkxWebSocketClient};

// Re-export configuration
pub use config::{Config, ConfigError, FeedConfig, MetricsConfig, ModelConfig, RequestConfig};
