// Configuration management for the cost estimator

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::book::TradeSide;
use crate::core::cost_engine::{CostEstimateRequest, FeeSchedule};
use crate::models::{ImpactParams, MakerTakerParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_url: String,
    pub instrument: String,
    /// Depth requested from the REST snapshot endpoint.
    pub snapshot_depth: u32,
    /// Book age beyond which estimates are flagged as stale.
    pub max_book_age_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.okx.com:8443/ws/v5/public".to_string(),
            rest_url: "https://www.okx.com".to_string(),
            instrument: "BTC-USDT".to_string(),
            snapshot_depth: 50,
            max_book_age_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub impact: ImpactParams,
    pub maker_taker: MakerTakerParams,
    pub fees: FeeSchedule,
    /// Number of mid prices retained for realized volatility.
    pub volatility_window: usize,
    /// Reference daily volume used for participation in the maker/taker
    /// model, in base units.
    pub daily_volume: f64,
    /// Estimate from the filled portion when the book is too shallow,
    /// instead of failing the request.
    pub allow_partial_fills: bool,
    /// Bounded memoization cache size; 0 disables caching.
    pub cache_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            impact: ImpactParams::default(),
            maker_taker: MakerTakerParams::default(),
            fees: FeeSchedule::default(),
            volatility_window: 50,
            daily_volume: 5000.0,
            allow_partial_fills: false,
            cache_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Samples retained per latency metric.
    pub latency_capacity: usize,
    /// Destination of the CSV export written on shutdown.
    pub export_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_capacity: 1024,
            export_path: "latency_metrics.csv".to_string(),
        }
    }
}

/// Default request parameters used by `run` mode when the caller does not
/// override them on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub size: f64,
    pub side: TradeSide,
    pub volatility: Option<f64>,
    pub time_horizon: f64,
    pub strategy_param: f64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            size: 1.0,
            side: TradeSide::Buy,
            volatility: None,
            time_horizon: 1.0,
            strategy_param: 0.5,
        }
    }
}

impl RequestConfig {
    pub fn to_request(&self) -> CostEstimateRequest {
        CostEstimateRequest {
            size: self.size,
            side: self.side,
            volatility: self.volatility,
            time_horizon: self.time_horizon,
            strategy_param: self.strategy_param,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub model: ModelConfig,
    pub metrics: MetricsConfig,
    pub request: RequestConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.instrument.is_empty() {
            return Err(ConfigError::Validation("instrument must not be empty".to_string()));
        }
        if self.feed.snapshot_depth == 0 {
            return Err(ConfigError::Validation("snapshot_depth must be greater than 0".to_string()));
        }
        if self.feed.max_book_age_secs == 0 {
            return Err(ConfigError::Validation("max_book_age_secs must be greater than 0".to_string()));
        }

        self.model.impact.validate().map_err(validation)?;
        self.model.maker_taker.validate().map_err(validation)?;
        self.model.fees.validate().map_err(validation)?;
        if self.model.volatility_window == 0 {
            return Err(ConfigError::Validation("volatility_window must be greater than 0".to_string()));
        }
        if self.model.daily_volume <= 0.0 {
            return Err(ConfigError::Validation("daily_volume must be positive".to_string()));
        }

        if self.metrics.latency_capacity == 0 {
            return Err(ConfigError::Validation("latency_capacity must be greater than 0".to_string()));
        }

        self.request.to_request().validate().map_err(validation)?;

        Ok(())
    }
}

fn validation(err: crate::error::CostError) -> ConfigError {
    ConfigError::Validation(err.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
