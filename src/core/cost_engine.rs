// Cost estimation engine
// Runs the slippage / impact / maker-taker pipeline over one consistent book
// snapshot and aggregates the pieces into a net-cost record

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::book::{BookSnapshot, TradeSide};
use crate::config::ModelConfig;
use crate::core::latency::LatencyTracker;
use crate::error::CostError;
use crate::models::{slippage, MakerTakerPredictor, MarketImpactModel};

/// Venue fee rates. A negative maker fee is a rebate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker_fee: f64,
    pub taker_fee: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            maker_fee: 0.0008,
            taker_fee: 0.0010,
        }
    }
}

impl FeeSchedule {
    pub fn validate(&self) -> Result<(), CostError> {
        if !self.maker_fee.is_finite() {
            return Err(CostError::invalid("maker_fee", "must be finite"));
        }
        if !self.taker_fee.is_finite() {
            return Err(CostError::invalid("taker_fee", "must be finite"));
        }
        Ok(())
    }
}

/// Immutable input to one cost computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimateRequest {
    pub size: f64,
    pub side: TradeSide,
    /// Annualized volatility; derived from the rolling price window when
    /// absent.
    pub volatility: Option<f64>,
    pub time_horizon: f64,
    /// Passive-placement dial in [0, 1].
    pub strategy_param: f64,
}

impl CostEstimateRequest {
    pub fn validate(&self) -> Result<(), CostError> {
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(CostError::invalid("size", "must be positive"));
        }
        if let Some(vol) = self.volatility {
            if !vol.is_finite() || vol < 0.0 {
                return Err(CostError::invalid("volatility", "must be non-negative"));
            }
        }
        if !self.time_horizon.is_finite() || self.time_horizon <= 0.0 {
            return Err(CostError::invalid("time_horizon", "must be positive"));
        }
        if !self.strategy_param.is_finite() || !(0.0..=1.0).contains(&self.strategy_param) {
            return Err(CostError::invalid("strategy_param", "must lie in [0, 1]"));
        }
        Ok(())
    }
}

/// Per-stage wall-clock breakdown of one computation, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub slippage_us: u64,
    pub impact_us: u64,
    pub maker_taker_us: u64,
    pub total_us: u64,
}

/// The pure aggregation output: cost components and their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub slippage: f64,
    pub impact_cost: f64,
    pub maker_proportion: f64,
    pub fee: f64,
    pub net_cost: f64,
}

/// Combine model outputs and the fee schedule into a cost breakdown.
///
/// `fee = size * (m * maker_fee + (1 - m) * taker_fee)`;
/// `net = slippage + impact + fee`. Nothing is clamped: negative slippage or
/// impact (favorable movement) propagates into the net cost. Identical
/// inputs always produce an identical result.
pub fn aggregate(
    slippage: f64,
    impact_cost: f64,
    maker_proportion: f64,
    size: f64,
    fees: &FeeSchedule,
) -> CostBreakdown {
    let blended_rate =
        maker_proportion * fees.maker_fee + (1.0 - maker_proportion) * fees.taker_fee;
    let fee = size * blended_rate;
    CostBreakdown {
        slippage,
        impact_cost,
        maker_proportion,
        fee,
        net_cost: slippage + impact_cost + fee,
    }
}

/// One completed estimate; created fresh per request and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimateResult {
    pub instrument: String,
    pub side: TradeSide,
    pub requested_size: f64,
    pub filled_size: f64,
    pub vwap: f64,
    pub slippage: f64,
    pub impact_cost: f64,
    pub maker_proportion: f64,
    pub fee: f64,
    pub net_cost: f64,
    pub book_sequence: u64,
    pub computed_at: DateTime<Utc>,
    pub latency: LatencyBreakdown,
}

/// Memoization key: the full input tuple of the pure pipeline — the request
/// bit pattern with volatility already resolved (the rolling window is an
/// input too), plus the book sequence the snapshot was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    size: u64,
    side: TradeSide,
    volatility: u64,
    time_horizon: u64,
    strategy_param: u64,
    sequence: u64,
}

impl CacheKey {
    fn new(request: &CostEstimateRequest, volatility: f64, sequence: u64) -> Self {
        Self {
            size: request.size.to_bits(),
            side: request.side,
            volatility: volatility.to_bits(),
            time_horizon: request.time_horizon.to_bits(),
            strategy_param: request.strategy_param.to_bits(),
            sequence,
        }
    }
}

/// Bounded FIFO cache over pure computations; safe because the aggregation
/// and model formulas are pure functions of the key.
#[derive(Debug, Default)]
struct CostCache {
    capacity: usize,
    entries: HashMap<CacheKey, CostEstimateResult>,
    order: VecDeque<CacheKey>,
}

impl CostCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<&CostEstimateResult> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: CacheKey, result: CostEstimateResult) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key, result).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }
}

/// Stage names recorded into the latency tracker.
pub const STAGE_SLIPPAGE: &str = "slippage";
pub const STAGE_IMPACT: &str = "impact";
pub const STAGE_MAKER_TAKER: &str = "maker_taker";
pub const STAGE_TOTAL: &str = "estimate_total";

/// Owns the models, fee schedule, and latency tracker, and runs the full
/// pipeline per request. Stateless across requests apart from the rolling
/// price window and the transparent memoization cache.
#[derive(Debug)]
pub struct CostEngine {
    impact: MarketImpactModel,
    predictor: MakerTakerPredictor,
    fees: FeeSchedule,
    daily_volume: f64,
    allow_partial_fills: bool,
    latency: LatencyTracker,
    cache: CostCache,
}

impl CostEngine {
    pub fn new(
        impact: MarketImpactModel,
        predictor: MakerTakerPredictor,
        fees: FeeSchedule,
        daily_volume: f64,
        allow_partial_fills: bool,
        cache_size: usize,
        latency_capacity: usize,
    ) -> Result<Self, CostError> {
        fees.validate()?;
        if !daily_volume.is_finite() || daily_volume <= 0.0 {
            return Err(CostError::invalid("daily_volume", "must be positive"));
        }
        Ok(Self {
            impact,
            predictor,
            fees,
            daily_volume,
            allow_partial_fills,
            latency: LatencyTracker::new(latency_capacity),
            cache: CostCache::new(cache_size),
        })
    }

    pub fn from_config(config: &ModelConfig, latency_capacity: usize) -> Result<Self, CostError> {
        Self::new(
            MarketImpactModel::new(config.impact)?,
            MakerTakerPredictor::new(config.maker_taker, config.volatility_window)?,
            config.fees,
            config.daily_volume,
            config.allow_partial_fills,
            config.cache_size,
            latency_capacity,
        )
    }

    /// Feed a mid-price observation into the rolling volatility window.
    pub fn observe_price(&mut self, price: f64) {
        self.predictor.observe_price(price);
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// Record an externally timed operation (e.g. book application) into the
    /// shared latency history.
    pub fn record_latency(&mut self, name: &str, duration: std::time::Duration) {
        self.latency.record(name, duration);
    }

    /// Run the full pipeline against one book snapshot.
    pub fn estimate(
        &mut self,
        snapshot: &BookSnapshot,
        request: &CostEstimateRequest,
    ) -> Result<CostEstimateResult, CostError> {
        request.validate()?;

        let volatility = request
            .volatility
            .unwrap_or_else(|| self.predictor.realized_volatility());

        let key = CacheKey::new(request, volatility, snapshot.sequence);
        if let Some(cached) = self.cache.get(&key) {
            debug!(sequence = snapshot.sequence, "cost estimate served from cache");
            return Ok(cached.clone());
        }

        let total_start = Instant::now();

        // Slippage: walk the book
        let stage_start = Instant::now();
        let fill = slippage::fill(snapshot, request.size, request.side)?;
        if !fill.complete && !self.allow_partial_fills {
            return Err(CostError::InsufficientLiquidity {
                requested: fill.requested,
                filled: fill.filled,
                partial_slippage: slippage::fill_slippage(snapshot, &fill, request.side),
            });
        }
        if !fill.complete {
            warn!(
                requested = fill.requested,
                filled = fill.filled,
                "book too shallow; estimating from the filled portion"
            );
        }
        let slippage = slippage::fill_slippage(snapshot, &fill, request.side);
        let slippage_elapsed = stage_start.elapsed();

        // Impact: closed-form model on unsigned size, so the term is an
        // adverse cost for either direction
        let stage_start = Instant::now();
        let impact_cost = self
            .impact
            .impact(request.size, volatility, request.time_horizon);
        let impact_elapsed = stage_start.elapsed();

        // Maker/taker split from the current spread
        let stage_start = Instant::now();
        let spread_fraction = snapshot.spread_fraction()?;
        let maker_proportion = self.predictor.predict(
            request.size,
            self.daily_volume,
            Some(volatility),
            spread_fraction,
            request.strategy_param,
        );
        let maker_taker_elapsed = stage_start.elapsed();

        let breakdown = aggregate(
            slippage,
            impact_cost,
            maker_proportion,
            request.size,
            &self.fees,
        );
        let total_elapsed = total_start.elapsed();

        self.latency.record(STAGE_SLIPPAGE, slippage_elapsed);
        self.latency.record(STAGE_IMPACT, impact_elapsed);
        self.latency.record(STAGE_MAKER_TAKER, maker_taker_elapsed);
        self.latency.record(STAGE_TOTAL, total_elapsed);

        let result = CostEstimateResult {
            instrument: snapshot.instrument.clone(),
            side: request.side,
            requested_size: request.size,
            filled_size: fill.filled,
            vwap: fill.vwap().unwrap_or_default(),
            slippage: breakdown.slippage,
            impact_cost: breakdown.impact_cost,
            maker_proportion: breakdown.maker_proportion,
            fee: breakdown.fee,
            net_cost: breakdown.net_cost,
            book_sequence: snapshot.sequence,
            computed_at: Utc::now(),
            latency: LatencyBreakdown {
                slippage_us: slippage_elapsed.as_micros() as u64,
                impact_us: impact_elapsed.as_micros() as u64,
                maker_taker_us: maker_taker_elapsed.as_micros() as u64,
                total_us: total_elapsed.as_micros() as u64,
            },
        };
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}
