// Cost estimation pipeline
// Aggregation of model outputs into net-cost records, plus latency tracking

pub mod cost_engine;
pub mod latency;

pub use cost_engine::{
    aggregate, CostBreakdown, CostEngine, CostEstimateRequest, CostEstimateResult, FeeSchedule,
    LatencyBreakdown,
};
pub use latency::{LatencyStats, LatencyTracker};
