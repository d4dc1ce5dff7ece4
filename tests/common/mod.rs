// Common test utilities and helpers

use chrono::Utc;
use trade_cost_estimator::{
    BookAction, BookMessage, BookSnapshot, Config, PriceLevelBook, Side, UpdateRecord,
};

/// Create a test configuration with small, deterministic windows
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.feed.instrument = "BTC-USDT".to_string();
    config.model.volatility_window = 10;
    config.model.daily_volume = 1000.0;
    config.metrics.latency_capacity = 64;
    config
}

/// Build a book from raw level sets
pub fn build_book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> PriceLevelBook {
    PriceLevelBook::from_levels("BTC-USDT", bids, asks, Utc::now(), Some(1))
        .expect("test levels must be valid")
}

/// Snapshot of a freshly built book
pub fn build_snapshot(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookSnapshot {
    build_book(bids, asks).snapshot()
}

/// Single-level update record
pub fn update(side: Side, price: f64, size: f64, sequence: Option<u64>) -> UpdateRecord {
    UpdateRecord {
        side,
        price,
        size,
        timestamp: Utc::now(),
        sequence,
    }
}

/// Delta message touching the given levels
pub fn delta(bids: &[(f64, f64)], asks: &[(f64, f64)], sequence: u64) -> BookMessage {
    BookMessage {
        action: BookAction::Update,
        bids: bids.to_vec(),
        asks: asks.to_vec(),
        timestamp: Utc::now(),
        sequence: Some(sequence),
    }
}

/// Snapshot message replacing the whole book
pub fn snapshot_message(bids: &[(f64, f64)], asks: &[(f64, f64)], sequence: u64) -> BookMessage {
    BookMessage {
        action: BookAction::Snapshot,
        bids: bids.to_vec(),
        asks: asks.to_vec(),
        timestamp: Utc::now(),
        sequence: Some(sequence),
    }
}

/// Generate a random-walk mid-price path
pub fn generate_test_prices(base_price: f64, count: usize, volatility: f64) -> Vec<f64> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut prices = Vec::with_capacity(count);
    let mut current_price = base_price;

    for _ in 0..count {
        let change_pct = rng.gen_range(-volatility..volatility);
        current_price *= 1.0 + change_pct;
        prices.push(current_price);
    }

    prices
}
