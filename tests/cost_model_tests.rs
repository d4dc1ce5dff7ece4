// Cost model scenarios: slippage, impact, maker/taker, aggregation, latency

mod common;

use common::{build_snapshot, create_test_config};
use std::time::Duration;
use trade_cost_estimator::models::slippage;
use trade_cost_estimator::{
    aggregate, CostEngine, CostError, CostEstimateRequest, FeeSchedule, ImpactParams,
    LatencyTracker, MakerTakerParams, MakerTakerPredictor, MarketImpactModel, TradeSide,
};

fn request(size: f64, side: TradeSide) -> CostEstimateRequest {
    CostEstimateRequest {
        size,
        side,
        volatility: Some(0.2),
        time_horizon: 1.0,
        strategy_param: 0.5,
    }
}

#[test]
fn test_buy_eight_against_reference_book() {
    // Asks [(100,5),(101,10)]: 5@100 + 3@101 -> weighted price 100.375
    let snap = build_snapshot(&[(99.0, 50.0)], &[(100.0, 5.0), (101.0, 10.0)]);
    let slippage = slippage::estimate(&snap, 8.0, TradeSide::Buy).unwrap();
    assert!((slippage - 0.00375).abs() < 1e-12);
}

#[test]
fn test_buy_twenty_exhausts_ask_depth() {
    let snap = build_snapshot(&[(99.0, 50.0)], &[(100.0, 5.0), (101.0, 10.0)]);
    match slippage::estimate(&snap, 20.0, TradeSide::Buy) {
        Err(CostError::InsufficientLiquidity { requested, filled, .. }) => {
            assert_eq!(requested, 20.0);
            assert_eq!(filled, 15.0);
        }
        other => panic!("expected InsufficientLiquidity, got {other:?}"),
    }
}

#[test]
fn test_zero_size_slippage_is_zero_for_any_book() {
    for (bids, asks) in [
        (vec![(99.0, 1.0)], vec![(100.0, 1.0)]),
        (vec![], vec![(100.0, 1.0)]),
        (vec![(99.0, 1.0)], vec![]),
    ] {
        let snap = build_snapshot(&bids, &asks);
        assert_eq!(slippage::estimate(&snap, 0.0, TradeSide::Buy).unwrap(), 0.0);
        assert_eq!(slippage::estimate(&snap, 0.0, TradeSide::Sell).unwrap(), 0.0);
    }
}

#[test]
fn test_impact_of_zero_size_is_exactly_zero() {
    let model = MarketImpactModel::new(ImpactParams::default()).unwrap();
    for volatility in [0.0, 0.1, 5.0] {
        for horizon in [0.001, 1.0, 1e6] {
            assert_eq!(model.impact(0.0, volatility, horizon), 0.0);
        }
    }
}

#[test]
fn test_predictor_bounded_over_nine_orders_of_magnitude() {
    let predictor = MakerTakerPredictor::new(MakerTakerParams::default(), 16).unwrap();
    let mut size = 1.0;
    while size <= 1e9 {
        for volatility in [0.0, 0.5, 10.0] {
            let p = predictor.predict(size, 1.0, Some(volatility), 0.001, 1.0);
            assert!((0.0..=1.0).contains(&p), "size {size} vol {volatility} -> {p}");
        }
        size *= 10.0;
    }
}

#[test]
fn test_aggregation_matches_hand_computed_fee() {
    let fees = FeeSchedule {
        maker_fee: 0.0002,
        taker_fee: 0.0006,
    };
    let breakdown = aggregate(0.00375, 0.001, 0.5, 8.0, &fees);
    let expected_fee = 8.0 * (0.5 * 0.0002 + 0.5 * 0.0006);
    assert!((breakdown.fee - expected_fee).abs() < 1e-15);
    assert!((breakdown.net_cost - (0.00375 + 0.001 + expected_fee)).abs() < 1e-15);
}

#[test]
fn test_favorable_components_lower_net_cost() {
    let fees = FeeSchedule {
        maker_fee: -0.0001, // rebate
        taker_fee: 0.0005,
    };
    let breakdown = aggregate(-0.001, 0.0, 1.0, 10.0, &fees);
    // All-maker execution with a rebate and favorable slippage: net negative
    assert!(breakdown.net_cost < 0.0);
}

#[test]
fn test_engine_sell_side_walks_bids() {
    let mut engine = CostEngine::from_config(&create_test_config().model, 64).unwrap();
    let snap = build_snapshot(&[(100.0, 5.0), (99.0, 10.0)], &[(101.0, 50.0)]);

    let result = engine.estimate(&snap, &request(8.0, TradeSide::Sell)).unwrap();
    // 5@100 + 3@99 -> vwap 99.625, adverse for a seller
    assert!((result.vwap - 99.625).abs() < 1e-12);
    assert!((result.slippage - 0.00375).abs() < 1e-12);
}

#[test]
fn test_latency_statistics_known_samples() {
    let mut tracker = LatencyTracker::new(32);
    for ms in [1, 2, 3] {
        tracker.record("estimate_total", Duration::from_millis(ms));
    }

    let stats = tracker.statistics("estimate_total").unwrap();
    assert_eq!(stats.count, 3);
    assert_eq!(stats.mean, Duration::from_millis(2));
    assert_eq!(stats.min, Duration::from_millis(1));
    assert_eq!(stats.max, Duration::from_millis(3));
}

#[test]
fn test_engine_requires_both_sides_for_spread() {
    let mut engine = CostEngine::from_config(&create_test_config().model, 64).unwrap();
    let snap = build_snapshot(&[], &[(100.0, 50.0)]);

    // Slippage alone would succeed, but the maker/taker stage needs a spread
    assert!(matches!(
        engine.estimate(&snap, &request(1.0, TradeSide::Buy)),
        Err(CostError::Book(_))
    ));
}
