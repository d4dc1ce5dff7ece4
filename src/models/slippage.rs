// Slippage estimation
// Walks book snapshots to compute volume-weighted execution price and the
// relative slippage versus the best quote

use crate::book::{BookSnapshot, TradeSide};
use crate::error::{BookError, CostError};

/// Outcome of walking the book for a hypothetical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookFill {
    pub requested: f64,
    pub filled: f64,
    /// Total notional paid/received for the filled portion.
    pub cost: f64,
    pub complete: bool,
}

impl BookFill {
    /// Volume-weighted average price of the filled portion.
    pub fn vwap(&self) -> Option<f64> {
        if self.filled > 0.0 {
            Some(self.cost / self.filled)
        } else {
            None
        }
    }
}

/// Walk the relevant side in priority order, consuming levels until the
/// requested size is filled or the book runs out.
pub fn fill(snapshot: &BookSnapshot, size: f64, side: TradeSide) -> Result<BookFill, CostError> {
    if !size.is_finite() || size < 0.0 {
        return Err(CostError::invalid("size", format!("{size} is not a valid size")));
    }

    let levels = snapshot.levels(side);
    if levels.is_empty() {
        return Err(BookError::Empty(side.book_side()).into());
    }

    let mut remaining = size;
    let mut cost = 0.0;
    for level in levels {
        if remaining <= 0.0 {
            break;
        }
        let executed = remaining.min(level.size);
        cost += executed * level.price;
        remaining -= executed;
    }

    Ok(BookFill {
        requested: size,
        filled: size - remaining,
        cost,
        complete: remaining <= 0.0,
    })
}

/// Estimate relative slippage for a hypothetical order of `size`.
///
/// Slippage is `(vwap - best) / best`, negated for sells so that adverse
/// price movement is positive for either direction. A book too shallow for
/// the full size yields [`CostError::InsufficientLiquidity`] carrying the
/// filled size and the slippage of the filled portion, so the caller can
/// decide whether the partial estimate is acceptable.
pub fn estimate(snapshot: &BookSnapshot, size: f64, side: TradeSide) -> Result<f64, CostError> {
    if size == 0.0 {
        return Ok(0.0);
    }

    let result = fill(snapshot, size, side)?;
    let slippage = fill_slippage(snapshot, &result, side);

    if !result.complete {
        return Err(CostError::InsufficientLiquidity {
            requested: result.requested,
            filled: result.filled,
            partial_slippage: slippage,
        });
    }
    Ok(slippage)
}

/// Slippage of an already-computed fill against the best quote on its side.
pub fn fill_slippage(snapshot: &BookSnapshot, fill: &BookFill, side: TradeSide) -> f64 {
    let best = match snapshot.levels(side).first() {
        Some(level) => level.price,
        None => return 0.0,
    };
    let vwap = match fill.vwap() {
        Some(vwap) => vwap,
        None => return 0.0,
    };

    let raw = (vwap - best) / best;
    match side {
        TradeSide::Buy => raw,
        TradeSide::Sell => -raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PriceLevel;

    fn snapshot(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> BookSnapshot {
        BookSnapshot {
            instrument: "BTC-USDT".to_string(),
            bids: bids.iter().map(|&(price, size)| PriceLevel { price, size }).collect(),
            asks: asks.iter().map(|&(price, size)| PriceLevel { price, size }).collect(),
            last_update: None,
            sequence: 1,
        }
    }

    #[test]
    fn test_zero_size_is_free() {
        let snap = snapshot(&[(99.0, 5.0)], &[(100.0, 5.0)]);
        assert_eq!(estimate(&snap, 0.0, TradeSide::Buy).unwrap(), 0.0);
        assert_eq!(estimate(&snap, 0.0, TradeSide::Sell).unwrap(), 0.0);
    }

    #[test]
    fn test_buy_walks_asks() {
        // Asks [(100,5),(101,10)], buy 8: 5@100 + 3@101 -> vwap 100.375
        let snap = snapshot(&[], &[(100.0, 5.0), (101.0, 10.0)]);
        let slippage = estimate(&snap, 8.0, TradeSide::Buy).unwrap();
        assert!((slippage - 0.00375).abs() < 1e-12);
    }

    #[test]
    fn test_sell_slippage_positive_when_price_falls() {
        let snap = snapshot(&[(100.0, 5.0), (99.0, 10.0)], &[]);
        let slippage = estimate(&snap, 8.0, TradeSide::Sell).unwrap();
        // vwap = (500 + 297) / 8 = 99.625, raw = -0.00375, negated for sells
        assert!((slippage - 0.00375).abs() < 1e-12);
    }

    #[test]
    fn test_single_level_fill_has_no_slippage() {
        let snap = snapshot(&[], &[(100.0, 10.0)]);
        assert_eq!(estimate(&snap, 5.0, TradeSide::Buy).unwrap(), 0.0);
    }

    #[test]
    fn test_insufficient_liquidity_reports_filled() {
        let snap = snapshot(&[], &[(100.0, 5.0), (101.0, 10.0)]);
        match estimate(&snap, 20.0, TradeSide::Buy) {
            Err(CostError::InsufficientLiquidity {
                requested,
                filled,
                partial_slippage,
            }) => {
                assert_eq!(requested, 20.0);
                assert_eq!(filled, 15.0);
                // filled portion: (500 + 1010) / 15 = 100.6667
                assert!(partial_slippage > 0.0);
            }
            other => panic!("expected InsufficientLiquidity, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_side_errors() {
        let snap = snapshot(&[(99.0, 5.0)], &[]);
        assert!(matches!(
            estimate(&snap, 1.0, TradeSide::Buy),
            Err(CostError::Book(BookError::Empty(_)))
        ));
    }

    #[test]
    fn test_fill_exposes_cost_and_vwap() {
        let snap = snapshot(&[], &[(100.0, 5.0), (101.0, 10.0)]);
        let result = fill(&snap, 8.0, TradeSide::Buy).unwrap();
        assert_eq!(result.filled, 8.0);
        assert_eq!(result.cost, 5.0 * 100.0 + 3.0 * 101.0);
        assert!((result.vwap().unwrap() - 100.375).abs() < 1e-12);
        assert!(result.complete);
    }
}
