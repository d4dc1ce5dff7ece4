// Unified error handling for the cost estimator
//
// Every error here is scoped to a single update or a single request; none of
// them terminates the process. Feed-level failures live in clients::FeedError
// and resolve into reconnect attempts.

use crate::book::Side;

/// Errors raised while mutating or querying the order book.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookError {
    #[error("no {0} levels in the book")]
    Empty(Side),

    #[error("stale update: sequence {got} <= current {last}")]
    Stale { last: u64, got: u64 },

    #[error("inconsistent update rejected: {0}")]
    Inconsistent(String),
}

/// Errors raised by a single cost-estimation request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostError {
    #[error(transparent)]
    Book(#[from] BookError),

    #[error("insufficient liquidity: requested {requested}, filled {filled}")]
    InsufficientLiquidity {
        requested: f64,
        filled: f64,
        /// Slippage of the portion that could be filled, so callers may fall
        /// back to a partial estimate.
        partial_slippage: f64,
    },

    #[error("invalid parameter '{param}': {reason}")]
    InvalidParameter { param: &'static str, reason: String },
}

impl CostError {
    pub fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        CostError::InvalidParameter {
            param,
            reason: reason.into(),
        }
    }

    /// Whether the same request can succeed later without changing its
    /// parameters (book-state errors clear as the feed moves).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CostError::InvalidParameter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_contains_context() {
        let err = BookError::Stale { last: 7, got: 5 };
        assert!(err.to_string().contains('5'));
        assert!(err.to_string().contains('7'));

        let err = CostError::InsufficientLiquidity {
            requested: 20.0,
            filled: 15.0,
            partial_slippage: 0.001,
        };
        assert!(err.to_string().contains("20"));
        assert!(err.to_string().contains("15"));
    }

    #[test]
    fn test_recoverable() {
        let err = CostError::Book(BookError::Empty(Side::Ask));
        assert!(err.is_recoverable());

        let err = CostError::invalid("size", "must be positive");
        assert!(!err.is_recoverable());
    }
}
