// Market impact model
// Closed-form Almgren-Chriss style estimate of temporary + permanent impact

use serde::{Deserialize, Serialize};

use crate::error::CostError;

/// Impact coefficients, calibrated per instrument and passed in from
/// configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpactParams {
    /// Temporary impact coefficient (sigma).
    pub temp_coeff: f64,
    /// Temporary impact exponent; must lie in (0, 1].
    pub alpha: f64,
    /// Permanent impact coefficient.
    pub perm_coeff: f64,
    /// Risk aversion (lambda) weighting the volatility-horizon term.
    pub risk_aversion: f64,
}

impl Default for ImpactParams {
    fn default() -> Self {
        Self {
            temp_coeff: 1e-4,
            alpha: 0.6,
            perm_coeff: 5e-5,
            risk_aversion: 0.01,
        }
    }
}

impl ImpactParams {
    pub fn validate(&self) -> Result<(), CostError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha > 1.0 {
            return Err(CostError::invalid("alpha", "must lie in (0, 1]"));
        }
        for (name, value) in [
            ("temp_coeff", self.temp_coeff),
            ("perm_coeff", self.perm_coeff),
            ("risk_aversion", self.risk_aversion),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CostError::invalid(name, "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// Computes market-impact cost in the same units as slippage (fraction of
/// notional), so the two sum directly.
#[derive(Debug, Clone)]
pub struct MarketImpactModel {
    params: ImpactParams,
}

impl MarketImpactModel {
    pub fn new(params: ImpactParams) -> Result<Self, CostError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ImpactParams {
        &self.params
    }

    /// Total impact for a signed trade size.
    ///
    /// `temp = temp_coeff * |size|^alpha * sign(size)`
    /// `perm = perm_coeff * volatility * sqrt(|size|) * sign(size)`
    /// `total = temp + perm + risk_aversion * volatility^2 * time_horizon`
    ///
    /// The permanent component is monotonic in size and volatility,
    /// sub-linear in size, and continuous at zero. A zero size costs exactly
    /// zero regardless of the other inputs.
    pub fn impact(&self, size: f64, volatility: f64, time_horizon: f64) -> f64 {
        if size == 0.0 {
            return 0.0;
        }

        let magnitude = size.abs();
        let sign = size.signum();

        let temp = self.params.temp_coeff * magnitude.powf(self.params.alpha) * sign;
        let perm = self.params.perm_coeff * volatility * magnitude.sqrt() * sign;
        let risk = self.params.risk_aversion * volatility * volatility * time_horizon;

        temp + perm + risk
    }
}
