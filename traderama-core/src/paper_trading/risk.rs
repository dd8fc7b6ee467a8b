//! Risk aggregation for the simulated engine

use crate::config::TradingParameters;
use crate::types::Trade;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall risk classification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Exposure metrics recomputed every tick
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RiskMetrics {
    pub daily_loss_used: f64,
    pub max_position_used: f64,
    pub open_positions: usize,
    pub risk_exposure: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

const DAILY_LOSS_WEIGHT: f64 = 0.4;
const OPEN_POSITIONS_WEIGHT: f64 = 0.3;
const POSITION_SIZE_WEIGHT: f64 = 0.3;

fn ratio(used: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        used / limit
    } else {
        0.0
    }
}

/// Weighted risk score. Ratios are not clamped, so the score may exceed 1.
pub fn risk_score(metrics: &RiskMetrics, params: &TradingParameters) -> f64 {
    DAILY_LOSS_WEIGHT * ratio(metrics.daily_loss_used, params.daily_loss_limit)
        + OPEN_POSITIONS_WEIGHT * ratio(metrics.open_positions as f64, params.max_open_positions as f64)
        + POSITION_SIZE_WEIGHT * ratio(metrics.max_position_used, params.max_position_size)
}

/// Derive risk metrics from the active trades and today's P&L
pub fn aggregate(active: &[Trade], daily_pnl: f64, params: &TradingParameters) -> RiskMetrics {
    let mut metrics = RiskMetrics {
        daily_loss_used: (-daily_pnl).max(0.0),
        open_positions: active.len(),
        ..Default::default()
    };

    for trade in active {
        let notional = trade.notional();
        metrics.risk_exposure += notional;
        metrics.max_position_used = metrics.max_position_used.max(notional);
    }

    metrics.risk_score = risk_score(&metrics, params);
    metrics.risk_level = RiskLevel::from_score(metrics.risk_score);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, Symbol};
    use chrono::Utc;

    fn trade(price: f64, size: u64) -> Trade {
        Trade::open(1, Symbol::new("TSLA"), Side::Buy, size, price, "test", Utc::now())
    }

    #[test]
    fn test_empty_book_is_low_risk() {
        let metrics = aggregate(&[], 0.0, &TradingParameters::default());
        assert_eq!(metrics.open_positions, 0);
        assert_eq!(metrics.risk_exposure, 0.0);
        assert_eq!(metrics.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_exposure_and_score() {
        let params = TradingParameters {
            max_position_size: 10_000.0,
            daily_loss_limit: 1_000.0,
            max_open_positions: 5,
            ..Default::default()
        };
        let active = vec![trade(100.0, 20), trade(250.0, 4)];

        let metrics = aggregate(&active, -500.0, &params);
        assert_eq!(metrics.daily_loss_used, 500.0);
        assert_eq!(metrics.max_position_used, 2_000.0);
        assert_eq!(metrics.risk_exposure, 3_000.0);
        // 0.4*0.5 + 0.3*0.4 + 0.3*0.2
        assert!((metrics.risk_score - 0.38).abs() < 1e-9);
        assert_eq!(metrics.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_profit_day_uses_no_loss_budget() {
        let metrics = aggregate(&[], 750.0, &TradingParameters::default());
        assert_eq!(metrics.daily_loss_used, 0.0);
    }

    #[test]
    fn test_score_above_one_is_high() {
        let params = TradingParameters::default();
        let metrics = aggregate(&[], -5_000.0, &params);
        assert!(metrics.risk_score > 1.0);
        assert_eq!(metrics.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.69), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::High);
    }
}
