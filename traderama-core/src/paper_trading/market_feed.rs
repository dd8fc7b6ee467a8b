//! Simulated market feed

use crate::types::Trade;
use rand::{Rng, RngCore};

/// Source of the next mark price for an open trade
pub trait PriceModel: Send + Sync {
    fn next_price(&self, trade: &Trade, rng: &mut dyn RngCore) -> f64;
}

/// Uniform random walk: `price * (1 + U(-volatility, volatility))`
#[derive(Clone, Debug)]
pub struct RandomWalk {
    volatility: f64,
}

impl RandomWalk {
    pub fn new(volatility: f64) -> Self {
        Self {
            volatility: if volatility.is_finite() { volatility.abs() } else { 0.0 },
        }
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl PriceModel for RandomWalk {
    fn next_price(&self, trade: &Trade, rng: &mut dyn RngCore) -> f64 {
        if self.volatility == 0.0 {
            return trade.current_price;
        }
        let change = rng.gen_range(-self.volatility..=self.volatility);
        trade.current_price * (1.0 + change)
    }
}

/// Re-mark every trade using the given model
pub fn apply(model: &dyn PriceModel, trades: &mut [Trade], rng: &mut dyn RngCore) {
    for trade in trades.iter_mut() {
        let price = model.next_price(trade, rng);
        trade.mark(price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, Symbol};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_walk_stays_in_band() {
        let walk = RandomWalk::new(0.01);
        let mut rng = StdRng::seed_from_u64(7);
        let trade = Trade::open(1, Symbol::new("MSFT"), Side::Buy, 3, 400.0, "test", Utc::now());

        for _ in 0..1_000 {
            let price = walk.next_price(&trade, &mut rng);
            assert!(price >= 396.0 - 1e-9 && price <= 404.0 + 1e-9);
        }
    }

    #[test]
    fn test_non_finite_volatility_holds_price() {
        let walk = RandomWalk::new(f64::NAN);
        let mut rng = StdRng::seed_from_u64(7);
        let trade = Trade::open(1, Symbol::new("MSFT"), Side::Buy, 3, 400.0, "test", Utc::now());
        assert_eq!(walk.next_price(&trade, &mut rng), 400.0);
    }

    #[test]
    fn test_apply_updates_pnl() {
        let walk = RandomWalk::new(0.01);
        let mut rng = StdRng::seed_from_u64(11);
        let mut trades = vec![Trade::open(1, Symbol::new("MSFT"), Side::Sell, 2, 400.0, "test", Utc::now())];

        apply(&walk, &mut trades, &mut rng);
        let t = &trades[0];
        let expected = (t.current_price - 400.0) * 2.0 * -1.0;
        assert!((t.pnl - expected).abs() < 1e-9);
    }
}
