//! Trade signal generation and position sizing

use crate::config::{Instrument, TradingParameters};
use crate::types::{Side, Symbol};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Request to open a trade, either fabricated by the generator or
/// submitted from outside the engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TradeProposal {
    pub symbol: Symbol,
    pub side: Side,
    pub price: f64,
    /// Explicit share count; `None` means size to the limits
    pub size_hint: Option<u64>,
    pub strategy: String,
}

/// Largest whole-share size allowed at `price`.
///
/// Bounded by both the absolute position cap and the per-trade share of
/// equity.
pub fn max_permissible_size(params: &TradingParameters, equity: f64, price: f64) -> u64 {
    if !(price > 0.0) || !(equity > 0.0) {
        return 0;
    }
    let by_position = params.max_position_size / price;
    let by_equity = params.max_trade_percentage / 100.0 * equity / price;
    let size = by_position.min(by_equity).floor();
    if size.is_finite() && size > 0.0 {
        size as u64
    } else {
        0
    }
}

/// Resolve the share count for a proposal, or `None` if it cannot trade
pub fn resolve_size(proposal: &TradeProposal, params: &TradingParameters, equity: f64) -> Option<u64> {
    let cap = max_permissible_size(params, equity, proposal.price);
    let size = match proposal.size_hint {
        Some(hint) => hint.min(cap),
        None => cap,
    };
    (size > 0).then_some(size)
}

/// Fabricates trades with a fixed per-tick probability
#[derive(Clone, Debug)]
pub struct SignalGenerator {
    probability: f64,
    symbols: Vec<Instrument>,
    strategy: String,
}

impl SignalGenerator {
    /// Spread of the entry price around the symbol's reference price
    const PRICE_SPREAD: f64 = 0.05;

    pub fn new(probability: f64, symbols: Vec<Instrument>, strategy: impl Into<String>) -> Self {
        Self {
            probability: if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) },
            symbols,
            strategy: strategy.into(),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll for a new trade this tick
    pub fn maybe_generate(&self, rng: &mut dyn RngCore) -> Option<TradeProposal> {
        if self.symbols.is_empty() || !rng.gen_bool(self.probability) {
            return None;
        }

        let instrument = self.symbols.choose(rng)?;
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let jitter = rng.gen_range(-Self::PRICE_SPREAD..=Self::PRICE_SPREAD);

        Some(TradeProposal {
            symbol: instrument.symbol.clone(),
            side,
            price: instrument.reference_price * (1.0 + jitter),
            size_hint: None,
            strategy: self.strategy.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sizing_takes_tighter_limit() {
        let params = TradingParameters {
            max_position_size: 10_000.0,
            max_trade_percentage: 2.0,
            ..Default::default()
        };
        // min(10000/500, 0.02*25000/500) = min(20, 1)
        assert_eq!(max_permissible_size(&params, 25_000.0, 500.0), 1);
        // min(10000/100, 0.02*25000/100) = min(100, 5)
        assert_eq!(max_permissible_size(&params, 25_000.0, 100.0), 5);
    }

    #[test]
    fn test_sizing_floors_to_zero() {
        let params = TradingParameters::default();
        assert_eq!(max_permissible_size(&params, 25_000.0, 600.0), 0);
        assert_eq!(max_permissible_size(&params, 0.0, 100.0), 0);
        assert_eq!(max_permissible_size(&params, 25_000.0, 0.0), 0);
    }

    #[test]
    fn test_size_hint_is_capped() {
        let params = TradingParameters::default();
        let proposal = TradeProposal {
            symbol: Symbol::new("AAPL"),
            side: Side::Buy,
            price: 100.0,
            size_hint: Some(50),
            strategy: "manual".into(),
        };
        assert_eq!(resolve_size(&proposal, &params, 25_000.0), Some(5));
    }

    #[test]
    fn test_generator_respects_probability() {
        let symbols = vec![Instrument::new("AAPL", 190.0)];
        let mut rng = StdRng::seed_from_u64(3);

        let never = SignalGenerator::new(0.0, symbols.clone(), "s");
        assert!((0..500).all(|_| never.maybe_generate(&mut rng).is_none()));

        let nan = SignalGenerator::new(f64::NAN, symbols.clone(), "s");
        assert_eq!(nan.probability(), 0.0);
        assert!(nan.maybe_generate(&mut rng).is_none());

        let always = SignalGenerator::new(1.0, symbols, "s");
        let proposal = always.maybe_generate(&mut rng).unwrap();
        assert_eq!(proposal.symbol, Symbol::new("AAPL"));
        assert!(proposal.price >= 180.5 - 1e-9 && proposal.price <= 199.5 + 1e-9);
    }
}
