//! Engine configuration and user-editable risk parameters

use crate::error::{EngineError, EngineResult};
use crate::types::Symbol;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Risk limits the user edits on the trading desk
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradingParameters {
    pub max_position_size: f64,
    pub daily_loss_limit: f64,
    pub max_trade_percentage: f64, // % of equity per trade
    pub max_open_positions: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub risk_per_trade: f64,
}

impl Default for TradingParameters {
    fn default() -> Self {
        Self {
            max_position_size: 10_000.0,
            daily_loss_limit: 1_000.0,
            max_trade_percentage: 2.0,
            max_open_positions: 5,
            stop_loss_pct: 5.0,
            take_profit_pct: 10.0,
            risk_per_trade: 1.0,
        }
    }
}

impl TradingParameters {
    pub fn validate(&self) -> EngineResult<()> {
        if !(self.max_position_size > 0.0) {
            return Err(EngineError::InvalidParameters(format!(
                "max_position_size must be positive, got {}",
                self.max_position_size
            )));
        }
        if !(self.daily_loss_limit > 0.0) {
            return Err(EngineError::InvalidParameters(format!(
                "daily_loss_limit must be positive, got {}",
                self.daily_loss_limit
            )));
        }
        if self.max_open_positions == 0 {
            return Err(EngineError::InvalidParameters(
                "max_open_positions must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("max_trade_percentage", self.max_trade_percentage),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("risk_per_trade", self.risk_per_trade),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(EngineError::InvalidParameters(format!(
                    "{} must be in (0, 100], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Tradable instrument with the price new trades are drawn around
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: Symbol,
    pub reference_price: f64,
}

impl Instrument {
    pub fn new(symbol: &str, reference_price: f64) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            reference_price,
        }
    }
}

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_equity: f64,
    /// Share of positive P&L taken as platform fee
    pub fee_rate: f64,
    pub tick_interval_ms: u64,
    pub new_trade_probability: f64,
    /// Half-width of the uniform per-tick price move
    pub price_volatility: f64,
    pub recent_trades_capacity: usize,
    pub strategy_name: String,
    pub symbols: Vec<Instrument>,
    pub admins: Vec<String>,
    pub parameters: TradingParameters,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 25_000.0,
            fee_rate: 0.1,
            tick_interval_ms: 2_000,
            new_trade_probability: 0.05,
            price_volatility: 0.01,
            recent_trades_capacity: 10,
            strategy_name: "momentum".to_string(),
            symbols: vec![
                Instrument::new("AAPL", 190.0),
                Instrument::new("MSFT", 410.0),
                Instrument::new("GOOGL", 150.0),
                Instrument::new("AMZN", 180.0),
                Instrument::new("TSLA", 240.0),
                Instrument::new("NVDA", 500.0),
            ],
            admins: Vec::new(),
            parameters: TradingParameters::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.parameters.validate()?;

        if !(self.initial_equity > 0.0) {
            return Err(EngineError::InvalidParameters(
                "initial_equity must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(EngineError::InvalidParameters(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.new_trade_probability) {
            return Err(EngineError::InvalidParameters(format!(
                "new_trade_probability must be in [0, 1], got {}",
                self.new_trade_probability
            )));
        }
        if !(0.0..1.0).contains(&self.price_volatility) {
            return Err(EngineError::InvalidParameters(format!(
                "price_volatility must be in [0, 1), got {}",
                self.price_volatility
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(EngineError::InvalidParameters(
                "tick_interval_ms must be non-zero".into(),
            ));
        }
        if self.recent_trades_capacity == 0 {
            return Err(EngineError::InvalidParameters(
                "recent_trades_capacity must be non-zero".into(),
            ));
        }
        if self.symbols.is_empty() {
            return Err(EngineError::InvalidParameters("symbol list is empty".into()));
        }
        for instrument in &self.symbols {
            if !instrument.symbol.validate() || !(instrument.reference_price > 0.0) {
                return Err(EngineError::InvalidParameters(format!(
                    "bad symbol entry {} @ {}",
                    instrument.symbol, instrument.reference_price
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut params = TradingParameters::default();
        params.stop_loss_pct = 0.0;
        assert!(matches!(params.validate(), Err(EngineError::InvalidParameters(_))));

        let mut params = TradingParameters::default();
        params.max_open_positions = 0;
        assert!(params.validate().is_err());

        let mut config = EngineConfig::default();
        config.symbols.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "initial_equity": 50000.0, "parameters": {{ "stop_loss_pct": 3.0 }} }}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.initial_equity, 50_000.0);
        assert_eq!(config.parameters.stop_loss_pct, 3.0);
        assert_eq!(config.parameters.take_profit_pct, 10.0);
        assert_eq!(config.tick_interval(), Duration::from_secs(2));
    }
}
