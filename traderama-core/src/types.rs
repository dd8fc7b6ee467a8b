//! Shared trading data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading symbol
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn validate(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn multiplier(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle status of a trade record
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
}

/// Why a trade left the active set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    /// Cleared by stop/emergency stop without exit accounting
    Liquidated,
}

/// Trade record held by the position ledger
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub size: u64,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl: f64,
    pub timestamp: DateTime<Utc>,
    pub status: TradeStatus,
    pub strategy: String,
    pub fee: f64,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    /// Trade that has been sized but not yet booked by the ledger
    pub fn pending(
        id: u64,
        symbol: Symbol,
        side: Side,
        size: u64,
        entry_price: f64,
        strategy: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            size,
            entry_price,
            current_price: entry_price,
            pnl: 0.0,
            timestamp,
            status: TradeStatus::Pending,
            strategy: strategy.into(),
            fee: 0.0,
            closed_at: None,
            close_reason: None,
        }
    }

    pub fn open(
        id: u64,
        symbol: Symbol,
        side: Side,
        size: u64,
        entry_price: f64,
        strategy: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status: TradeStatus::Open,
            ..Self::pending(id, symbol, side, size, entry_price, strategy, timestamp)
        }
    }

    /// Move the mark price and recompute P&L
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.pnl = (price - self.entry_price) * self.size as f64 * self.side.multiplier();
    }

    /// P&L as a percentage of entry notional, signed by side
    pub fn pnl_percent(&self) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (self.current_price - self.entry_price) / self.entry_price * 100.0 * self.side.multiplier()
    }

    pub fn notional(&self) -> f64 {
        self.current_price * self.size as f64
    }

    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_recomputes_pnl_by_side() {
        let now = Utc::now();
        let mut long = Trade::open(1, Symbol::new("AAPL"), Side::Buy, 10, 100.0, "demo", now);
        long.mark(105.0);
        assert_eq!(long.pnl, 50.0);
        assert!((long.pnl_percent() - 5.0).abs() < 1e-9);

        let mut short = Trade::open(2, Symbol::new("AAPL"), Side::Sell, 10, 100.0, "demo", now);
        short.mark(105.0);
        assert_eq!(short.pnl, -50.0);
        assert!((short.pnl_percent() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_symbol_validation() {
        assert!(Symbol::new("BRK.B").validate());
        assert!(!Symbol::new("").validate());
        assert!(!Symbol::new("AA PL").validate());
    }
}
