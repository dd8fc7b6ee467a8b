//! Position ledger for the simulated engine

use crate::types::{CloseReason, Trade, TradeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded history of the most recently closed trades, newest first.
///
/// Display only. Statistics are kept in [`TradeStatistics`] so that
/// truncating this buffer never skews the win rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecentTrades {
    capacity: usize,
    trades: VecDeque<Trade>,
}

impl RecentTrades {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            trades: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, trade: Trade) {
        self.trades.push_front(trade);
        self.trades.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Running statistics over every trade closed by stop-loss or take-profit
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TradeStatistics {
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_fees: f64,
}

impl TradeStatistics {
    pub fn record(&mut self, net_pnl: f64, fee: f64) {
        self.closed_trades += 1;
        self.total_fees += fee;
        if net_pnl > 0.0 {
            self.winning_trades += 1;
            self.gross_profit += net_pnl;
        } else if net_pnl < 0.0 {
            self.losing_trades += 1;
            self.gross_loss += net_pnl.abs();
        }
    }

    /// Percentage of closed trades with positive net P&L
    pub fn win_rate(&self) -> f64 {
        if self.closed_trades == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / self.closed_trades as f64 * 100.0
    }

    pub fn avg_win(&self) -> f64 {
        if self.winning_trades == 0 {
            0.0
        } else {
            self.gross_profit / self.winning_trades as f64
        }
    }

    pub fn avg_loss(&self) -> f64 {
        if self.losing_trades == 0 {
            0.0
        } else {
            self.gross_loss / self.losing_trades as f64
        }
    }

    pub fn profit_factor(&self) -> f64 {
        if self.gross_loss > 0.0 {
            self.gross_profit / self.gross_loss
        } else {
            0.0
        }
    }
}

/// Open trades plus closed-trade history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PositionLedger {
    active: Vec<Trade>,
    recent: RecentTrades,
    statistics: TradeStatistics,
    next_id: u64,
}

impl PositionLedger {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            active: Vec::new(),
            recent: RecentTrades::new(recent_capacity),
            statistics: TradeStatistics::default(),
            next_id: 1,
        }
    }

    /// Allocate the next trade id
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Book a trade as open and return the booked record
    pub fn open(&mut self, mut trade: Trade) -> Trade {
        trade.status = TradeStatus::Open;
        self.active.push(trade.clone());
        trade
    }

    pub fn active(&self) -> &[Trade] {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut [Trade] {
        &mut self.active
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }

    pub fn recent(&self) -> &RecentTrades {
        &self.recent
    }

    pub fn statistics(&self) -> &TradeStatistics {
        &self.statistics
    }

    /// Ids of active trades whose P&L crossed a stop-loss or take-profit threshold
    pub fn triggered(&self, stop_loss_pct: f64, take_profit_pct: f64) -> Vec<(u64, CloseReason)> {
        self.active
            .iter()
            .filter_map(|t| {
                let pct = t.pnl_percent();
                if pct <= -stop_loss_pct {
                    Some((t.id, CloseReason::StopLoss))
                } else if pct >= take_profit_pct {
                    Some((t.id, CloseReason::TakeProfit))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Close an active trade, charging the platform fee on positive P&L only
    pub fn close(
        &mut self,
        id: u64,
        reason: CloseReason,
        fee_rate: f64,
        now: DateTime<Utc>,
    ) -> Option<Trade> {
        let idx = self.active.iter().position(|t| t.id == id)?;
        let mut trade = self.active.remove(idx);

        trade.fee = platform_fee(trade.pnl, fee_rate);
        trade.status = TradeStatus::Closed;
        trade.closed_at = Some(now);
        trade.close_reason = Some(reason);

        self.statistics.record(trade.net_pnl(), trade.fee);
        self.recent.push(trade.clone());

        Some(trade)
    }

    /// Drop every active trade without exit accounting
    pub fn liquidate_all(&mut self, now: DateTime<Utc>) -> Vec<Trade> {
        let mut cleared: Vec<Trade> = self.active.drain(..).collect();
        for trade in cleared.iter_mut() {
            trade.status = TradeStatus::Closed;
            trade.closed_at = Some(now);
            trade.close_reason = Some(CloseReason::Liquidated);
            self.recent.push(trade.clone());
        }
        cleared
    }
}

/// Fee skimmed from a closed trade
pub fn platform_fee(pnl: f64, fee_rate: f64) -> f64 {
    if pnl > 0.0 {
        pnl * fee_rate
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, Symbol};

    fn open_trade(ledger: &mut PositionLedger, entry: f64, size: u64) -> u64 {
        let id = ledger.next_id();
        ledger.open(Trade::open(id, Symbol::new("AAPL"), Side::Buy, size, entry, "test", Utc::now()));
        id
    }

    #[test]
    fn test_fee_only_on_profit() {
        assert_eq!(platform_fee(100.0, 0.1), 10.0);
        assert_eq!(platform_fee(0.0, 0.1), 0.0);
        assert_eq!(platform_fee(-50.0, 0.1), 0.0);
    }

    #[test]
    fn test_close_moves_trade_to_recent() {
        let mut ledger = PositionLedger::new(10);
        let id = open_trade(&mut ledger, 100.0, 10);
        ledger.active_mut()[0].mark(112.0);

        let triggered = ledger.triggered(5.0, 10.0);
        assert_eq!(triggered, vec![(id, CloseReason::TakeProfit)]);

        let closed = ledger.close(id, CloseReason::TakeProfit, 0.1, Utc::now()).unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert!((closed.fee - 12.0).abs() < 1e-9);
        assert!((closed.net_pnl() - 108.0).abs() < 1e-9);
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.recent().len(), 1);
        assert_eq!(ledger.statistics().winning_trades, 1);
    }

    #[test]
    fn test_win_rate_survives_recent_truncation() {
        let mut ledger = PositionLedger::new(3);
        for i in 0..12 {
            let id = open_trade(&mut ledger, 100.0, 1);
            let exit = if i < 9 { 90.0 } else { 120.0 };
            ledger.active_mut()[0].mark(exit);
            ledger.close(id, CloseReason::StopLoss, 0.1, Utc::now());
        }

        assert_eq!(ledger.recent().len(), 3);
        assert!(ledger.recent().iter().all(|t| t.pnl > 0.0));
        assert_eq!(ledger.statistics().closed_trades, 12);
        assert!((ledger.statistics().win_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_liquidation_skips_statistics() {
        let mut ledger = PositionLedger::new(10);
        open_trade(&mut ledger, 100.0, 5);
        open_trade(&mut ledger, 50.0, 5);

        let cleared = ledger.liquidate_all(Utc::now());
        assert_eq!(cleared.len(), 2);
        assert!(cleared.iter().all(|t| t.close_reason == Some(CloseReason::Liquidated)));
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.statistics().closed_trades, 0);
    }

    #[test]
    fn test_open_books_pending_trade() {
        let mut ledger = PositionLedger::new(10);
        let id = ledger.next_id();
        let pending = Trade::pending(id, Symbol::new("NVDA"), Side::Sell, 2, 500.0, "test", Utc::now());
        assert_eq!(pending.status, TradeStatus::Pending);

        let booked = ledger.open(pending);
        assert_eq!(booked.status, TradeStatus::Open);
        assert_eq!(ledger.active()[0].status, TradeStatus::Open);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut ledger = PositionLedger::new(10);
        let a = ledger.next_id();
        let b = ledger.next_id();
        assert!(b > a);
    }
}
