//! Simulated trading engine state machine

use super::{
    ledger::{PositionLedger, TradeStatistics},
    market_feed::{self, PriceModel, RandomWalk},
    risk::{self, RiskMetrics},
    signals::{self, SignalGenerator, TradeProposal},
};
use crate::config::{EngineConfig, TradingParameters};
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::types::Trade;
use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Controller state
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EngineMode {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMode::Stopped => write!(f, "stopped"),
            EngineMode::Running => write!(f, "running"),
            EngineMode::Paused => write!(f, "paused"),
        }
    }
}

/// Accumulated account figures
#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineStatus {
    pub is_running: bool,
    pub total_pnl: f64,
    pub daily_pnl: f64,
    pub total_trades: u64,
    pub win_rate: f64,
    /// Percent below peak equity
    pub drawdown: f64,
    pub fees: f64,
    pub account_equity: f64,
    pub peak_equity: f64,
}

impl EngineStatus {
    fn new(initial_equity: f64) -> Self {
        Self {
            account_equity: initial_equity,
            peak_equity: initial_equity,
            ..Default::default()
        }
    }

    fn apply_close(&mut self, net_pnl: f64, fee: f64, stats: &TradeStatistics) {
        self.account_equity += net_pnl;
        self.total_pnl += net_pnl;
        self.daily_pnl += net_pnl;
        self.fees += fee;
        self.total_trades = stats.closed_trades;
        self.win_rate = stats.win_rate();

        if self.account_equity > self.peak_equity {
            self.peak_equity = self.account_equity;
        }
        self.drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - self.account_equity) / self.peak_equity * 100.0
        } else {
            0.0
        };
    }
}

/// Serializable view of the engine, written to the state store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub saved_at: DateTime<Utc>,
    pub mode: EngineMode,
    pub parameters: TradingParameters,
    pub status: EngineStatus,
    pub ledger: PositionLedger,
    pub risk: RiskMetrics,
    pub last_tick_date: Option<NaiveDate>,
}

/// Outcome of one tick
#[derive(Default, Debug)]
pub struct TickReport {
    /// False when the tick was skipped entirely
    pub executed: bool,
    pub events: Vec<EngineEvent>,
}

/// Owned engine state. All mutation goes through `&mut self`.
pub struct EngineState {
    config: EngineConfig,
    mode: EngineMode,
    status: EngineStatus,
    ledger: PositionLedger,
    risk: RiskMetrics,
    last_tick_date: Option<NaiveDate>,
    generator: SignalGenerator,
    price_model: Box<dyn PriceModel>,
    rng: StdRng,
}

impl EngineState {
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let generator = SignalGenerator::new(
            config.new_trade_probability,
            config.symbols.clone(),
            config.strategy_name.clone(),
        );

        Self {
            mode: EngineMode::Stopped,
            status: EngineStatus::new(config.initial_equity),
            ledger: PositionLedger::new(config.recent_trades_capacity),
            risk: RiskMetrics::default(),
            last_tick_date: None,
            generator,
            price_model: Box::new(RandomWalk::new(config.price_volatility)),
            rng,
            config,
        }
    }

    /// Rebuild from a stored snapshot.
    ///
    /// A snapshot taken while running comes back paused; resuming needs an
    /// explicit `start` against a live broker.
    pub fn restore(config: EngineConfig, snapshot: EngineSnapshot) -> Self {
        let mut state = Self::new(config);
        state.config.parameters = snapshot.parameters;
        state.mode = match snapshot.mode {
            EngineMode::Running => EngineMode::Paused,
            other => other,
        };
        state.status = snapshot.status;
        state.status.is_running = false;
        state.ledger = snapshot.ledger;
        state.risk = snapshot.risk;
        state.last_tick_date = snapshot.last_tick_date;
        state
    }

    pub fn with_price_model(mut self, model: Box<dyn PriceModel>) -> Self {
        self.price_model = model;
        self
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn risk(&self) -> &RiskMetrics {
        &self.risk
    }

    pub fn parameters(&self) -> &TradingParameters {
        &self.config.parameters
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_trades(&self) -> &[Trade] {
        self.ledger.active()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            saved_at: now,
            mode: self.mode,
            parameters: self.config.parameters.clone(),
            status: self.status.clone(),
            ledger: self.ledger.clone(),
            risk: self.risk.clone(),
            last_tick_date: self.last_tick_date,
        }
    }

    fn transition(&mut self, to: EngineMode) -> Option<EngineEvent> {
        let from = self.mode;
        if from == to {
            return None;
        }
        self.mode = to;
        self.status.is_running = to == EngineMode::Running;
        info!("Engine {} -> {}", from, to);
        Some(EngineEvent::StateChanged { from, to })
    }

    /// Begin (or resume) trading. Requires a connected broker.
    pub fn start(&mut self, connected: bool) -> EngineResult<Vec<EngineEvent>> {
        if !connected {
            warn!("Start rejected: broker not connected");
            return Err(EngineError::NotConnected);
        }
        Ok(self.transition(EngineMode::Running).into_iter().collect())
    }

    /// Halt ticking but keep open positions
    pub fn pause(&mut self) -> Vec<EngineEvent> {
        if self.mode != EngineMode::Running {
            return Vec::new();
        }
        self.transition(EngineMode::Paused).into_iter().collect()
    }

    /// Halt and clear every active position without exit accounting
    pub fn stop(&mut self, now: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut events: Vec<EngineEvent> = self
            .ledger
            .liquidate_all(now)
            .into_iter()
            .map(|trade| EngineEvent::TradeClosed { trade })
            .collect();
        events.extend(self.transition(EngineMode::Stopped));
        events.extend(self.refresh_risk());
        events
    }

    /// Stop immediately and raise an alert
    pub fn emergency_stop(&mut self, now: DateTime<Utc>) -> Vec<EngineEvent> {
        let liquidated = self.ledger.open_count();
        warn!(liquidated, "EMERGENCY STOP triggered");
        let mut events = self.stop(now);
        events.push(EngineEvent::EmergencyStop { liquidated });
        events
    }

    /// Replace the risk parameters; takes effect on the next tick
    pub fn update_parameters(&mut self, params: TradingParameters, by: &str) -> EngineResult<Vec<EngineEvent>> {
        params.validate()?;
        info!(by, "Trading parameters updated");
        self.config.parameters = params;

        let mut events = vec![EngineEvent::ParametersUpdated { by: by.to_string() }];
        events.extend(self.refresh_risk());
        Ok(events)
    }

    /// Open a trade from an external signal
    pub fn submit(&mut self, proposal: TradeProposal, now: DateTime<Utc>) -> EngineResult<Vec<EngineEvent>> {
        if self.mode != EngineMode::Running {
            return Err(EngineError::InvalidTransition {
                from: self.mode.to_string(),
                action: "submit a trade".into(),
            });
        }
        let mut events = self.try_open(proposal, now)?;
        events.extend(self.refresh_risk());
        Ok(events)
    }

    fn try_open(&mut self, proposal: TradeProposal, now: DateTime<Utc>) -> EngineResult<Vec<EngineEvent>> {
        let params = &self.config.parameters;
        if self.ledger.open_count() >= params.max_open_positions {
            return Err(EngineError::TradeRejected(format!(
                "max open positions reached: {}/{}",
                self.ledger.open_count(),
                params.max_open_positions
            )));
        }
        let size = signals::resolve_size(&proposal, params, self.status.account_equity).ok_or_else(|| {
            EngineError::TradeRejected(format!(
                "no permissible size for {} @ {:.2}",
                proposal.symbol, proposal.price
            ))
        })?;

        let id = self.ledger.next_id();
        let pending = Trade::pending(
            id,
            proposal.symbol,
            proposal.side,
            size,
            proposal.price,
            proposal.strategy,
            now,
        );
        let trade = self.ledger.open(pending);
        debug!(id, symbol = %trade.symbol, side = %trade.side, size, price = trade.entry_price, "Trade opened");
        Ok(vec![EngineEvent::TradeOpened { trade }])
    }

    fn refresh_risk(&mut self) -> Option<EngineEvent> {
        let previous = self.risk.risk_level;
        self.risk = risk::aggregate(self.ledger.active(), self.status.daily_pnl, &self.config.parameters);
        (self.risk.risk_level != previous).then(|| EngineEvent::RiskLevelChanged {
            from: previous,
            to: self.risk.risk_level,
            score: self.risk.risk_score,
        })
    }

    fn roll_day(&mut self, today: NaiveDate) -> Option<EngineEvent> {
        let previous = self.last_tick_date.replace(today)?;
        if previous == today {
            return None;
        }
        let previous_daily_pnl = std::mem::take(&mut self.status.daily_pnl);
        info!(%today, previous_daily_pnl, "Daily P&L reset");
        Some(EngineEvent::DailyReset {
            date: today,
            previous_daily_pnl,
        })
    }

    /// Advance the simulation one step
    pub fn tick(&mut self, now: DateTime<Utc>, connected: bool) -> TickReport {
        if self.mode != EngineMode::Running || !connected {
            return TickReport::default();
        }

        let mut events = Vec::new();
        events.extend(self.roll_day(now.date_naive()));

        market_feed::apply(&*self.price_model, self.ledger.active_mut(), &mut self.rng);

        let (stop_loss, take_profit) = (self.config.parameters.stop_loss_pct, self.config.parameters.take_profit_pct);
        for (id, reason) in self.ledger.triggered(stop_loss, take_profit) {
            if let Some(trade) = self.ledger.close(id, reason, self.config.fee_rate, now) {
                self.status.apply_close(trade.net_pnl(), trade.fee, self.ledger.statistics());
                debug!(id, ?reason, net_pnl = trade.net_pnl(), fee = trade.fee, "Trade closed");
                events.push(EngineEvent::TradeClosed { trade });
            }
        }

        if self.ledger.open_count() < self.config.parameters.max_open_positions {
            if let Some(proposal) = self.generator.maybe_generate(&mut self.rng) {
                match self.try_open(proposal, now) {
                    Ok(opened) => events.extend(opened),
                    Err(e) => debug!("Generated trade skipped: {}", e),
                }
            }
        }

        events.extend(self.refresh_risk());

        TickReport {
            executed: true,
            events,
        }
    }
}
