//! Async driver for the engine
//!
//! Owns the engine state behind a lock, runs the periodic tick task while the
//! engine is running, publishes events, and writes a snapshot to the state
//! store after every mutation.

use crate::access::{AccessPolicy, Actor, Capability};
use crate::broker::BrokerConnection;
use crate::config::{EngineConfig, TradingParameters};
use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::paper_trading::{
    EngineMode, EngineSnapshot, EngineState, EngineStatus, RiskMetrics, TickReport, TradeProposal,
};
use crate::store::StateStore;
use crate::types::Trade;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

struct EngineCore {
    state: RwLock<EngineState>,
    broker: Arc<dyn BrokerConnection>,
    store: Arc<dyn StateStore>,
    events: EventBus,
    /// Serializes snapshot + save so writes land in mutation order
    persist_lock: AsyncMutex<()>,
}

impl EngineCore {
    fn publish(&self, events: &[EngineEvent]) {
        for event in events {
            self.events.publish(event);
        }
    }

    async fn persist(&self) -> EngineResult<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state.read().snapshot(Utc::now());
        self.store.save(&snapshot).await
    }

    async fn tick(&self) -> TickReport {
        let connected = self.broker.is_connected();
        let report = self.state.write().tick(Utc::now(), connected);

        if report.executed {
            debug!(events = report.events.len(), "Tick");
            self.publish(&report.events);
            if let Err(e) = self.persist().await {
                error!("Failed to persist engine state: {}", e);
            }
        }
        report
    }
}

struct Ticker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Shared, persistent trading engine
pub struct TradingEngine {
    core: Arc<EngineCore>,
    policy: AccessPolicy,
    tick_interval: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        broker: Arc<dyn BrokerConnection>,
        store: Arc<dyn StateStore>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::from_state(EngineState::new(config), broker, store))
    }

    /// Build an engine from the store's last snapshot, or fresh if it has none
    pub async fn restore(
        config: EngineConfig,
        broker: Arc<dyn BrokerConnection>,
        store: Arc<dyn StateStore>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let state = match store.load().await? {
            Some(snapshot) => {
                info!(saved_at = %snapshot.saved_at, mode = %snapshot.mode, "Restoring engine state");
                EngineState::restore(config, snapshot)
            }
            None => EngineState::new(config),
        };
        Ok(Self::from_state(state, broker, store))
    }

    pub fn from_state(
        state: EngineState,
        broker: Arc<dyn BrokerConnection>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let policy = AccessPolicy::new(&state.config().admins);
        let tick_interval = state.config().tick_interval();
        Self {
            core: Arc::new(EngineCore {
                state: RwLock::new(state),
                broker,
                store,
                events: EventBus::new(),
                persist_lock: AsyncMutex::new(()),
            }),
            policy,
            tick_interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.core.events
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn mode(&self) -> EngineMode {
        self.core.state.read().mode()
    }

    pub fn status(&self) -> EngineStatus {
        self.core.state.read().status().clone()
    }

    pub fn risk(&self) -> RiskMetrics {
        self.core.state.read().risk().clone()
    }

    pub fn parameters(&self) -> TradingParameters {
        self.core.state.read().parameters().clone()
    }

    pub fn active_trades(&self) -> Vec<Trade> {
        self.core.state.read().active_trades().to_vec()
    }

    pub fn recent_trades(&self) -> Vec<Trade> {
        self.core.state.read().ledger().recent().iter().cloned().collect()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.core.state.read().snapshot(Utc::now())
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.lock().is_some()
    }

    async fn commit(&self, events: Vec<EngineEvent>) -> EngineResult<()> {
        self.core.publish(&events);
        self.core.persist().await
    }

    /// Start or resume trading and schedule the tick task
    pub async fn start(&self, actor: &Actor) -> EngineResult<()> {
        self.policy.require(actor, Capability::ControlEngine)?;
        let connected = self.core.broker.is_connected();
        let events = {
            // Slot before state, same order as `halt`
            let mut slot = self.ticker.lock();
            let events = self.core.state.write().start(connected)?;
            if slot.is_none() {
                *slot = Some(self.spawn_ticker());
            }
            events
        };
        info!(user = %actor.id, broker = self.core.broker.name(), "Engine started");
        self.commit(events).await
    }

    /// Pause trading; open positions are kept
    pub async fn pause(&self, actor: &Actor) -> EngineResult<()> {
        self.policy.require(actor, Capability::ControlEngine)?;
        let events = self.halt(|state| state.pause()).await;
        self.commit(events).await
    }

    /// Stop trading and clear every open position
    pub async fn stop(&self, actor: &Actor) -> EngineResult<()> {
        self.policy.require(actor, Capability::ControlEngine)?;
        let events = self.halt(|state| state.stop(Utc::now())).await;
        info!(user = %actor.id, "Engine stopped");
        self.commit(events).await
    }

    pub async fn emergency_stop(&self, actor: &Actor) -> EngineResult<()> {
        self.policy.require(actor, Capability::ControlEngine)?;
        let events = self.halt(|state| state.emergency_stop(Utc::now())).await;
        self.commit(events).await
    }

    /// Leave the running state and retire the tick task.
    ///
    /// The ticker leaves its slot under the same lock as the state change.
    async fn halt<F>(&self, transition: F) -> Vec<EngineEvent>
    where
        F: FnOnce(&mut EngineState) -> Vec<EngineEvent>,
    {
        let (ticker, events) = {
            let mut slot = self.ticker.lock();
            let events = transition(&mut *self.core.state.write());
            (slot.take(), events)
        };
        Self::join_ticker(ticker).await;
        events
    }

    pub async fn update_parameters(&self, actor: &Actor, params: TradingParameters) -> EngineResult<()> {
        self.policy.require(actor, Capability::ManageRisk)?;
        let events = self.core.state.write().update_parameters(params, &actor.id)?;
        self.commit(events).await
    }

    /// Open a trade from an external signal source
    pub async fn submit_signal(&self, actor: &Actor, proposal: TradeProposal) -> EngineResult<()> {
        self.policy.require(actor, Capability::ControlEngine)?;
        let events = self.core.state.write().submit(proposal, Utc::now())?;
        self.commit(events).await
    }

    /// Run one tick immediately, outside the schedule
    pub async fn tick_now(&self) -> TickReport {
        self.core.tick().await
    }

    fn spawn_ticker(&self) -> Ticker {
        let (tx, mut rx) = watch::channel(false);
        let core = self.core.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        core.tick().await;
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Tick task exited");
        });

        Ticker { shutdown: tx, handle }
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().take();
        Self::join_ticker(ticker).await;
    }

    async fn join_ticker(ticker: Option<Ticker>) {
        if let Some(ticker) = ticker {
            let _ = ticker.shutdown.send(true);
            if let Err(e) = ticker.handle.await {
                error!("Tick task failed: {}", e);
            }
        }
    }

    /// Stop the tick task and flush state, leaving the engine mode as is
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.cancel_ticker().await;
        self.core.persist().await
    }
}
