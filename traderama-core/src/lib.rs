//! Traderama Trading Core
//!
//! Simulated live trading engine for the Traderama desk: position ledger,
//! risk aggregation, engine control, persistence and event subscriptions,
//! plus the KEM credit ledger that rewards social activity.

pub mod access;
pub mod broker;
pub mod config;
pub mod credits;
pub mod error;
pub mod events;
pub mod paper_trading;
pub mod runtime;
pub mod store;
pub mod types;

// Re-export main types for easy access
pub use access::{AccessPolicy, Actor, Capability, Role};
pub use broker::{BrokerConnection, BrokerSettings, SimulatedBroker};
pub use config::{EngineConfig, Instrument, TradingParameters};
pub use credits::{AirdropClaim, CreditLedger, SocialAction};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{EngineEvent, EventBus, EventTopic, Subscription};
pub use paper_trading::{
    EngineMode, EngineSnapshot, EngineState, EngineStatus, RiskLevel, RiskMetrics, TradeProposal,
};
pub use runtime::TradingEngine;
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use types::{CloseReason, Side, Symbol, Trade, TradeStatus};

use std::sync::Arc;

/// Main interface for the trading desk: one engine plus the credit ledger
pub struct TradingDesk {
    engine: TradingEngine,
    credits: CreditLedger,
}

impl TradingDesk {
    /// Create a desk, restoring engine state from the store when present.
    /// The config is validated before anything is built.
    pub async fn open(
        config: EngineConfig,
        broker: Arc<dyn BrokerConnection>,
        store: Arc<dyn StateStore>,
    ) -> EngineResult<Self> {
        Ok(Self {
            engine: TradingEngine::restore(config, broker, store).await?,
            credits: CreditLedger::new(),
        })
    }

    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn credits(&self) -> &CreditLedger {
        &self.credits
    }

    /// Reward a user for a social action; returns their available credits
    pub fn record_social_action(&self, user: &str, action: SocialAction) -> u64 {
        self.credits.award(user, action)
    }

    pub fn claim_airdrop(&self, user: &str, wallet: &str) -> EngineResult<AirdropClaim> {
        self.credits.claim(user, wallet)
    }

    /// Stop background work and flush engine state
    pub async fn close(&self) -> EngineResult<()> {
        self.engine.shutdown().await
    }
}
