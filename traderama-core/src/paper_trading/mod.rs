//! Simulated live trading engine

pub mod engine;
pub mod ledger;
pub mod market_feed;
pub mod risk;
pub mod signals;

pub use engine::{EngineMode, EngineSnapshot, EngineState, EngineStatus, TickReport};
pub use ledger::{platform_fee, PositionLedger, RecentTrades, TradeStatistics};
pub use market_feed::{PriceModel, RandomWalk};
pub use risk::{RiskLevel, RiskMetrics};
pub use signals::{max_permissible_size, SignalGenerator, TradeProposal};
