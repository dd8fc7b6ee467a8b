//! Broker connectivity

use crate::error::EngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Stored credential record describing a brokerage link
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BrokerSettings {
    pub broker: String,
    pub account_id: String,
    pub demo: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            broker: "paper".to_string(),
            account_id: "demo-account".to_string(),
            demo: true,
        }
    }
}

/// Link to a brokerage. The engine only trades while it reports connected.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn connect(&self) -> EngineResult<()>;
    async fn disconnect(&self) -> EngineResult<()>;
    fn is_connected(&self) -> bool;
    fn name(&self) -> &str;
}

/// In-process broker whose connectivity flag is set by hand
pub struct SimulatedBroker {
    settings: BrokerSettings,
    connected: AtomicBool,
}

impl SimulatedBroker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            connected: AtomicBool::new(false),
        }
    }

    /// Already-connected broker with default settings
    pub fn connected() -> Self {
        let broker = Self::new(BrokerSettings::default());
        broker.set_connected(true);
        broker
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }
}

#[async_trait]
impl BrokerConnection for SimulatedBroker {
    async fn connect(&self) -> EngineResult<()> {
        self.set_connected(true);
        info!(broker = %self.settings.broker, account = %self.settings.account_id, "Broker connected");
        Ok(())
    }

    async fn disconnect(&self) -> EngineResult<()> {
        self.set_connected(false);
        info!(broker = %self.settings.broker, "Broker disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.settings.broker
    }
}
