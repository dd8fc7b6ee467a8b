//! Engine event subscriptions
//!
//! Every consumer subscribes the same way: a topic, an optional filter and a
//! callback. The returned [`Subscription`] unsubscribes when dropped.

use crate::paper_trading::engine::EngineMode;
use crate::paper_trading::risk::RiskLevel;
use crate::types::Trade;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Something that happened inside the engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    TradeOpened { trade: Trade },
    TradeClosed { trade: Trade },
    StateChanged { from: EngineMode, to: EngineMode },
    RiskLevelChanged { from: RiskLevel, to: RiskLevel, score: f64 },
    EmergencyStop { liquidated: usize },
    DailyReset { date: NaiveDate, previous_daily_pnl: f64 },
    ParametersUpdated { by: String },
}

/// Event stream a subscriber listens to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    Trades,
    Engine,
    Risk,
    All,
}

impl EngineEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            EngineEvent::TradeOpened { .. } | EngineEvent::TradeClosed { .. } => EventTopic::Trades,
            EngineEvent::RiskLevelChanged { .. } => EventTopic::Risk,
            EngineEvent::StateChanged { .. }
            | EngineEvent::EmergencyStop { .. }
            | EngineEvent::DailyReset { .. }
            | EngineEvent::ParametersUpdated { .. } => EventTopic::Engine,
        }
    }
}

type Callback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;
type Filter = Arc<dyn Fn(&EngineEvent) -> bool + Send + Sync>;

struct Subscriber {
    topic: EventTopic,
    filter: Option<Filter>,
    callback: Callback,
}

impl Subscriber {
    fn matches(&self, event: &EngineEvent) -> bool {
        (self.topic == EventTopic::All || self.topic == event.topic())
            && self.filter.as_ref().map_or(true, |f| f(event))
    }
}

/// Publish/subscribe hub for engine events
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<DashMap<u64, Subscriber>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for events on `topic` that pass `filter`
    pub fn subscribe<F, C>(&self, topic: EventTopic, filter: Option<F>, callback: C) -> Subscription
    where
        F: Fn(&EngineEvent) -> bool + Send + Sync + 'static,
        C: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                topic,
                filter: filter.map(|f| Arc::new(f) as Filter),
                callback: Arc::new(callback),
            },
        );
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Subscribe to every event on a topic
    pub fn subscribe_all<C>(&self, topic: EventTopic, callback: C) -> Subscription
    where
        C: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribe(topic, None::<fn(&EngineEvent) -> bool>, callback)
    }

    pub fn publish(&self, event: &EngineEvent) {
        // Collect first so callbacks may subscribe or unsubscribe.
        let targets: Vec<Callback> = self
            .subscribers
            .iter()
            .filter(|entry| entry.value().matches(event))
            .map(|entry| entry.value().callback.clone())
            .collect();

        for callback in targets {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Handle for a live subscription; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<DashMap<u64, Subscriber>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn state_change() -> EngineEvent {
        EngineEvent::StateChanged {
            from: EngineMode::Stopped,
            to: EngineMode::Running,
        }
    }

    #[test]
    fn test_topic_routing() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _engine = bus.subscribe_all(EventTopic::Engine, move |e| sink.lock().push(e.clone()));
        let sink = seen.clone();
        let _risk = bus.subscribe_all(EventTopic::Risk, move |e| sink.lock().push(e.clone()));

        bus.publish(&state_change());
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0], state_change());
    }

    #[test]
    fn test_filter_applies() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let _sub = bus.subscribe(
            EventTopic::All,
            Some(|e: &EngineEvent| matches!(e, EngineEvent::EmergencyStop { .. })),
            move |_| {
                c.fetch_add(1, Ordering::Relaxed);
            },
        );

        bus.publish(&state_change());
        bus.publish(&EngineEvent::EmergencyStop { liquidated: 2 });
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let sub = bus.subscribe_all(EventTopic::All, move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(&state_change());
        sub.unsubscribe();
        bus.publish(&state_change());

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
