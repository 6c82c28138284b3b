pub mod parse;
pub mod reader;

use std::sync::Arc;

use crate::export::health::HealthMetrics;
use crate::stats::{ErrorStats, Recorded};

pub use self::parse::{parse_line, LogEvent, LogLevel, ParseError};
pub use self::reader::{LineReader, ReadSummary};

/// Receives every parsed log event.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &LogEvent);
}

/// Ordered list of subscribers. Events are delivered in registration order.
#[derive(Default, Clone)]
pub struct SubscriberChain {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl SubscriberChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber to the end of the chain.
    pub fn push(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver one event to every subscriber.
    pub fn dispatch(&self, event: &LogEvent) {
        for subscriber in &self.subscribers {
            subscriber.on_event(event);
        }
    }
}

impl EventSubscriber for SubscriberChain {
    fn on_event(&self, event: &LogEvent) {
        self.dispatch(event);
    }
}

/// Counts warning-or-worse events and slow-statement lines.
pub struct StatsSubscriber {
    stats: Arc<ErrorStats>,
    slow_marker: String,
    health: Option<Arc<HealthMetrics>>,
}

impl StatsSubscriber {
    /// Messages containing `slow_marker` count as slow-statement lines.
    pub fn new(
        stats: Arc<ErrorStats>,
        slow_marker: impl Into<String>,
        health: Option<Arc<HealthMetrics>>,
    ) -> Self {
        Self {
            stats,
            slow_marker: slow_marker.into(),
            health,
        }
    }

    fn is_slow(&self, event: &LogEvent) -> bool {
        !self.slow_marker.is_empty() && event.message.contains(self.slow_marker.as_str())
    }
}

impl EventSubscriber for StatsSubscriber {
    fn on_event(&self, event: &LogEvent) {
        if let Some(ref h) = self.health {
            h.events_received
                .with_label_values(&[event.level.as_str()])
                .inc();
        }

        if self.is_slow(event) {
            self.stats.record_slow_event();
            if let Some(ref h) = self.health {
                h.slow_events.inc();
            }
        }

        let Some(t) = event.level.message_type() else {
            return;
        };

        if self.stats.record(t, event.code()) == Recorded::Fallback {
            if let Some(ref h) = self.health {
                h.unknown_codes.inc();
            }
        }
    }
}
