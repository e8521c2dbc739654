//! Topic-based event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{ClaimEvent, EnergyEvent, RunEvent};
use crate::repository::HistoryRecord;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Run lifecycle and auto-play
    Run,
    /// Energy refreshes and timer activity
    Energy,
    /// Claim batches
    Claim,
    /// Appended history records
    History,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Run, Topic::Energy, Topic::Claim, Topic::History];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, Serialize)]
pub enum Event {
    Run(RunEvent),
    Energy(EnergyEvent),
    Claim(ClaimEvent),
    History(HistoryRecord),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Run(_) => Topic::Run,
            Event::Energy(_) => Topic::Energy,
            Event::Claim(_) => Topic::Claim,
            Event::History(_) => Topic::History,
        }
    }
}

/// Topic-based event bus
///
/// Channels are created once per topic, so publishing never blocks and
/// subscribing never fails.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<HashMap<Topic, broadcast::Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity.max(1)).0))
            .collect();

        Self {
            channels: Arc::new(channels),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: impl Into<Event>) {
        let event = event.into();
        let topic = event.topic();

        if let Some(tx) = self.channels.get(&topic)
            && tx.send(event).is_err()
        {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        // Every topic in Topic::ALL is inserted by the constructor.
        &self.channels[&topic]
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl From<RunEvent> for Event {
    fn from(event: RunEvent) -> Self {
        Event::Run(event)
    }
}

impl From<EnergyEvent> for Event {
    fn from(event: EnergyEvent) -> Self {
        Event::Energy(event)
    }
}

impl From<ClaimEvent> for Event {
    fn from(event: ClaimEvent) -> Self {
        Event::Claim(event)
    }
}

impl From<HistoryRecord> for Event {
    fn from(record: HistoryRecord) -> Self {
        Event::History(record)
    }
}
