use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::SessionKey;
use crate::types::{StopRequest, StreamEnvelope};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    Stream(StreamEnvelope),
    StopRequested(StopRequest),
    SessionCompleted(SessionKey),
    WorkspaceSwitched(String),
    Shutdown,
    #[serde(other)]
    Unknown,
}

const STOP_CAPACITY: usize = 64;

/// Broadcast bus for host and coordinator events.
///
/// Stop requests are also mirrored onto a channel of their own, so a burst
/// of stream traffic cannot push them out of a slow subscriber's buffer.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    stops: broadcast::Sender<StopRequest>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (stops, _) = broadcast::channel(STOP_CAPACITY);
        Self { sender, stops }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Stop requests only.
    pub fn subscribe_stops(&self) -> broadcast::Receiver<StopRequest> {
        self.stops.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        if let Event::StopRequested(request) = &event {
            let _ = self.stops.send(request.clone());
        }
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
