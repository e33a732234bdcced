//! Scan notification bus.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late subscribers (a CLI progress
//! printer, a web socket) can catch up. Delivery is fire-and-forget.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{LibraryId, SeriesId};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    ScanStarted {
        library_id: LibraryId,
        library_name: String,
    },
    ScanProgress {
        library_name: String,
        series_name: String,
        percent: f32,
        phase: String,
    },
    SeriesAdded {
        series_id: SeriesId,
        name: String,
        library_id: LibraryId,
    },
    SeriesRemoved {
        series_id: SeriesId,
        name: String,
        library_id: LibraryId,
    },
    /// A scan- or series-level failure, surfaced to the user.
    ScanError {
        title: String,
        detail: String,
    },
    ScanComplete {
        library_id: LibraryId,
        library_name: String,
        series_processed: u64,
        series_removed: u64,
        failed: u64,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(name: &str) -> EventPayload {
        EventPayload::SeriesAdded {
            series_id: SeriesId::new(),
            name: name.into(),
            library_id: LibraryId::new(),
        }
    }

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.broadcast(added("Berserk"));

        let event = rx.try_recv().unwrap();
        match &event.payload {
            EventPayload::SeriesAdded { name, .. } => assert_eq!(name, "Berserk"),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        for i in 0..150 {
            bus.broadcast(added(&format!("Series {i}")));
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        for i in 0..5 {
            bus.broadcast(added(&format!("Series {i}")));
        }
        bus.broadcast(EventPayload::ScanError {
            title: "Library root missing".into(),
            detail: "/mnt/comics".into(),
        });

        let recent = bus.recent_events(3);
        assert_eq!(recent.len(), 3);
        assert!(matches!(recent[0].payload, EventPayload::ScanError { .. }));
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::ScanProgress {
            library_name: "Manga".into(),
            series_name: "Berserk".into(),
            percent: 50.0,
            phase: "reconciling".into(),
        });
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let json = serde_json::to_string(&EventPayload::ScanError {
            title: "t".into(),
            detail: "d".into(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"scan_error\""));
    }
}
