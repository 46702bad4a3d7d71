//! Per-room event ring for polling clients

use crate::store::RoomRecord;
use crate::types::*;

/// Events retained per room
pub const EVENT_LOG_CAPACITY: usize = 50;

/// Events returned by a plain room state query
pub const EVENT_SNAPSHOT_LEN: usize = 10;

impl RoomRecord {
    /// Append an event, dropping the oldest beyond capacity
    pub fn push_event(&mut self, kind: EventKind) -> EventId {
        let id = self.next_event_id;
        self.next_event_id += 1;

        tracing::debug!(room = %self.room.code, id, event = kind.type_name(), "Event");
        self.events.push_back(Event {
            id,
            kind,
            created_at: chrono::Utc::now(),
        });
        while self.events.len() > EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
        id
    }

    /// Events for a poller, oldest first.
    ///
    /// Without a high-water mark this is the latest snapshot; with one it is
    /// every retained event newer than the mark.
    pub fn events_since(&self, after: Option<EventId>) -> Vec<Event> {
        match after {
            Some(after) => self
                .events
                .iter()
                .filter(|e| e.id > after)
                .cloned()
                .collect(),
            None => {
                let skip = self.events.len().saturating_sub(EVENT_SNAPSHOT_LEN);
                self.events.iter().skip(skip).cloned().collect()
            }
        }
    }
}
