//! Status events that arrived before their message.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use switchboard_webhook::StatusEvent;

struct PendingEntry {
    event: StatusEvent,
    inserted_at: Instant,
}

impl PendingEntry {
    fn matches(&self, ids: &[&str]) -> bool {
        ids.contains(&self.event.message_id.as_str())
            || self
                .event
                .correlation_id
                .as_deref()
                .is_some_and(|alt| ids.contains(&alt))
    }
}

/// Bounded, TTL-evicted buffer of unmatched status events, oldest first.
pub struct PendingStatuses {
    entries: VecDeque<PendingEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl PendingStatuses {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl,
            max_entries,
        }
    }

    /// Buffer an event. Returns the entry evicted to make room, if any.
    pub fn push(&mut self, event: StatusEvent) -> Option<StatusEvent> {
        self.evict_expired();
        if self.max_entries == 0 {
            return Some(event);
        }
        let evicted = if self.entries.len() >= self.max_entries {
            self.entries.pop_front().map(|e| e.event)
        } else {
            None
        };
        self.entries.push_back(PendingEntry {
            event,
            inserted_at: Instant::now(),
        });
        evicted
    }

    /// Remove and return every live event that refers to any of `ids`, in
    /// arrival order.
    pub fn take_matching(&mut self, ids: &[&str]) -> Vec<StatusEvent> {
        self.evict_expired();
        if self.entries.is_empty() {
            return Vec::new();
        }
        let (taken, kept): (VecDeque<_>, VecDeque<_>) =
            self.entries.drain(..).partition(|e| e.matches(ids));
        self.entries = kept;
        taken.into_iter().map(|e| e.event).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|e| e.inserted_at.elapsed() < ttl);
    }
}
