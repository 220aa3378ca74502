//! Bounded event timeline.
//!
//! Newest events first, oldest dropped once the caller-chosen capacity is
//! reached.

use crate::core::events::{Event, EventType};
use std::collections::VecDeque;

/// Default number of events kept.
pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<Event>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
    }

    /// Push events in the order they were detected.
    pub fn push_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.push(event);
        }
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.entries.front()
    }

    /// Newest first.
    pub fn to_vec(&self) -> Vec<Event> {
        self.entries.iter().cloned().collect()
    }

    pub fn count_of(&self, event_type: EventType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
