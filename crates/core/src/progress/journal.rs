//! # Event Journal
//!
//! Append-only log of progress events for one session run. Written under
//! the session lock, read by subscribers through their own cursor.

use std::collections::HashSet;

use super::{DedupKey, ProgressEvent};

#[derive(Debug, Default)]
pub struct EventJournal {
    entries: Vec<ProgressEvent>,
    seen: HashSet<DedupKey>,
    closed: bool,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns false when it was a duplicate triple or the
    /// journal already holds its final event.
    pub fn record(&mut self, event: ProgressEvent) -> bool {
        if self.closed {
            return false;
        }
        if event.is_final() {
            self.closed = true;
        } else if let Some(key) = event.dedup_key() {
            if !self.seen.insert(key) {
                return false;
            }
        }
        self.entries.push(event);
        true
    }

    /// Events at or after `cursor`
    pub fn since(&self, cursor: usize) -> Vec<ProgressEvent> {
        self.entries.get(cursor..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

#[cfg(test)]
impl EventJournal {
    fn is_closed(&self) -> bool {
        self.closed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
