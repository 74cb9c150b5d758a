//! Per-identity record of recent event timestamps.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Ordered timestamp sequences keyed by caller identity.
///
/// Insertion order is chronological order, so expired entries are always
/// at the front. The store itself is not synchronized; the owning limiter
/// wraps it in a mutex so that prune-compare-append runs as a single
/// critical section.
#[derive(Debug, Default)]
pub struct WindowStore {
    events: HashMap<String, VecDeque<Instant>>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp for `identity` that has aged out of `window`,
    /// returning the number of surviving entries.
    pub fn prune(&mut self, identity: &str, now: Instant, window: Duration) -> usize {
        match self.events.get_mut(identity) {
            Some(events) => {
                while events
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= window)
                {
                    events.pop_front();
                }
                events.len()
            }
            None => 0,
        }
    }

    /// Record an event for `identity` at `at`.
    pub fn record(&mut self, identity: &str, at: Instant) {
        self.events.entry(identity.to_string()).or_default().push_back(at);
    }

    /// The earliest surviving timestamp for `identity`: the next one to
    /// age out of the window.
    pub fn oldest(&self, identity: &str) -> Option<Instant> {
        self.events.get(identity).and_then(|events| events.front().copied())
    }

    /// Remove recorded state for one identity, or for every identity.
    ///
    /// Clearing an identity with no recorded state is a no-op.
    pub fn clear(&mut self, identity: Option<&str>) {
        match identity {
            Some(identity) => {
                self.events.remove(identity);
            }
            None => self.events.clear(),
        }
    }

    /// Number of identities with at least one recorded timestamp.
    ///
    /// An identity whose entries have all been removed counts the same as
    /// one that was never seen.
    pub fn active_identities(&self) -> usize {
        self.events.values().filter(|events| !events.is_empty()).count()
    }
}
