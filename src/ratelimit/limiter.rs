//! Core sliding-window rate limiter.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::window::WindowStore;

/// Enforcement policy: how many events are admitted per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maximum events admitted within the window.
    pub max_events: u32,
    /// Length of the sliding window.
    pub window: Duration,
}

impl Policy {
    /// Validate and build a policy. Both fields must be strictly positive.
    pub fn new(max_events: u32, window: Duration) -> Result<Self> {
        if max_events == 0 {
            return Err(Error::InvalidMaxEvents);
        }
        if window.is_zero() {
            return Err(Error::InvalidWindow);
        }
        Ok(Self { max_events, window })
    }
}

/// How a limiter sources its policy, reported through registry stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterKind {
    /// Fixed policy set at construction.
    Static,
    /// Policy re-read from a settings provider before every operation.
    Dynamic,
}

/// Common surface shared by static and dynamic limiters.
///
/// Object-safe so the registry and the enforcement middleware can hold an
/// `Arc<dyn Limiter>` without caring which variant is behind it.
pub trait Limiter: Send + Sync {
    /// Human-readable name, used for logging and registry lookup.
    fn name(&self) -> &str;

    fn kind(&self) -> LimiterKind;

    /// Combined check-and-record: admits and records the event when the
    /// identity is under its limit, denies without recording otherwise.
    ///
    /// Not idempotent. Every allowed call consumes one slot, so callers
    /// must check exactly once per request.
    fn check(&self, identity: &str) -> bool;

    /// Events the identity may still send within the current window.
    /// Does not record anything.
    fn remaining(&self, identity: &str) -> u32;

    /// Time until the oldest recorded event ages out and frees one slot,
    /// or `None` while the identity is under the limit.
    ///
    /// This measures when the *next* event becomes admissible, not when
    /// the identity's whole history expires.
    fn time_to_reset(&self, identity: &str) -> Option<Duration>;

    /// Forget recorded events for one identity, or for every identity.
    fn clear(&self, identity: Option<&str>);

    /// Snapshot of the currently effective policy.
    fn policy(&self) -> Policy;

    /// Number of identities with recorded state.
    fn active_identities(&self) -> usize;
}

/// Sliding-window rate limiter with a fixed policy.
///
/// Keeps one timestamp per admitted event and re-evaluates the window
/// relative to the current moment on every call, so capacity returns
/// gradually as events age out rather than all at once on a fixed
/// boundary.
pub struct RateLimiter {
    name: String,
    policy: RwLock<Policy>,
    store: Mutex<WindowStore>,
}

impl RateLimiter {
    /// Create a limiter named `name` admitting `max_events` per `window`.
    pub fn new(name: impl Into<String>, max_events: u32, window: Duration) -> Result<Self> {
        let policy = Policy::new(max_events, window)?;
        Ok(Self {
            name: name.into(),
            policy: RwLock::new(policy),
            store: Mutex::new(WindowStore::new()),
        })
    }

    /// Replace the effective policy. Used by the dynamic wrapper.
    pub(crate) fn set_policy(&self, policy: Policy) {
        *self.policy.write() = policy;
    }

    fn check_at(&self, identity: &str, now: Instant) -> bool {
        let policy = *self.policy.read();
        // Single critical section: two callers racing through the count
        // for the same identity must not both be admitted at the boundary.
        let mut store = self.store.lock();
        let count = store.prune(identity, now, policy.window);
        if count >= policy.max_events as usize {
            warn!(
                limiter = %self.name,
                identity = %identity,
                events = count,
                max_events = policy.max_events,
                "rate limit exceeded"
            );
            return false;
        }
        store.record(identity, now);
        true
    }

    fn remaining_at(&self, identity: &str, now: Instant) -> u32 {
        let policy = *self.policy.read();
        let mut store = self.store.lock();
        let count = store.prune(identity, now, policy.window);
        policy.max_events.saturating_sub(count as u32)
    }

    fn time_to_reset_at(&self, identity: &str, now: Instant) -> Option<Duration> {
        let policy = *self.policy.read();
        let mut store = self.store.lock();
        let count = store.prune(identity, now, policy.window);
        if count < policy.max_events as usize {
            return None;
        }
        let oldest = store.oldest(identity)?;
        let wait = oldest.checked_add(policy.window)?.saturating_duration_since(now);
        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }
}

impl Limiter for RateLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::Static
    }

    fn check(&self, identity: &str) -> bool {
        self.check_at(identity, Instant::now())
    }

    fn remaining(&self, identity: &str) -> u32 {
        self.remaining_at(identity, Instant::now())
    }

    fn time_to_reset(&self, identity: &str) -> Option<Duration> {
        self.time_to_reset_at(identity, Instant::now())
    }

    fn clear(&self, identity: Option<&str>) {
        self.store.lock().clear(identity);
        match identity {
            Some(identity) => {
                debug!(limiter = %self.name, identity = %identity, "cleared recorded events")
            }
            None => debug!(limiter = %self.name, "cleared all recorded events"),
        }
    }

    fn policy(&self) -> Policy {
        *self.policy.read()
    }

    fn active_identities(&self) -> usize {
        self.store.lock().active_identities()
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("policy", &*self.policy.read())
            .finish_non_exhaustive()
    }
}
