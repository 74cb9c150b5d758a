//! Live-reconfigurable sliding-window limiter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::settings::SettingsProvider;

use super::limiter::{Limiter, LimiterKind, Policy, RateLimiter};

const SECS_PER_MINUTE: u64 = 60;

/// A limiter whose policy follows a settings provider.
///
/// Both thresholds are re-read immediately before every public operation,
/// so an administrator can tighten or relax limits without a restart and
/// the very next request observes the change. An absent or non-positive
/// setting falls back to the construction-time default; the limiter never
/// runs with an undefined or invalid policy.
///
/// The window setting is expressed in whole minutes, matching the
/// convention of the persisted configuration it mirrors.
pub struct DynamicRateLimiter {
    inner: RateLimiter,
    settings: Arc<dyn SettingsProvider>,
    key_max: String,
    key_window: String,
    fallback_max: u32,
    fallback_window_minutes: u64,
}

impl DynamicRateLimiter {
    /// Create a dynamic limiter named `name` reading its thresholds from
    /// `settings` under the `{name}_max` and `{name}_window_minutes` keys.
    ///
    /// The fallbacks are validated up front and seed the starting policy
    /// when the provider has no values yet; the provider is not consulted
    /// again until the first operation.
    pub fn new(
        name: impl Into<String>,
        settings: Arc<dyn SettingsProvider>,
        fallback_max: u32,
        fallback_window_minutes: u64,
    ) -> Result<Self> {
        let name = name.into();
        let key_max = format!("{name}_max");
        let key_window = format!("{name}_window_minutes");
        Self::with_keys(name, settings, key_max, key_window, fallback_max, fallback_window_minutes)
    }

    /// Create a dynamic limiter with explicit settings keys.
    pub fn with_keys(
        name: impl Into<String>,
        settings: Arc<dyn SettingsProvider>,
        key_max: impl Into<String>,
        key_window: impl Into<String>,
        fallback_max: u32,
        fallback_window_minutes: u64,
    ) -> Result<Self> {
        if fallback_max == 0 {
            return Err(Error::InvalidMaxEvents);
        }
        if fallback_window_minutes == 0 {
            return Err(Error::InvalidWindow);
        }

        let key_max = key_max.into();
        let key_window = key_window.into();

        let seeded_max = positive_max(
            &key_max,
            settings.get_int(&key_max, fallback_max as i64),
            fallback_max,
        );
        let seeded_minutes = positive_minutes(
            &key_window,
            settings.get_int(&key_window, fallback_window_minutes as i64),
            fallback_window_minutes,
        );

        let inner = RateLimiter::new(
            name,
            seeded_max,
            Duration::from_secs(seeded_minutes * SECS_PER_MINUTE),
        )?;

        Ok(Self {
            inner,
            settings,
            key_max,
            key_window,
            fallback_max,
            fallback_window_minutes,
        })
    }

    /// Re-read both thresholds and patch the effective policy in place.
    ///
    /// Runs before every public operation: the freshness guarantee is
    /// "current as of this call", not "eventually current".
    fn refresh(&self) {
        let max = positive_max(
            &self.key_max,
            self.settings.get_int(&self.key_max, self.fallback_max as i64),
            self.fallback_max,
        );
        let minutes = positive_minutes(
            &self.key_window,
            self.settings
                .get_int(&self.key_window, self.fallback_window_minutes as i64),
            self.fallback_window_minutes,
        );
        let window = Duration::from_secs(minutes * SECS_PER_MINUTE);

        let current = self.inner.policy();
        if max == current.max_events && window == current.window {
            return;
        }

        if max != current.max_events {
            debug!(
                limiter = %self.inner.name(),
                old = current.max_events,
                new = max,
                "updated max_events from settings"
            );
        }
        if window != current.window {
            debug!(
                limiter = %self.inner.name(),
                old_secs = current.window.as_secs(),
                new_secs = window.as_secs(),
                "updated window from settings"
            );
        }

        // Both values have been sanitized to positive, so the policy
        // invariant holds without re-validation.
        self.inner.set_policy(Policy { max_events: max, window });
    }
}

/// Sanitize a configured max_events value, falling back when it is
/// non-positive or out of range.
fn positive_max(key: &str, raw: i64, fallback: u32) -> u32 {
    if (1..=i64::from(u32::MAX)).contains(&raw) {
        raw as u32
    } else {
        warn!(key = %key, value = raw, "ignoring invalid max_events setting");
        fallback
    }
}

/// Sanitize a configured window length in minutes.
fn positive_minutes(key: &str, raw: i64, fallback: u64) -> u64 {
    if (1..=i64::from(u32::MAX)).contains(&raw) {
        raw as u64
    } else {
        warn!(key = %key, value = raw, "ignoring invalid window setting");
        fallback
    }
}

impl Limiter for DynamicRateLimiter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> LimiterKind {
        LimiterKind::Dynamic
    }

    fn check(&self, identity: &str) -> bool {
        self.refresh();
        self.inner.check(identity)
    }

    fn remaining(&self, identity: &str) -> u32 {
        self.refresh();
        self.inner.remaining(identity)
    }

    fn time_to_reset(&self, identity: &str) -> Option<Duration> {
        self.refresh();
        self.inner.time_to_reset(identity)
    }

    fn clear(&self, identity: Option<&str>) {
        self.inner.clear(identity);
    }

    fn policy(&self) -> Policy {
        self.inner.policy()
    }

    fn active_identities(&self) -> usize {
        self.inner.active_identities()
    }
}

impl fmt::Debug for DynamicRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicRateLimiter")
            .field("name", &self.inner.name())
            .field("key_max", &self.key_max)
            .field("key_window", &self.key_window)
            .field("policy", &self.inner.policy())
            .finish_non_exhaustive()
    }
}
