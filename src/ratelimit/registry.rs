//! Process-wide directory of limiters for diagnostics and test isolation.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info};

use super::limiter::{Limiter, LimiterKind};

/// Directory mapping limiter name to limiter instance.
///
/// Construct one at startup and hand it to whichever component declares
/// limiters. Registration is rare and lookups are frequent; the map is
/// safe for both happening concurrently. The registry holds shared
/// references only, so limiters stay independently usable outside it.
#[derive(Default)]
pub struct LimiterRegistry {
    limiters: DashMap<String, Arc<dyn Limiter>>,
}

/// Aggregate report over every registered limiter.
#[derive(Debug, Serialize)]
pub struct RegistryStats {
    pub total_limiters: usize,
    /// Per-limiter details keyed by name, ordered for stable output.
    pub limiters: BTreeMap<String, LimiterStats>,
}

/// Snapshot of one limiter's policy and recorded state.
#[derive(Debug, Serialize)]
pub struct LimiterStats {
    pub max_events: u32,
    pub window_secs: u64,
    pub active_identities: usize,
    pub kind: LimiterKind,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `limiter` under its name, replacing any previous
    /// registration under that name.
    pub fn register(&self, limiter: Arc<dyn Limiter>) {
        debug!(limiter = %limiter.name(), "registered rate limiter");
        self.limiters.insert(limiter.name().to_string(), limiter);
    }

    /// Look up a limiter by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Limiter>> {
        self.limiters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of every registered limiter, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.limiters.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Snapshot every limiter's policy and recorded state.
    pub fn stats(&self) -> RegistryStats {
        let limiters: BTreeMap<String, LimiterStats> = self
            .limiters
            .iter()
            .map(|entry| {
                let limiter = entry.value();
                let policy = limiter.policy();
                (
                    entry.key().clone(),
                    LimiterStats {
                        max_events: policy.max_events,
                        window_secs: policy.window.as_secs(),
                        active_identities: limiter.active_identities(),
                        kind: limiter.kind(),
                    },
                )
            })
            .collect();

        RegistryStats {
            total_limiters: limiters.len(),
            limiters,
        }
    }

    /// Reset recorded state on every registered limiter without removing
    /// any of them. Used between test cases and for administrative resets.
    pub fn clear_all(&self) {
        for entry in self.limiters.iter() {
            entry.value().clear(None);
        }
        info!(limiters = self.limiters.len(), "cleared all rate limiters");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::ratelimit::{DynamicRateLimiter, RateLimiter};
    use crate::settings::MemorySettings;

    const WINDOW: Duration = Duration::from_secs(300);

    fn limiter(name: &str, max_events: u32) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(name, max_events, WINDOW).unwrap())
    }

    #[test]
    fn register_then_get_roundtrips_the_same_instance() {
        let registry = LimiterRegistry::new();
        let login = limiter("login", 5);

        registry.register(login.clone());

        // Quota consumed through the original is visible through the
        // registry handle: both point at the same instance.
        let fetched = registry.get("login").expect("registered limiter");
        login.check("10.0.0.1");
        assert_eq!(fetched.remaining("10.0.0.1"), 4);
    }

    #[test]
    fn get_unknown_name_is_none() {
        let registry = LimiterRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn last_registration_for_a_name_wins() {
        let registry = LimiterRegistry::new();
        registry.register(limiter("login", 5));
        registry.register(limiter("login", 9));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("login").unwrap().policy().max_events, 9);
    }

    #[test]
    fn names_lists_every_registration() {
        let registry = LimiterRegistry::new();
        registry.register(limiter("login", 5));
        registry.register(limiter("signup", 3));

        let names: HashSet<String> = registry.names().into_iter().collect();
        assert_eq!(names, HashSet::from(["login".to_string(), "signup".to_string()]));
    }

    #[test]
    fn stats_reports_totals_and_per_limiter_details() {
        let registry = LimiterRegistry::new();
        let login = limiter("login", 5);
        login.check("10.0.0.1");
        login.check("10.0.0.2");
        registry.register(login);

        let settings = Arc::new(MemorySettings::new());
        registry.register(Arc::new(
            DynamicRateLimiter::new("chat", settings, 10, 1).unwrap(),
        ));

        let stats = registry.stats();
        assert_eq!(stats.total_limiters, 2);

        let login_stats = &stats.limiters["login"];
        assert_eq!(login_stats.max_events, 5);
        assert_eq!(login_stats.window_secs, 300);
        assert_eq!(login_stats.active_identities, 2);
        assert_eq!(login_stats.kind, LimiterKind::Static);

        let chat_stats = &stats.limiters["chat"];
        assert_eq!(chat_stats.window_secs, 60);
        assert_eq!(chat_stats.kind, LimiterKind::Dynamic);
    }

    #[test]
    fn stats_serialize_to_json() {
        let registry = LimiterRegistry::new();
        registry.register(limiter("login", 5));

        let json = serde_json::to_value(registry.stats()).unwrap();
        assert_eq!(json["total_limiters"], 1);
        assert_eq!(json["limiters"]["login"]["kind"], "static");
        assert_eq!(json["limiters"]["login"]["max_events"], 5);
    }

    #[test]
    fn clear_all_resets_state_but_keeps_registrations() {
        let registry = LimiterRegistry::new();
        let login = limiter("login", 1);
        let signup = limiter("signup", 1);
        login.check("10.0.0.1");
        signup.check("10.0.0.2");
        registry.register(login.clone());
        registry.register(signup.clone());

        registry.clear_all();

        assert_eq!(registry.len(), 2);
        assert_eq!(login.active_identities(), 0);
        assert_eq!(signup.active_identities(), 0);
        assert!(login.check("10.0.0.1"));
    }
}
