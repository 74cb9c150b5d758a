//! Configuration provider seam for live-reconfigurable limiters.
//!
//! Dynamic limiters re-read their thresholds immediately before every
//! operation, so a provider must answer synchronously from memory. Absent
//! keys resolve to the caller-supplied default and a provider failure is
//! treated the same as an absent key, so a configuration problem can never
//! propagate into request handling.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Read access to integer-valued settings.
pub trait SettingsProvider: Send + Sync {
    /// Look up an integer setting, returning `default` when the key is
    /// absent or unreadable.
    fn get_int(&self, key: &str, default: i64) -> i64;
}

/// Mutable in-memory settings.
///
/// Serves as the runtime cache in front of whatever store the application
/// persists its configuration in, and as the harness for exercising
/// dynamic limiters in tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, i64>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace a value.
    pub fn set(&self, key: impl Into<String>, value: i64) {
        self.values.write().insert(key.into(), value);
    }

    /// Remove a value, reverting lookups for it to their defaults.
    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    /// Drop every stored value.
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl SettingsProvider for MemorySettings {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values.read().get(key).copied().unwrap_or(default)
    }
}

/// Layered file/env configuration can drive limiter thresholds directly.
impl SettingsProvider for config::Config {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get::<i64>(key).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_returns_default() {
        let settings = MemorySettings::new();
        assert_eq!(settings.get_int("missing", 42), 42);
    }

    #[test]
    fn set_and_get_roundtrip() {
        let settings = MemorySettings::new();
        settings.set("login_max", 10);
        assert_eq!(settings.get_int("login_max", 5), 10);
    }

    #[test]
    fn remove_reverts_to_default() {
        let settings = MemorySettings::new();
        settings.set("login_max", 10);
        settings.remove("login_max");
        assert_eq!(settings.get_int("login_max", 5), 5);
    }

    #[test]
    fn config_crate_backed_lookup() {
        let config = config::Config::builder()
            .set_default("chat_max", 25)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(SettingsProvider::get_int(&config, "chat_max", 5), 25);
        assert_eq!(SettingsProvider::get_int(&config, "absent", 5), 5);
    }
}
