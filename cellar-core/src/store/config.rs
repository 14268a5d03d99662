//! Store configuration and plugins.
//!
//! A [`StoreConfig`] is created once at application start and passed by
//! reference to every [`create_store`](super::create_store) call. It holds
//! the plugins to run against each new store and the tunable
//! [`StoreSettings`]; installing plugins affects stores created afterwards
//! only.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::facade::Store;
use super::loading::LoadingPolicy;

/// Extension point run against every new store.
///
/// Plugins typically call [`Store::subscribe`]. Any `Fn(&Store)` is a
/// plugin.
pub trait Plugin: Send + Sync {
    fn apply(&self, store: &Store);

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Plugin for F
where
    F: Fn(&Store) + Send + Sync,
{
    fn apply(&self, store: &Store) {
        self(store)
    }
}

/// Serializable store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// How overlapping deferred calls drive a shared loading flag.
    pub loading_policy: LoadingPolicy,
    /// Log a warning when code writes through the read-only state view.
    pub log_rejected_writes: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            loading_policy: LoadingPolicy::LastSettled,
            log_rejected_writes: true,
        }
    }
}

impl StoreSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings plus installed plugins.
#[derive(Clone, Default)]
pub struct StoreConfig {
    pub settings: StoreSettings,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: StoreSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the installed plugins.
    pub fn install<I>(&mut self, plugins: I)
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        self.plugins = plugins.into_iter().collect();
        tracing::debug!(count = self.plugins.len(), "plugins installed");
    }

    /// Append one plugin.
    pub fn plugin<P>(mut self, plugin: P) -> Self
    where
        P: Plugin + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("settings", &self.settings)
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_fields_missing() {
        let settings = StoreSettings::from_json("{}").unwrap();
        assert_eq!(settings, StoreSettings::default());

        let settings = StoreSettings::from_json(r#"{"loading_policy": "in_flight"}"#).unwrap();
        assert_eq!(settings.loading_policy, LoadingPolicy::InFlight);
        assert!(settings.log_rejected_writes);
    }

    #[test]
    fn unknown_settings_are_rejected() {
        let err = StoreSettings::from_json(r#"{"persist": true}"#).unwrap_err();
        assert!(matches!(err, StoreError::Settings(_)));
    }

    #[test]
    fn install_replaces_plugins() {
        let mut config = StoreConfig::new().plugin(|_: &Store| {});
        assert_eq!(config.plugins().len(), 1);

        let a: Arc<dyn Plugin> = Arc::new(|_: &Store| {});
        let b: Arc<dyn Plugin> = Arc::new(|_: &Store| {});
        config.install([a, b]);
        assert_eq!(config.plugins().len(), 2);

        config.install(Vec::new());
        assert!(config.plugins().is_empty());
    }
}
