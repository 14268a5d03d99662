//! Built-in plugins.

use tracing::Level;

use super::config::Plugin;
use super::facade::Store;
use super::registry::{Hooks, SubscribeOptions};

/// Logs every mutation call through `tracing`.
///
/// Emits one event per hook on the `cellar::mutations` target, carrying the
/// descriptor and a snapshot of the state at that point.
#[derive(Debug, Clone, Copy)]
pub struct TracingPlugin {
    level: Level,
}

impl TracingPlugin {
    pub fn new() -> Self {
        Self { level: Level::INFO }
    }

    /// Level for `before`/`after` events. Rejections always log at `WARN`.
    pub fn with_level(level: Level) -> Self {
        Self { level }
    }
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {
        let level = $level;
        if level == Level::TRACE {
            tracing::trace!(target: "cellar::mutations", $($arg)+)
        } else if level == Level::DEBUG {
            tracing::debug!(target: "cellar::mutations", $($arg)+)
        } else if level == Level::INFO {
            tracing::info!(target: "cellar::mutations", $($arg)+)
        } else if level == Level::WARN {
            tracing::warn!(target: "cellar::mutations", $($arg)+)
        } else {
            tracing::error!(target: "cellar::mutations", $($arg)+)
        }
    };
}

impl Plugin for TracingPlugin {
    fn apply(&self, store: &Store) {
        let level = self.level;
        store.subscribe(
            Hooks::new()
                .before(move |mutation, state| {
                    event_at!(
                        level,
                        mutation = %mutation.to_json(),
                        state = %state.snapshot_untracked(),
                        "before mutation"
                    );
                })
                .after(move |mutation, state| {
                    event_at!(
                        level,
                        mutation = %mutation.to_json(),
                        state = %state.snapshot_untracked(),
                        "after mutation"
                    );
                })
                .error(|mutation, state| {
                    tracing::warn!(
                        target: "cellar::mutations",
                        mutation = %mutation.to_json(),
                        state = %state.snapshot_untracked(),
                        "mutation rejected"
                    );
                }),
            SubscribeOptions::default(),
        );
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveObject;
    use crate::store::config::StoreConfig;
    use crate::store::facade::{create_store, StoreOptions};
    use crate::store::mutation::RawMutations;
    use crate::store::MutationError;
    use serde_json::{json, Value};

    fn logged_store() -> Store {
        let state = ReactiveObject::from_json(json!({"n": 0})).unwrap();
        let s = state.clone();
        let mutations = RawMutations::new()
            .sync("BUMP", move |_| {
                s.update("n", |n| *n = json!(n.as_i64().unwrap_or(0) + 1));
                Ok(Value::Null)
            })
            .sync("FAIL", |_| Err(MutationError::msg("nope")));
        let config = StoreConfig::new().plugin(TracingPlugin::with_level(Level::DEBUG));
        create_store(&config, StoreOptions::new(state).mutations(mutations))
    }

    #[test]
    fn subscribes_one_record() {
        let store = logged_store();
        assert_eq!(store.subscriber_count(), 1);
        assert_eq!(TracingPlugin::new().name(), "tracing");
    }

    #[test]
    fn logging_does_not_change_outcomes() {
        let store = logged_store();
        assert!(!store.commit("BUMP", []).unwrap().is_pending());
        assert_eq!(store.get("n"), Some(json!(1)));
        assert!(store.commit("FAIL", []).is_err());
    }
}
