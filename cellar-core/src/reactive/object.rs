//! Reactive Object
//!
//! The application-state primitive: a map of top-level keys, each backed by
//! its own [`Signal`] over a `serde_json::Value`. Reading a key tracks that
//! key only; writing or mutating it re-runs exactly the computations that
//! read it. Adding or removing keys is tracked separately, so membership
//! checks and key listings react to structural changes.
//!
//! Nested values are mutated through [`ReactiveObject::update`], which
//! hands out the whole top-level value and notifies once afterwards.

use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use thiserror::Error;

use super::signal::Signal;

/// Returned when building a [`ReactiveObject`] from a non-object value.
#[derive(Debug, Error)]
#[error("reactive state must be a JSON object, got {kind}")]
pub struct NotAnObject {
    kind: &'static str,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A deep-reactive map of state fields.
///
/// Clones share the same fields.
#[derive(Clone)]
pub struct ReactiveObject {
    fields: Arc<RwLock<IndexMap<String, Signal<Value>>>>,
    shape: Signal<u64>,
}

impl ReactiveObject {
    /// Create a reactive object from a JSON map.
    pub fn new(fields: Map<String, Value>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key, Signal::new(value)))
            .collect();
        Self {
            fields: Arc::new(RwLock::new(fields)),
            shape: Signal::new(0),
        }
    }

    /// Create a reactive object from a JSON value, which must be an object.
    pub fn from_json(value: Value) -> Result<Self, NotAnObject> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(NotAnObject {
                kind: kind_of(&other),
            }),
        }
    }

    fn field(&self, key: &str) -> Option<Signal<Value>> {
        self.fields.read().get(key).cloned()
    }

    /// Read a field, tracking it.
    ///
    /// Reading a missing key tracks the object's shape instead, so the read
    /// re-runs once the key is added.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.field(key) {
            Some(signal) => Some(signal.get()),
            None => {
                self.shape.get();
                None
            }
        }
    }

    /// Read a field without tracking it.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.field(key).map(|signal| signal.get_untracked())
    }

    /// Whether `key` is a field, tracking the object's shape.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shape.get();
        self.fields.read().contains_key(key)
    }

    /// Field names in insertion order, tracking the object's shape.
    pub fn keys(&self) -> Vec<String> {
        self.shape.get();
        self.fields.read().keys().cloned().collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.shape.get();
        self.fields.read().len()
    }

    /// Whether the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a field, adding it if missing.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let existing = match self.fields.write().entry(key.into()) {
            Entry::Occupied(entry) => Some((entry.get().clone(), value)),
            Entry::Vacant(entry) => {
                entry.insert(Signal::new(value));
                None
            }
        };

        match existing {
            Some((signal, value)) => signal.set(value),
            None => self.shape.update(|n| n + 1),
        }
    }

    /// Mutate a field in place. Returns `false` if the key does not exist.
    pub fn update<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut Value),
    {
        match self.field(key) {
            Some(signal) => {
                signal.modify(f);
                true
            }
            None => false,
        }
    }

    /// Remove a field, returning its last value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.fields.write().shift_remove(key)?;
        self.shape.update(|n| n + 1);
        let value = removed.get_untracked();
        removed.set(Value::Null);
        Some(value)
    }

    /// Copy the whole object into a plain JSON value, tracking every field.
    pub fn snapshot(&self) -> Value {
        self.shape.get();
        let fields: Vec<(String, Signal<Value>)> = self
            .fields
            .read()
            .iter()
            .map(|(key, signal)| (key.clone(), signal.clone()))
            .collect();
        Value::Object(
            fields
                .into_iter()
                .map(|(key, signal)| (key, signal.get()))
                .collect(),
        )
    }

    /// Copy the whole object without tracking.
    pub fn snapshot_untracked(&self) -> Value {
        Value::Object(
            self.fields
                .read()
                .iter()
                .map(|(key, signal)| (key.clone(), signal.get_untracked()))
                .collect(),
        )
    }
}

impl std::fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReactiveObject")
            .field(&self.snapshot_untracked())
            .finish()
    }
}

impl TryFrom<Value> for ReactiveObject {
    type Error = NotAnObject;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<Map<String, Value>> for ReactiveObject {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn rejects_non_objects() {
        let err = ReactiveObject::from_json(json!([1, 2])).unwrap_err();
        assert_eq!(err.to_string(), "reactive state must be a JSON object, got an array");
    }

    #[test]
    fn reads_and_writes_fields() {
        let state = ReactiveObject::from_json(json!({"title": "A", "n": 1})).unwrap();

        assert_eq!(state.get("title"), Some(json!("A")));
        assert_eq!(state.keys(), vec!["title", "n"]);

        state.set("title", json!("B"));
        state.set("extra", json!(true));
        assert_eq!(state.get("title"), Some(json!("B")));
        assert!(state.contains_key("extra"));
        assert_eq!(state.remove("extra"), Some(json!(true)));
        assert!(!state.contains_key("extra"));
    }

    #[test]
    fn nested_update_notifies_readers_of_that_key() {
        let state = ReactiveObject::from_json(json!({"user": {"name": "ann"}, "other": 0})).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));

        let (s, r) = (state.clone(), runs.clone());
        let _effect = Effect::new(move || {
            s.get("user");
            r.fetch_add(1, Ordering::SeqCst);
        });

        assert!(state.update("user", |user| user["name"] = json!("bob")));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        state.set("other", json!(1));
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert_eq!(state.snapshot_untracked()["user"]["name"], json!("bob"));
    }

    #[test]
    fn missing_key_read_reacts_to_insertion() {
        let state = ReactiveObject::from_json(json!({})).unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let (s, seen2) = (state.clone(), seen.clone());
        let _effect = Effect::new(move || seen2.lock().push(s.get("late")));

        state.set("late", json!(7));
        assert_eq!(*seen.lock(), vec![None, Some(json!(7))]);
    }

    #[test]
    fn racing_inserts_of_a_new_key_share_one_cell() {
        let state = ReactiveObject::from_json(json!({})).unwrap();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (state, barrier) = (state.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    state.set("hot", json!(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.shape.get_untracked(), 1);
        let cell = state.field("hot").unwrap();
        state.set("hot", json!("last"));
        assert_eq!(cell.get_untracked(), json!("last"));
    }
}
