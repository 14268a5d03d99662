//! Read-only view over application state.
//!
//! Reads pass straight through to the reactive state (so they are tracked
//! like any other read); object and array values come back wrapped in
//! another view. Writes are refused: the call returns normally, nothing
//! changes, and a warning is logged. Code that writes through the view is
//! a bug in the caller, not a failure of the store; state changes belong in
//! mutations, which hold the writable [`ReactiveObject`].

use std::fmt;

use serde_json::Value;

use crate::reactive::ReactiveObject;

/// A read-only window onto state.
///
/// A nested view remembers the key path from the root object and resolves
/// it on every read, so it follows later mutations.
#[derive(Clone)]
pub struct ReadOnlyView {
    root: ReactiveObject,
    path: Vec<String>,
    warn_on_write: bool,
}

/// A value read through a [`ReadOnlyView`].
#[derive(Clone, Debug)]
pub enum ViewEntry {
    /// A scalar (null, bool, number or string).
    Value(Value),
    /// An object or array, itself read-only.
    View(ReadOnlyView),
}

impl ViewEntry {
    /// The plain JSON value behind this entry.
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::View(view) => view.to_value(),
        }
    }

    /// The nested view, if this entry is one.
    pub fn as_view(&self) -> Option<&ReadOnlyView> {
        match self {
            Self::View(view) => Some(view),
            Self::Value(_) => None,
        }
    }
}

impl PartialEq<Value> for ViewEntry {
    fn eq(&self, other: &Value) -> bool {
        match self {
            Self::Value(value) => value == other,
            Self::View(view) => view.to_value() == *other,
        }
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl ReadOnlyView {
    /// Wrap reactive state in a read-only view.
    pub fn wrap(target: ReactiveObject) -> Self {
        Self {
            root: target,
            path: Vec::new(),
            warn_on_write: true,
        }
    }

    /// Set whether rejected writes are logged.
    pub fn warn_on_write(mut self, enabled: bool) -> Self {
        self.warn_on_write = enabled;
        self
    }

    fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    fn dotted(&self, key: Option<&str>) -> String {
        let mut segments: Vec<&str> = self.path.iter().map(String::as_str).collect();
        segments.extend(key);
        segments.join(".")
    }

    /// Current value at this view's path. `None` once the path no longer
    /// leads anywhere, or for the root view.
    fn resolve(&self, tracked: bool) -> Option<Value> {
        let (first, rest) = self.path.split_first()?;
        let top = if tracked {
            self.root.get(first)?
        } else {
            self.root.get_untracked(first)?
        };
        let mut current = &top;
        for key in rest {
            current = child(current, key)?;
        }
        Some(current.clone())
    }

    /// Read `key`. Objects and arrays are returned as nested views.
    ///
    /// Array elements are addressed by their index as a string.
    pub fn get(&self, key: &str) -> Option<ViewEntry> {
        match self.get_value(key)? {
            Value::Object(_) | Value::Array(_) => {
                let mut path = self.path.clone();
                path.push(key.to_owned());
                Some(ViewEntry::View(Self {
                    root: self.root.clone(),
                    path,
                    warn_on_write: self.warn_on_write,
                }))
            }
            scalar => Some(ViewEntry::Value(scalar)),
        }
    }

    /// Read `key` as a plain value.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        if self.is_root() {
            return self.root.get(key);
        }
        child(&self.resolve(true)?, key).cloned()
    }

    /// Whether `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        if self.is_root() {
            return self.root.contains_key(key);
        }
        self.resolve(true).is_some_and(|value| child(&value, key).is_some())
    }

    /// Keys of this level, in order. Arrays list their indices.
    pub fn keys(&self) -> Vec<String> {
        if self.is_root() {
            return self.root.keys();
        }
        match self.resolve(true) {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Copy this level into a plain JSON value.
    pub fn to_value(&self) -> Value {
        if self.is_root() {
            return self.root.snapshot();
        }
        self.resolve(true).unwrap_or(Value::Null)
    }

    /// Attempt a write. It is ignored.
    pub fn set(&self, key: &str, value: Value) {
        if self.warn_on_write {
            tracing::warn!(
                key = %self.dotted(Some(key)),
                value = %value,
                "can not set state directly, commit a mutation instead"
            );
        }
    }
}

impl fmt::Debug for ReadOnlyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.is_root() {
            self.root.snapshot_untracked()
        } else {
            self.resolve(false).unwrap_or(Value::Null)
        };
        f.debug_struct("ReadOnlyView")
            .field("path", &self.dotted(None))
            .field("value", &value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view() -> (ReactiveObject, ReadOnlyView) {
        let state = ReactiveObject::from_json(json!({
            "title": "A",
            "author": {"name": "ann", "tags": ["x", "y"]},
        }))
        .unwrap();
        let view = ReadOnlyView::wrap(state.clone());
        (state, view)
    }

    #[test]
    fn reads_pass_through() {
        let (state, view) = view();
        assert_eq!(view.get("title").unwrap(), json!("A"));

        state.set("title", json!("B"));
        assert_eq!(view.get_value("title"), Some(json!("B")));
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn nested_values_are_wrapped() {
        let (_, view) = view();
        let author = view.get("author").unwrap();
        let author = author.as_view().unwrap();

        assert_eq!(author.get("name").unwrap(), json!("ann"));
        let tags = author.get("tags").unwrap();
        let tags = tags.as_view().unwrap();
        assert_eq!(tags.keys(), vec!["0", "1"]);
        assert_eq!(tags.get("1").unwrap(), json!("y"));
    }

    #[test]
    fn writes_are_ignored() {
        let (state, view) = view();

        view.set("title", json!("hacked"));
        assert_eq!(view.get_value("title"), Some(json!("A")));

        let author = view.get("author").unwrap();
        author.as_view().unwrap().set("name", json!("mallory"));
        assert_eq!(state.get_untracked("author").unwrap()["name"], json!("ann"));
    }

    #[test]
    fn nested_view_follows_later_writes() {
        let (state, view) = view();
        let author = view.get("author").unwrap();
        let author = author.as_view().unwrap().clone();
        let tags = author.get("tags").unwrap().as_view().unwrap().clone();

        state.update("author", |author| {
            author["name"] = json!("bob");
            author["tags"] = json!(["z"]);
        });
        assert_eq!(author.get_value("name"), Some(json!("bob")));
        assert_eq!(tags.keys(), vec!["0"]);
        assert!(!tags.contains_key("1"));

        state.set("author", json!("anonymous"));
        assert!(author.get("name").is_none());
        assert!(author.keys().is_empty());
        assert_eq!(author.to_value(), Value::Null);
    }

    #[test]
    fn nested_reads_are_tracked() {
        let (state, view) = view();
        let author = view.get("author").unwrap().as_view().unwrap().clone();
        let name = crate::reactive::Memo::new(move || author.get_value("name").unwrap_or(Value::Null));
        assert_eq!(name.get(), json!("ann"));

        state.update("author", |author| author["name"] = json!("cy"));
        assert_eq!(name.get(), json!("cy"));
    }

    #[test]
    fn silent_view_still_ignores_writes() {
        let (_, view) = view();
        let view = view.warn_on_write(false);
        view.set("title", json!("B"));
        assert_eq!(view.get_value("title"), Some(json!("A")));
    }
}
