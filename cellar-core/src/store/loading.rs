//! Per-mutation loading flags.
//!
//! Each mutation name owns one boolean signal, created the first time the
//! name is asked for and shared by every call to that mutation. A deferred
//! call raises it; settling lowers it.
//!
//! Overlapping deferred calls to the same name share the flag. Under
//! [`LoadingPolicy::LastSettled`] every settlement lowers it, so if call A
//! and call B overlap and A settles first, the flag reads `false` while B
//! is still in flight. [`LoadingPolicy::InFlight`] counts pending calls
//! instead and keeps the flag up until the last one settles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reactive::{ReadSignal, Signal};

/// How overlapping deferred calls drive a shared loading flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingPolicy {
    /// Any settlement lowers the flag.
    #[default]
    LastSettled,
    /// The flag stays up while any call is pending.
    InFlight,
}

/// The writable side of one mutation's loading flag.
#[derive(Clone)]
pub(crate) struct LoadingFlag {
    cell: Signal<bool>,
    in_flight: Arc<AtomicUsize>,
    policy: LoadingPolicy,
}

impl LoadingFlag {
    fn new(policy: LoadingPolicy) -> Self {
        Self {
            cell: Signal::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
            policy,
        }
    }

    /// A deferred call started. The call counts as pending until the
    /// returned guard is settled or dropped.
    pub(crate) fn begin(&self) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.cell.set(true);
        InFlight {
            flag: Some(self.clone()),
        }
    }

    fn settle(&self) {
        let remaining = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_or(0, |previous| previous - 1);
        self.cell.set(self.lowered(remaining));
    }

    /// A call completed synchronously.
    pub(crate) fn finish_sync(&self) {
        let pending = self.in_flight.load(Ordering::SeqCst);
        self.cell.set(self.lowered(pending));
    }

    fn lowered(&self, pending: usize) -> bool {
        match self.policy {
            LoadingPolicy::LastSettled => false,
            LoadingPolicy::InFlight => pending > 0,
        }
    }

    pub(crate) fn read_only(&self) -> ReadSignal<bool> {
        self.cell.read_only()
    }
}

/// One pending deferred call.
///
/// Lowers the flag when dropped, so a call whose future panics or is
/// cancelled still stops counting as pending.
#[must_use = "the call settles as soon as the guard is dropped"]
pub(crate) struct InFlight {
    flag: Option<LoadingFlag>,
}

impl InFlight {
    /// The call settled, either way.
    pub(crate) fn settle(mut self) {
        if let Some(flag) = self.flag.take() {
            flag.settle();
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            flag.settle();
        }
    }
}

/// Owns the loading flag of every mutation name.
pub struct LoadingTracker {
    policy: LoadingPolicy,
    flags: DashMap<String, LoadingFlag>,
}

impl LoadingTracker {
    pub fn new(policy: LoadingPolicy) -> Self {
        Self {
            policy,
            flags: DashMap::new(),
        }
    }

    pub fn policy(&self) -> LoadingPolicy {
        self.policy
    }

    pub(crate) fn cell_for(&self, name: &str) -> LoadingFlag {
        if let Some(flag) = self.flags.get(name) {
            return flag.value().clone();
        }
        self.flags
            .entry(name.to_owned())
            .or_insert_with(|| LoadingFlag::new(self.policy))
            .value()
            .clone()
    }

    /// The loading flag for `name`, created as `false` on first request.
    pub fn flag_for(&self, name: &str) -> ReadSignal<bool> {
        self.cell_for(name).read_only()
    }

    /// Read-only table of the flags for `names`.
    pub fn loadings<'a, I>(&self, names: I) -> Loadings
    where
        I: IntoIterator<Item = &'a str>,
    {
        let flags = names
            .into_iter()
            .map(|name| (name.to_owned(), self.flag_for(name)))
            .collect();
        Loadings {
            flags: Arc::new(flags),
        }
    }
}

impl std::fmt::Debug for LoadingTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingTracker")
            .field("policy", &self.policy)
            .field("flags", &self.flags.len())
            .finish()
    }
}

/// Read-only map from mutation name to its loading flag.
///
/// Fixed when the store is built: it lists the mutations that existed then.
#[derive(Clone, Default)]
pub struct Loadings {
    flags: Arc<IndexMap<String, ReadSignal<bool>>>,
}

impl Loadings {
    /// The flag for `name`.
    pub fn get(&self, name: &str) -> Option<ReadSignal<bool>> {
        self.flags.get(name).cloned()
    }

    /// Whether `name` is loading. Tracked; `false` for unknown names.
    pub fn is_loading(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(ReadSignal::get)
    }

    /// Whether any listed mutation is loading. Tracked.
    pub fn any(&self) -> bool {
        self.flags.values().fold(false, |any, flag| flag.get() || any)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl std::fmt::Debug for Loadings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.flags.iter().map(|(name, flag)| (name, flag.get_untracked())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_created_once_per_name() {
        let tracker = LoadingTracker::new(LoadingPolicy::default());
        let a = tracker.flag_for("SET_TITLE");
        let b = tracker.flag_for("SET_TITLE");
        let other = tracker.flag_for("RESET");

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), other.id());
        assert!(!a.get());
    }

    #[test]
    fn last_settled_lowers_on_first_settlement() {
        let tracker = LoadingTracker::new(LoadingPolicy::LastSettled);
        let flag = tracker.cell_for("LOAD");
        let view = flag.read_only();

        let first = flag.begin();
        let second = flag.begin();
        assert!(view.get());

        first.settle();
        assert!(!view.get(), "overlapping call still pending but flag is down");

        second.settle();
        assert!(!view.get());
    }

    #[test]
    fn in_flight_waits_for_every_call() {
        let tracker = LoadingTracker::new(LoadingPolicy::InFlight);
        let flag = tracker.cell_for("LOAD");
        let view = flag.read_only();

        let first = flag.begin();
        let second = flag.begin();
        first.settle();
        assert!(view.get());

        flag.finish_sync();
        assert!(view.get());

        second.settle();
        assert!(!view.get());
    }

    #[test]
    fn dropped_call_stops_counting() {
        let tracker = LoadingTracker::new(LoadingPolicy::InFlight);
        let flag = tracker.cell_for("LOAD");
        let view = flag.read_only();

        let abandoned = flag.begin();
        drop(abandoned);
        assert!(!view.get());

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _call = flag.begin();
            panic!("body blew up");
        }));
        assert!(unwound.is_err());
        assert!(!view.get());

        let next = flag.begin();
        assert!(view.get());
        next.settle();
        assert!(!view.get());
    }

    #[test]
    fn sync_finish_clears_stale_flag() {
        let tracker = LoadingTracker::new(LoadingPolicy::LastSettled);
        let flag = tracker.cell_for("LOAD");

        let _call = flag.begin();
        flag.finish_sync();
        assert!(!flag.read_only().get());
    }

    #[test]
    fn loadings_lists_requested_names() {
        let tracker = LoadingTracker::new(LoadingPolicy::default());
        let loadings = tracker.loadings(["A", "B"]);

        assert_eq!(loadings.names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(!loadings.contains("C"));
        assert!(!loadings.is_loading("C"));

        let _call = tracker.cell_for("A").begin();
        assert!(loadings.is_loading("A"));
        assert!(loadings.any());
        assert_eq!(loadings.get("A").unwrap().id(), tracker.flag_for("A").id());
    }

    #[test]
    fn policy_parses_from_snake_case() {
        let policy: LoadingPolicy = serde_json::from_str("\"in_flight\"").unwrap();
        assert_eq!(policy, LoadingPolicy::InFlight);
    }
}
