//! Reactive Runtime
//!
//! The runtime connects sources (signals, memos) to the computations that
//! read them (memos, effects).
//!
//! # How It Works
//!
//! 1. Memos and effects register themselves with the runtime on creation.
//!
//! 2. Reading a source inside a tracking context records an edge from the
//!    source to the running computation.
//!
//! 3. When a source changes, the runtime:
//!    a. Finds the computations that read it
//!    b. Marks them "maybe dirty" (memos forward this to their own readers)
//!    c. Runs the eager ones (effects) synchronously
//!
//! # Locking
//!
//! The registry and edge tables are process-wide and guarded by
//! `parking_lot` locks. No lock is held while a computation runs, so a
//! computation may freely read and write other sources.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::ids::{SourceId, SubscriberId};

/// A computation that can be notified when its dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this computation as potentially needing to re-run.
    fn mark_maybe_dirty(&self);

    /// Re-run the computation (effects only).
    fn schedule(&self);

    /// Whether the computation re-runs eagerly (effect) or lazily (memo).
    fn is_eager(&self) -> bool;
}

/// Handle to a registered computation.
///
/// Dropping this handle unregisters the computation and its edges.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

type Registry = HashMap<SubscriberId, Weak<dyn Reactive>>;

#[derive(Default)]
struct Edges {
    /// source -> computations that read it
    readers: HashMap<SourceId, IndexSet<SubscriberId>>,
    /// computation -> sources it read on its last run
    reads: HashMap<SubscriberId, IndexSet<SourceId>>,
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
static EDGES: OnceLock<RwLock<Edges>> = OnceLock::new();

fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn edges() -> &'static RwLock<Edges> {
    EDGES.get_or_init(|| RwLock::new(Edges::default()))
}

impl Runtime {
    /// Register a computation with the runtime.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        registry().write().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        registry().write().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record a read of `source` by whatever computation is running.
    ///
    /// Does nothing outside a tracking context.
    pub fn track_read(source: SourceId) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            if ReactiveContext::track_dependency(source) {
                Self::add_dependency(source, subscriber);
            }
        }
    }

    /// Record that `subscriber` depends on `source`.
    pub fn add_dependency(source: SourceId, subscriber: SubscriberId) {
        let mut edges = edges().write();
        edges.readers.entry(source).or_default().insert(subscriber);
        edges.reads.entry(subscriber).or_default().insert(source);
    }

    /// Remove every edge into `subscriber`.
    ///
    /// Called before a computation re-runs so that stale reads are dropped.
    pub fn clear_dependencies(subscriber: SubscriberId) {
        let mut edges = edges().write();
        let Some(sources) = edges.reads.remove(&subscriber) else {
            return;
        };
        for source in sources {
            if let Some(readers) = edges.readers.get_mut(&source) {
                readers.shift_remove(&subscriber);
                if readers.is_empty() {
                    edges.readers.remove(&source);
                }
            }
        }
    }

    /// Number of computations currently reading `source`.
    pub fn dependent_count(source: SourceId) -> usize {
        edges()
            .read()
            .readers
            .get(&source)
            .map_or(0, IndexSet::len)
    }

    /// Propagate a change of `source` to everything that read it.
    pub fn notify_source_change(source: SourceId) {
        let readers: Vec<SubscriberId> = match edges().read().readers.get(&source) {
            Some(readers) => readers.iter().copied().collect(),
            None => return,
        };

        let reactives: Vec<Arc<dyn Reactive>> = {
            let registry = registry().read();
            readers
                .iter()
                .filter_map(|id| registry.get(id).and_then(Weak::upgrade))
                .collect()
        };

        let mut eager = Vec::new();
        for reactive in reactives {
            reactive.mark_maybe_dirty();
            if reactive.is_eager() {
                eager.push(reactive);
            }
        }

        for effect in eager {
            tracing::trace!(subscriber = ?effect.subscriber_id(), source = source.raw(), "re-running effect");
            effect.schedule();
        }
    }

    /// The computation reads are currently attributed to, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Whether reads are currently tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
