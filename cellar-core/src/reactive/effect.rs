//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a source
//! it read on its previous run changes. It is how UI-like observers bind to
//! store state, getters and loading flags.
//!
//! # How Effects Work
//!
//! 1. On creation the effect runs once to collect its dependencies.
//!
//! 2. When any dependency changes, the runtime re-runs it synchronously,
//!    inside the `set` that caused the change.
//!
//! 3. Every run starts by dropping the previous run's dependencies, so an
//!    effect only follows what it actually read last time.
//!
//! A write from inside the effect to a source the effect itself reads does
//! not re-enter it; the write is seen on the next run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::context::ReactiveContext;
use super::ids::SubscriberId;
use super::runtime::{Reactive, ReactiveHandle, Runtime};

struct EffectInner {
    subscriber_id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    disposed: AtomicBool,
    running: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let _running = Running(&self.running);

        Runtime::clear_dependencies(self.subscriber_id);
        {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.run)();
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clears the re-entrancy flag when a run ends, including by panic.
struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {}

    fn schedule(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// The effect stays alive as long as any clone of it does. Dropping the
/// last clone stops it.
///
/// # Example
///
/// ```rust
/// use cellar_core::reactive::{Effect, Signal};
/// use std::sync::{Arc, Mutex};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let (c, s) = (count.clone(), seen.clone());
/// let _effect = Effect::new(move || s.lock().unwrap().push(c.get()));
///
/// count.set(5);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
    _handle: Arc<ReactiveHandle>,
}

impl Effect {
    /// Create an effect and run it immediately to establish dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create an effect without running it.
    ///
    /// It has no dependencies until the first [`execute`](Self::execute).
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            subscriber_id: SubscriberId::new(),
            run: Box::new(run),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });
        let handle = Runtime::register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect now, re-collecting its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect. It will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        Runtime::clear_dependencies(self.inner.subscriber_id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run `f` now and again whenever a source it read changes.
///
/// Shorthand for [`Effect::new`].
pub fn watch_effect<F>(f: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(f)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
