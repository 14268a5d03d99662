//! Memo Implementation
//!
//! A Memo is a cached derived value. It is the store's getter primitive:
//! read-only, recomputed lazily from whatever it read last time.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation inside a tracking
//!    context and caches the result.
//!
//! 2. While clean, accesses return the cache.
//!
//! 3. When a source it read changes, the runtime marks it "maybe dirty" and
//!    the memo forwards the change to its own readers.
//!
//! 4. The next access recomputes.
//!
//! A memo nobody reads never recomputes.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::ids::{SourceId, SubscriberId};
use super::runtime::{Reactive, ReactiveHandle, Runtime};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed since the last computation.
    MaybeDirty,

    /// The memo must recompute (never computed, or forced).
    Dirty,
}

struct MemoInner<T> {
    source: SourceId,
    subscriber_id: SubscriberId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: RwLock<MemoState>,
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn recompute(&self) -> T {
        Runtime::clear_dependencies(self.subscriber_id);

        let value = {
            let _ctx = ReactiveContext::enter(self.subscriber_id);
            (self.compute)()
        };

        *self.value.write() = Some(value.clone());
        *self.state.write() = MemoState::Clean;
        value
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_maybe_dirty(&self) {
        let was_clean = {
            let mut state = self.state.write();
            let was_clean = *state == MemoState::Clean;
            if was_clean {
                *state = MemoState::MaybeDirty;
            }
            was_clean
        };
        if was_clean {
            Runtime::notify_source_change(self.source);
        }
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use cellar_core::reactive::{Memo, Signal};
///
/// let title = Signal::new("A".to_string());
/// let t = title.clone();
/// let double = Memo::new(move || t.get().repeat(2));
///
/// assert_eq!(double.get(), "AA");
/// title.set("B".to_string());
/// assert_eq!(double.get(), "BB");
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo. The computation runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            source: SourceId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Dirty),
        });
        let handle = Runtime::register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    /// ID under which readers of this memo are tracked.
    pub fn id(&self) -> SourceId {
        self.inner.source
    }

    /// Get the subscriber ID this memo tracks its own reads under.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        Runtime::track_read(self.inner.source);

        if self.state() == MemoState::Clean {
            if let Some(value) = self.inner.value.read().clone() {
                return value;
            }
        }
        self.inner.recompute()
    }

    /// Get the current value without registering the read.
    pub fn get_untracked(&self) -> T {
        super::context::untracked(|| self.get())
    }

    /// Force a recomputation on next access.
    pub fn mark_dirty(&self) {
        *self.inner.state.write() = MemoState::Dirty;
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.source.raw())
            .field("state", &self.state())
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn memo_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(!memo.has_value());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let memo = Memo::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(memo.get(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn memo_invalidates_when_signal_changes() {
        let signal = Signal::new(2);
        let s = signal.clone();
        let memo = Memo::new(move || s.get() * 10);

        assert_eq!(memo.get(), 20);
        assert_eq!(memo.state(), MemoState::Clean);

        signal.set(3);
        assert_eq!(memo.state(), MemoState::MaybeDirty);
        assert_eq!(memo.get(), 30);
        assert_eq!(memo.state(), MemoState::Clean);
    }

    #[test]
    fn memo_of_memo_follows_source() {
        let base = Signal::new(5);
        let b = base.clone();
        let doubled = Memo::new(move || b.get() * 2);
        let d = doubled.clone();
        let plus_ten = Memo::new(move || d.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(plus_ten.state(), MemoState::MaybeDirty);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn memo_state_transitions() {
        let memo = Memo::new(|| 42);

        assert_eq!(memo.state(), MemoState::Dirty);
        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);

        memo.mark_dirty();
        assert_eq!(memo.state(), MemoState::Dirty);
        memo.get();
        assert_eq!(memo.state(), MemoState::Clean);
    }
}
