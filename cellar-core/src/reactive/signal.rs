//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive: a shared, mutable cell
//! that remembers which computations read it.
//!
//! # How Signals Work
//!
//! 1. Reading a signal inside a memo or effect records the dependency with
//!    the runtime.
//!
//! 2. Writing a signal asks the runtime to propagate the change; effects
//!    that read it re-run before `set` returns.
//!
//! Clones share the same cell. [`ReadSignal`] is the read-only face of a
//! signal, handed out where callers may observe but not write.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::ids::SourceId;
use super::runtime::Runtime;

/// A reactive cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use cellar_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: SourceId,
    value: Arc<RwLock<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: SourceId::new(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        Runtime::track_read(self.id);
        self.value.read().clone()
    }

    /// Get the current value without tracking the read.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track_read(self.id);
        f(&self.value.read())
    }

    /// Set a new value and notify dependents.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        Runtime::notify_source_change(self.id);
    }

    /// Replace the value with one derived from the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.read());
        self.set(next);
    }

    /// Mutate the value in place and notify dependents.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        f(&mut self.value.write());
        Runtime::notify_source_change(self.id);
    }

    /// A read-only handle onto the same cell.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            inner: self.clone(),
        }
    }

    /// Number of computations currently reading this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::dependent_count(self.id)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id.raw())
            .field("value", &self.get_untracked())
            .finish()
    }
}

/// Read-only view of a [`Signal`].
pub struct ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Signal<T>,
}

impl<T> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// ID of the underlying cell.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Get the current value without tracking the read.
    pub fn get_untracked(&self) -> T {
        self.inner.get_untracked()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.with(f)
    }
}

impl<T> Clone for ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for ReadSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.inner).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update_and_modify() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);

        let list = Signal::new(vec![1, 2]);
        list.modify(|v| v.push(3));
        assert_eq!(list.get(), vec![1, 2, 3]);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn read_only_handle_follows_writes() {
        let signal = Signal::new(false);
        let flag = signal.read_only();

        assert!(!flag.get());
        signal.set(true);
        assert!(flag.get());
        assert_eq!(flag.id(), signal.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        assert_ne!(s1.id(), s2.id());
    }
}
