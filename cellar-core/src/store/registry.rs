//! Subscriber registry.
//!
//! Subscribers observe the mutation lifecycle through up to three hooks:
//! `before` (every call, before the body runs), `after` (the body
//! completed, synchronously or by fulfilling its deferred result) and
//! `error` (the deferred result was rejected).
//!
//! The registry is an ordered list. A subscriber is identified by the
//! [`Subscriber`] handle itself: clones of one handle are the same
//! subscriber and are registered at most once. Notification walks a
//! snapshot of the list and never holds the lock while a hook runs, so
//! hooks may subscribe or unsubscribe freely; such changes take effect
//! from the next notification.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::reactive::{untracked, ReactiveObject};

use super::mutation::Payload;

/// What a hook is told about the call it observes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationDescriptor {
    /// Mutation name.
    #[serde(rename = "type")]
    pub name: Arc<str>,
    /// Arguments the mutation was called with.
    pub payload: Payload,
}

impl MutationDescriptor {
    /// The descriptor as JSON, `{"type": ..., "payload": [...]}`.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "type": &*self.name,
            "payload": self.payload.as_slice(),
        })
    }
}

/// A lifecycle hook. Receives the call descriptor and the writable state.
pub type Hook = Arc<dyn Fn(&MutationDescriptor, &ReactiveObject) + Send + Sync>;

/// Lifecycle stage a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
    Error,
}

/// The hooks of one subscriber. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<Hook>,
    after: Option<Hook>,
    error: Option<Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` before every mutation call.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&MutationDescriptor, &ReactiveObject) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Run `f` after a mutation completes.
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&MutationDescriptor, &ReactiveObject) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    /// Run `f` when a deferred mutation is rejected.
    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(&MutationDescriptor, &ReactiveObject) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    fn hook(&self, phase: Phase) -> Option<&Hook> {
        match phase {
            Phase::Before => self.before.as_ref(),
            Phase::After => self.after.as_ref(),
            Phase::Error => self.error.as_ref(),
        }
    }
}

/// A registered (or registrable) subscriber.
///
/// Cloning yields the same subscriber.
#[derive(Clone)]
pub struct Subscriber(Arc<Hooks>);

impl Subscriber {
    pub fn new(hooks: Hooks) -> Self {
        Self(Arc::new(hooks))
    }

    /// A subscriber with only a `before` hook.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&MutationDescriptor, &ReactiveObject) + Send + Sync + 'static,
    {
        Self::new(Hooks::new().before(f))
    }

    /// Whether two handles are the same subscriber.
    pub fn ptr_eq(&self, other: &Subscriber) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Hooks> for Subscriber {
    fn from(hooks: Hooks) -> Self {
        Self::new(hooks)
    }
}

impl From<&Subscriber> for Subscriber {
    fn from(subscriber: &Subscriber) -> Self {
        subscriber.clone()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("before", &self.0.before.is_some())
            .field("after", &self.0.after.is_some())
            .field("error", &self.0.error.is_some())
            .finish()
    }
}

/// Where a new subscriber goes in the notification order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Insert at the front instead of the back.
    pub prepend: bool,
}

impl SubscribeOptions {
    pub fn prepend() -> Self {
        Self { prepend: true }
    }
}

type List = RwLock<Vec<Subscriber>>;

/// Ordered, de-duplicated list of subscribers.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    list: Arc<List>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` unless it is already present.
    ///
    /// The returned disposer removes it again.
    pub fn subscribe(&self, subscriber: Subscriber, options: SubscribeOptions) -> Disposer {
        {
            let mut list = self.list.write();
            if !list.iter().any(|s| s.ptr_eq(&subscriber)) {
                if options.prepend {
                    list.insert(0, subscriber.clone());
                } else {
                    list.push(subscriber.clone());
                }
                tracing::trace!(count = list.len(), prepend = options.prepend, "subscriber added");
            }
        }

        Disposer {
            list: Arc::downgrade(&self.list),
            subscriber,
        }
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.list.read().clone()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `subscriber` is registered.
    pub fn contains(&self, subscriber: &Subscriber) -> bool {
        self.list.read().iter().any(|s| s.ptr_eq(subscriber))
    }

    /// Call the `phase` hook of every subscriber, in order.
    ///
    /// Hooks run untracked so that a mutation committed from inside an
    /// effect does not subscribe that effect to whatever the hooks read.
    /// A panicking hook is not caught.
    pub fn notify(&self, phase: Phase, descriptor: &MutationDescriptor, state: &ReactiveObject) {
        let snapshot = self.snapshot();
        untracked(|| {
            for subscriber in &snapshot {
                if let Some(hook) = subscriber.0.hook(phase) {
                    hook(descriptor, state);
                }
            }
        });
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.list.read().iter()).finish()
    }
}

/// Removes a subscriber from the registry it was added to.
///
/// Dropping a disposer does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Disposer {
    list: Weak<List>,
    subscriber: Subscriber,
}

impl Disposer {
    /// Remove the subscriber if it is still registered. Idempotent.
    pub fn dispose(&self) {
        let Some(list) = self.list.upgrade() else {
            return;
        };
        let mut list = list.write();
        if let Some(index) = list.iter().position(|s| s.ptr_eq(&self.subscriber)) {
            list.remove(index);
            tracing::trace!(count = list.len(), "subscriber removed");
        }
    }

    /// The subscriber this disposer removes.
    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }
}
