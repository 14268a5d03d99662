//! Mutation interception.
//!
//! Application code supplies a table of raw mutations. The store never
//! hands those out; it hands out [`Mutation`] wrappers built lazily by
//! [`InterceptedMutations`], and every call through a wrapper runs the
//! lifecycle protocol:
//!
//! 1. `before` hooks of a snapshot of the subscribers, in order.
//! 2. The raw body, with the call's payload.
//! 3. Depending on what the body returned:
//!    - [`Completion::Ready`]: the loading flag is lowered and `after`
//!      hooks run before the call returns.
//!    - [`Completion::Deferred`]: the loading flag is raised before the
//!      call returns. When the future settles the flag is lowered, then
//!      `after` (fulfilled) or `error` (rejected) hooks run, then the
//!      original outcome is handed to whoever awaits the [`Pending`].
//!
//! A body that fails synchronously returns its error straight to the
//! caller. `before` has already run; neither `after` nor `error` runs and
//! the loading flag is left alone.
//!
//! Hooks are not guarded. A panicking `before` or synchronous `after` hook
//! unwinds out of the call; a panicking post-settlement hook unwinds out of
//! the settlement, which resumes the panic on the task awaiting the
//! [`Pending`].

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;
use tokio::task::JoinHandle;

use crate::reactive::{ReactiveObject, ReadSignal};

use super::error::MutationError;
use super::loading::{InFlight, LoadingFlag, LoadingTracker};
use super::registry::{MutationDescriptor, Phase, SubscriberRegistry};

/// Arguments of a mutation call.
pub type Payload = SmallVec<[Value; 4]>;

/// A mutation result that is not available yet.
pub type Deferred = BoxFuture<'static, Result<Value, MutationError>>;

/// What a raw mutation body returns on success.
pub enum Completion {
    /// The body finished; this is its result.
    Ready(Value),
    /// The body finishes when this future does.
    Deferred(Deferred),
}

impl Completion {
    pub fn ready(value: impl Into<Value>) -> Self {
        Self::Ready(value.into())
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, MutationError>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl From<Value> for Completion {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<()> for Completion {
    fn from(_: ()) -> Self {
        Self::Ready(Value::Null)
    }
}

/// A raw mutation body.
pub type RawMutation = Arc<dyn Fn(&Payload) -> Result<Completion, MutationError> + Send + Sync>;

/// The application's mutation table, before interception.
#[derive(Clone, Default)]
pub struct RawMutations {
    table: IndexMap<String, RawMutation>,
}

impl RawMutations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body that decides per call whether it completes now or
    /// later.
    pub fn insert<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&Payload) -> Result<Completion, MutationError> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(body));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Payload) -> Result<Completion, MutationError> + Send + Sync + 'static,
    {
        self.insert(name, body);
        self
    }

    /// Register a body that always completes synchronously.
    pub fn sync<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Payload) -> Result<Value, MutationError> + Send + Sync + 'static,
    {
        self.with(name, move |payload| body(payload).map(Completion::Ready))
    }

    /// Register a body that always completes through a future.
    pub fn deferred<F, Fut>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MutationError>> + Send + 'static,
    {
        self.with(name, move |payload| Ok(Completion::deferred(body(payload))))
    }

    pub fn get(&self, name: &str) -> Option<&RawMutation> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl std::fmt::Debug for RawMutations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

/// Outcome of calling a [`Mutation`].
pub enum Dispatch {
    /// The body completed synchronously; `after` hooks have run.
    Ready(Value),
    /// The body returned a future; the loading flag is up.
    Pending(Pending),
}

impl Dispatch {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The synchronous result, if there is one.
    pub fn ready_value(&self) -> Option<&Value> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }
}

impl IntoFuture for Dispatch {
    type Output = Result<Value, MutationError>;
    type IntoFuture = Pending;

    fn into_future(self) -> Pending {
        match self {
            Self::Ready(value) => Pending {
                inner: PendingInner::Settled(Some(Ok(value))),
            },
            Self::Pending(pending) => pending,
        }
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Handle on a deferred mutation call.
///
/// Resolves to exactly what the mutation's future resolved to, after the
/// loading flag has been lowered and the `after`/`error` hooks have run.
///
/// Inside a Tokio runtime the settlement is spawned when the call is made
/// and proceeds whether or not this handle is awaited or kept. Outside one,
/// the handle drives the settlement itself when polled; dropping it
/// unpolled abandons the call, which lowers the loading flag without
/// running any hooks. The flag is also lowered when the future panics or
/// its task is cancelled.
pub struct Pending {
    inner: PendingInner,
}

enum PendingInner {
    Spawned(JoinHandle<Result<Value, MutationError>>),
    Inline(Deferred),
    Settled(Option<Result<Value, MutationError>>),
}

impl Pending {
    fn start(settlement: Deferred) -> Self {
        let inner = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => PendingInner::Spawned(runtime.spawn(settlement)),
            Err(_) => PendingInner::Inline(settlement),
        };
        Self { inner }
    }

    /// Whether the settlement runs on its own task.
    pub fn is_detached(&self) -> bool {
        matches!(self.inner, PendingInner::Spawned(_))
    }
}

impl Future for Pending {
    type Output = Result<Value, MutationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            PendingInner::Spawned(handle) => match ready!(Pin::new(handle).poll(cx)) {
                Ok(outcome) => Poll::Ready(outcome),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Poll::Ready(Err(MutationError::Cancelled)),
            },
            PendingInner::Inline(settlement) => settlement.as_mut().poll(cx),
            PendingInner::Settled(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(outcome),
                None => Poll::Pending,
            },
        }
    }
}

/// An intercepted mutation.
///
/// Cheap to clone; clones call the same body and share the loading flag.
#[derive(Clone)]
pub struct Mutation {
    name: Arc<str>,
    raw: RawMutation,
    loading: LoadingFlag,
    subscribers: SubscriberRegistry,
    state: ReactiveObject,
}

impl Mutation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This mutation's loading flag.
    pub fn loading(&self) -> ReadSignal<bool> {
        self.loading.read_only()
    }

    /// Call the mutation.
    pub fn call<I>(&self, args: I) -> Result<Dispatch, MutationError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.call_with(args.into_iter().collect())
    }

    /// Call the mutation with a prepared payload.
    pub fn call_with(&self, payload: Payload) -> Result<Dispatch, MutationError> {
        let descriptor = Arc::new(MutationDescriptor {
            name: self.name.clone(),
            payload,
        });

        tracing::debug!(mutation = %self.name, args = descriptor.payload.len(), "dispatching mutation");
        self.subscribers.notify(Phase::Before, &descriptor, &self.state);

        let completion = match (self.raw)(&descriptor.payload) {
            Ok(completion) => completion,
            Err(err) => {
                tracing::debug!(mutation = %self.name, error = %err, "mutation failed synchronously");
                return Err(err);
            }
        };

        match completion {
            Completion::Ready(value) => {
                self.loading.finish_sync();
                self.subscribers.notify(Phase::After, &descriptor, &self.state);
                Ok(Dispatch::Ready(value))
            }
            Completion::Deferred(future) => {
                let call = self.loading.begin();
                let settlement = settle(
                    future,
                    descriptor,
                    call,
                    self.subscribers.clone(),
                    self.state.clone(),
                );
                Ok(Dispatch::Pending(Pending::start(settlement.boxed())))
            }
        }
    }
}

impl std::fmt::Debug for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("loading", &self.loading.read_only().get_untracked())
            .finish()
    }
}

async fn settle(
    future: Deferred,
    descriptor: Arc<MutationDescriptor>,
    call: InFlight,
    subscribers: SubscriberRegistry,
    state: ReactiveObject,
) -> Result<Value, MutationError> {
    let outcome = future.await;
    call.settle();

    match &outcome {
        Ok(_) => {
            tracing::debug!(mutation = %descriptor.name, "deferred mutation fulfilled");
            subscribers.notify(Phase::After, &descriptor, &state);
        }
        Err(err) => {
            tracing::debug!(mutation = %descriptor.name, error = %err, "deferred mutation rejected");
            subscribers.notify(Phase::Error, &descriptor, &state);
        }
    }
    outcome
}

/// The intercepted mutation table.
///
/// Wrappers are built on first access to a name and cached; names that are
/// not in the raw table yield `None` and build nothing.
#[derive(Clone)]
pub struct InterceptedMutations {
    raw: Arc<RawMutations>,
    cache: Arc<DashMap<String, Mutation>>,
    loading: Arc<LoadingTracker>,
    subscribers: SubscriberRegistry,
    state: ReactiveObject,
}

impl InterceptedMutations {
    /// Intercept `raw`, reporting to `subscribers` with `state`.
    pub fn wrap(
        raw: RawMutations,
        loading: Arc<LoadingTracker>,
        subscribers: SubscriberRegistry,
        state: ReactiveObject,
    ) -> Self {
        Self {
            raw: Arc::new(raw),
            cache: Arc::new(DashMap::new()),
            loading,
            subscribers,
            state,
        }
    }

    /// The wrapper for `name`.
    pub fn get(&self, name: &str) -> Option<Mutation> {
        if let Some(mutation) = self.cache.get(name) {
            return Some(mutation.value().clone());
        }

        let raw = self.raw.get(name)?.clone();
        let mutation = self
            .cache
            .entry(name.to_owned())
            .or_insert_with(|| Mutation {
                name: Arc::from(name),
                raw,
                loading: self.loading.cell_for(name),
                subscribers: self.subscribers.clone(),
                state: self.state.clone(),
            })
            .value()
            .clone();
        Some(mutation)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.raw.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.raw.names()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Number of wrappers built so far.
    pub fn materialized(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for InterceptedMutations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedMutations")
            .field("names", &self.raw)
            .field("materialized", &self.materialized())
            .finish()
    }
}
