//! The store facade.
//!
//! [`create_store`] turns an options bundle (or a factory producing one)
//! into a [`Store`]: read-only state, getters, intercepted mutations,
//! loading flags and the subscriber registry behind one handle. Plugins
//! from the [`StoreConfig`] run against the assembled store before it is
//! returned.
//!
//! [`Store::lookup`] gives flat access across the store's namespaces. A
//! key resolves to the first match among state fields, getters, mutations
//! and finally the store's own members; [`Store::contains`] answers with
//! the same precedence.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::reactive::{Memo, ReactiveObject};

use super::config::StoreConfig;
use super::error::StoreError;
use super::loading::{LoadingTracker, Loadings};
use super::mutation::{Dispatch, InterceptedMutations, Mutation, RawMutations};
use super::readonly::{ReadOnlyView, ViewEntry};
use super::registry::{Disposer, SubscribeOptions, Subscriber, SubscriberRegistry};

/// Named derived values.
#[derive(Clone, Default)]
pub struct Getters {
    table: IndexMap<String, Memo<Value>>,
}

impl Getters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, getter: Memo<Value>) {
        self.table.insert(name.into(), getter);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, getter: Memo<Value>) -> Self {
        self.insert(name, getter);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Memo<Value>> {
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

impl fmt::Debug for Getters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

/// State, getters and mutations for one store.
pub struct StoreOptions {
    pub state: ReactiveObject,
    pub getters: Getters,
    pub mutations: RawMutations,
}

impl StoreOptions {
    pub fn new(state: ReactiveObject) -> Self {
        Self {
            state,
            getters: Getters::new(),
            mutations: RawMutations::new(),
        }
    }

    /// Options over fresh reactive state built from a JSON object.
    pub fn from_json(state: Value) -> Result<Self, StoreError> {
        Ok(Self::new(ReactiveObject::from_json(state)?))
    }

    pub fn getters(mut self, getters: Getters) -> Self {
        self.getters = getters;
        self
    }

    pub fn mutations(mut self, mutations: RawMutations) -> Self {
        self.mutations = mutations;
        self
    }
}

/// Where a store's options come from.
pub enum StoreSource {
    Options(StoreOptions),
    /// Called once, with no arguments, when the store is built. Lets each
    /// store create its own reactive primitives.
    Factory(Box<dyn FnOnce() -> StoreOptions + Send>),
}

impl StoreSource {
    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> StoreOptions + Send + 'static,
    {
        Self::Factory(Box::new(f))
    }

    fn resolve(self) -> StoreOptions {
        match self {
            Self::Options(options) => options,
            Self::Factory(factory) => factory(),
        }
    }
}

impl From<StoreOptions> for StoreSource {
    fn from(options: StoreOptions) -> Self {
        Self::Options(options)
    }
}

/// The store's own members, reachable through [`Store::lookup`] when no
/// state field, getter or mutation has the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnMember {
    State,
    Getters,
    Mutations,
    Loadings,
    Subscribe,
}

impl OwnMember {
    pub const ALL: [OwnMember; 5] = [
        Self::State,
        Self::Getters,
        Self::Mutations,
        Self::Loadings,
        Self::Subscribe,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Getters => "getters",
            Self::Mutations => "mutations",
            Self::Loadings => "loadings",
            Self::Subscribe => "subscribe",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|member| member.key() == key)
    }
}

/// Result of a flat lookup.
#[derive(Debug, Clone)]
pub enum Member {
    State(ViewEntry),
    Getter(Memo<Value>),
    Mutation(Mutation),
    Own(OwnMember),
}

impl Member {
    /// The value of a state field or getter.
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::State(entry) => Some(entry.clone().into_value()),
            Self::Getter(getter) => Some(getter.get()),
            Self::Mutation(_) | Self::Own(_) => None,
        }
    }

    pub fn as_mutation(&self) -> Option<&Mutation> {
        match self {
            Self::Mutation(mutation) => Some(mutation),
            _ => None,
        }
    }
}

struct StoreInner {
    state: ReadOnlyView,
    getters: Getters,
    mutations: InterceptedMutations,
    loadings: Loadings,
    subscribers: SubscriberRegistry,
}

/// An observable store. Clones are handles to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Build a store and run the configured plugins against it.
pub fn create_store(config: &StoreConfig, source: impl Into<StoreSource>) -> Store {
    let StoreOptions {
        state: raw_state,
        getters,
        mutations: raw_mutations,
    } = source.into().resolve();

    let state = ReadOnlyView::wrap(raw_state.clone()).warn_on_write(config.settings.log_rejected_writes);

    let tracker = Arc::new(LoadingTracker::new(config.settings.loading_policy));
    let loadings = tracker.loadings(raw_mutations.names());

    let subscribers = SubscriberRegistry::new();
    let mutations = InterceptedMutations::wrap(raw_mutations, tracker, subscribers.clone(), raw_state);

    let store = Store {
        inner: Arc::new(StoreInner {
            state,
            getters,
            mutations,
            loadings,
            subscribers,
        }),
    };

    for plugin in config.plugins() {
        tracing::debug!(plugin = plugin.name(), "applying plugin");
        plugin.apply(&store);
    }

    tracing::debug!(
        getters = store.inner.getters.len(),
        mutations = store.inner.mutations.len(),
        subscribers = store.inner.subscribers.len(),
        "store created"
    );
    store
}

impl Store {
    /// Read-only application state.
    pub fn state(&self) -> &ReadOnlyView {
        &self.inner.state
    }

    pub fn getters(&self) -> &Getters {
        &self.inner.getters
    }

    pub fn mutations(&self) -> &InterceptedMutations {
        &self.inner.mutations
    }

    /// Loading flags of the mutations the store was built with.
    pub fn loadings(&self) -> &Loadings {
        &self.inner.loadings
    }

    /// Observe mutation calls.
    ///
    /// Takes a [`Hooks`](super::registry::Hooks) record or a [`Subscriber`].
    /// A single function is subscribed as a `before` hook by wrapping it
    /// with [`Subscriber::from_fn`]. Subscribing an already registered
    /// subscriber is a no-op.
    pub fn subscribe(&self, subscriber: impl Into<Subscriber>, options: SubscribeOptions) -> Disposer {
        self.inner.subscribers.subscribe(subscriber.into(), options)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// The intercepted mutation `name`.
    pub fn mutation(&self, name: &str) -> Option<Mutation> {
        self.inner.mutations.get(name)
    }

    /// The getter `name`.
    pub fn getter(&self, name: &str) -> Option<&Memo<Value>> {
        self.inner.getters.get(name)
    }

    /// Call mutation `name` with `args`.
    ///
    /// Errors raised while dispatching come back as [`StoreError`]: an
    /// unknown name, or a body that failed synchronously (wrapped with the
    /// mutation's name). A deferred body's rejection is not a dispatch
    /// error; it is the output of the returned [`Dispatch`], as the bare
    /// [`MutationError`](super::error::MutationError) the body produced.
    pub fn commit<I>(&self, name: &str, args: I) -> Result<Dispatch, StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mutation = self
            .mutation(name)
            .ok_or_else(|| StoreError::UnknownMutation(name.to_owned()))?;
        mutation.call(args).map_err(|source| StoreError::Mutation {
            name: name.to_owned(),
            source,
        })
    }

    /// Resolve `key` across state, getters, mutations and own members.
    pub fn lookup(&self, key: &str) -> Option<Member> {
        let inner = &self.inner;
        if inner.state.contains_key(key) {
            return inner.state.get(key).map(Member::State);
        }
        if let Some(getter) = inner.getters.get(key) {
            return Some(Member::Getter(getter.clone()));
        }
        if let Some(mutation) = inner.mutations.get(key) {
            return Some(Member::Mutation(mutation));
        }
        OwnMember::from_key(key).map(Member::Own)
    }

    /// Whether [`lookup`](Self::lookup) would find `key`.
    pub fn contains(&self, key: &str) -> bool {
        let inner = &self.inner;
        inner.state.contains_key(key)
            || inner.getters.contains(key)
            || inner.mutations.contains(key)
            || OwnMember::from_key(key).is_some()
    }

    /// Value of a state field or getter reached through [`lookup`](Self::lookup).
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).and_then(|member| member.value())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state)
            .field("getters", &self.inner.getters)
            .field("mutations", &self.inner.mutations)
            .field("loadings", &self.inner.loadings)
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::registry::Hooks;
    use parking_lot::Mutex;
    use serde_json::json;

    fn article() -> StoreOptions {
        let state = ReactiveObject::from_json(json!({"title": "A", "mutations": "shadow"})).unwrap();
        let s = state.clone();
        let getters = Getters::new().with(
            "double",
            Memo::new(move || {
                let title = s.get("title").and_then(|t| t.as_str().map(str::to_owned)).unwrap_or_default();
                json!(title.repeat(2))
            }),
        );
        let s = state.clone();
        let mutations = RawMutations::new().sync("SET_TITLE", move |args| {
            s.set("title", args.first().cloned().unwrap_or(Value::Null));
            Ok(Value::Null)
        });
        StoreOptions::new(state).getters(getters).mutations(mutations)
    }

    #[test]
    fn flat_lookup_follows_precedence() {
        let store = create_store(&StoreConfig::new(), article());

        assert_eq!(store.get("title"), store.state().get_value("title"));
        assert_eq!(store.get("double"), Some(json!("AA")));
        assert!(store.lookup("SET_TITLE").unwrap().as_mutation().is_some());
        assert!(matches!(store.lookup("loadings"), Some(Member::Own(OwnMember::Loadings))));
        // a state field shadows the own member of the same name
        assert_eq!(store.get("mutations"), Some(json!("shadow")));
        assert!(store.lookup("nothing").is_none());
    }

    #[test]
    fn contains_agrees_with_lookup() {
        let store = create_store(&StoreConfig::new(), article());
        for key in ["title", "double", "SET_TITLE", "subscribe", "mutations", "nothing"] {
            assert_eq!(store.contains(key), store.lookup(key).is_some(), "{key}");
        }
    }

    #[test]
    fn factory_runs_once_per_store() {
        let config = StoreConfig::new();
        let a = create_store(&config, StoreSource::factory(article));
        let b = create_store(&config, StoreSource::factory(article));

        a.commit("SET_TITLE", [json!("changed")]).unwrap();
        assert_eq!(a.get("title"), Some(json!("changed")));
        assert_eq!(b.get("title"), Some(json!("A")));
    }

    #[test]
    fn loadings_cover_every_mutation() {
        let store = create_store(&StoreConfig::new(), article());
        assert_eq!(store.loadings().names().collect::<Vec<_>>(), vec!["SET_TITLE"]);

        let flag = store.loadings().get("SET_TITLE").unwrap();
        assert_eq!(flag.id(), store.mutation("SET_TITLE").unwrap().loading().id());
    }

    #[test]
    fn plugins_can_subscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let config = StoreConfig::new().plugin(move |store: &Store| {
            let l = l.clone();
            store.subscribe(
                Hooks::new().after(move |m, _| l.lock().push(m.payload.to_vec())),
                SubscribeOptions::default(),
            );
        });

        let store = create_store(&config, article());
        assert_eq!(store.subscriber_count(), 1);

        store.commit("SET_TITLE", [json!("B")]).unwrap();
        assert_eq!(*log.lock(), vec![vec![json!("B")]]);
    }

    #[test]
    fn commit_reports_unknown_and_failed_mutations() {
        let store = create_store(
            &StoreConfig::new(),
            article().mutations(RawMutations::new().sync("FAIL", |_| Err(crate::MutationError::msg("no")))),
        );

        assert!(matches!(
            store.commit("SET_TITLE", Vec::new()),
            Err(StoreError::UnknownMutation(name)) if name == "SET_TITLE"
        ));
        assert!(matches!(
            store.commit("FAIL", Vec::new()),
            Err(StoreError::Mutation { name, .. }) if name == "FAIL"
        ));
    }

    #[test]
    fn deferred_rejection_is_the_dispatch_output() {
        use futures_util::FutureExt;
        use std::future::IntoFuture;

        let store = create_store(
            &StoreConfig::new(),
            article().mutations(
                RawMutations::new()
                    .deferred("SAVE", |_| async { Err::<Value, _>(crate::MutationError::msg("offline")) }),
            ),
        );

        let dispatch = store.commit("SAVE", Vec::new()).unwrap();
        let outcome = dispatch.into_future().now_or_never().unwrap();
        assert!(matches!(outcome, Err(crate::MutationError::Message(message)) if message == "offline"));
    }

    #[test]
    fn single_function_subscribes_before_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let store = create_store(&StoreConfig::new(), article());
        store.subscribe(
            Subscriber::from_fn(move |m, _| l.lock().push(m.name.to_string())),
            SubscribeOptions::prepend(),
        );

        store.commit("SET_TITLE", [json!("B")]).unwrap();
        assert_eq!(*log.lock(), vec!["SET_TITLE".to_owned()]);
    }
}
