//! Cellar Core
//!
//! An observable state container. A store wraps application state, derived
//! values ("getters") and state-changing operations ("mutations") behind
//! one handle, and makes every mutation call observable:
//!
//! - subscribers are told before each call, after it completes, and when a
//!   deferred call is rejected;
//! - each mutation carries a loading flag that is up while a deferred call
//!   is in flight;
//! - state is read-only from outside mutations.
//!
//! # Architecture
//!
//! - `reactive`: signals, memos, effects and reactive objects; the
//!   reactivity engine the store is built on
//! - `store`: read-only views, the subscriber registry, loading flags,
//!   mutation interception and the store facade
//!
//! # Example
//!
//! ```rust
//! use cellar_core::reactive::ReactiveObject;
//! use cellar_core::{create_store, RawMutations, StoreConfig, StoreOptions};
//! use serde_json::{json, Value};
//!
//! let state = ReactiveObject::from_json(json!({"count": 0})).unwrap();
//! let s = state.clone();
//! let mutations = RawMutations::new().sync("INCREMENT", move |_| {
//!     s.update("count", |n| *n = json!(n.as_i64().unwrap_or(0) + 1));
//!     Ok(Value::Null)
//! });
//!
//! let store = create_store(&StoreConfig::new(), StoreOptions::new(state).mutations(mutations));
//! store.commit("INCREMENT", []).unwrap();
//!
//! assert_eq!(store.get("count"), Some(json!(1)));
//! assert!(!store.loadings().is_loading("INCREMENT"));
//! ```

pub mod reactive;
pub mod store;

pub use store::{
    create_store, Completion, Dispatch, Getters, Hooks, LoadingPolicy, Mutation,
    MutationDescriptor, MutationError, Pending, Plugin, RawMutations, Store, StoreConfig,
    StoreError, StoreOptions, StoreSettings, StoreSource, SubscribeOptions, Subscriber,
    TracingPlugin,
};
