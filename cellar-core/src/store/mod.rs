//! The observable store.
//!
//! Components, leaf to root:
//!
//! - [`ReadOnlyView`]: state as seen from outside mutations.
//! - [`SubscriberRegistry`]: ordered, de-duplicated lifecycle observers.
//! - [`LoadingTracker`]: one loading flag per mutation name.
//! - [`InterceptedMutations`]: wraps every mutation in the
//!   before/after/error protocol.
//! - [`Store`]: assembles the above and applies plugins.

mod config;
mod error;
mod facade;
mod loading;
mod mutation;
mod plugin;
mod readonly;
mod registry;

pub use config::{Plugin, StoreConfig, StoreSettings};
pub use error::{MutationError, StoreError};
pub use facade::{create_store, Getters, Member, OwnMember, Store, StoreOptions, StoreSource};
pub use loading::{LoadingPolicy, LoadingTracker, Loadings};
pub use mutation::{
    Completion, Deferred, Dispatch, InterceptedMutations, Mutation, Payload, Pending, RawMutation,
    RawMutations,
};
pub use plugin::TracingPlugin;
pub use readonly::{ReadOnlyView, ViewEntry};
pub use registry::{
    Disposer, Hook, Hooks, MutationDescriptor, Phase, SubscribeOptions, Subscriber,
    SubscriberRegistry,
};
