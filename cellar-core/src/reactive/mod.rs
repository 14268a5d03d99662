//! Reactive Primitives
//!
//! The reactivity engine the store is built on: signals, memos, effects and
//! reactive objects. The store itself only needs four capabilities from
//! this module:
//!
//! - a mutable cell ([`Signal`]) and its read-only face ([`ReadSignal`]),
//!   used for loading flags;
//! - a derived value ([`Memo`]), used for getters;
//! - a deep-reactive map ([`ReactiveObject`]), used for application state;
//! - an effect scheduler ([`watch_effect`]), used by observers.
//!
//! # Implementation Notes
//!
//! Dependencies are collected automatically: a thread-local context stack
//! records which computation is running, and every tracked read registers
//! an edge with the process-wide [`Runtime`]. Writes propagate through the
//! runtime synchronously, so an effect has re-run by the time the write
//! that invalidated it returns.

mod context;
mod effect;
mod ids;
mod memo;
mod object;
mod runtime;
mod signal;

pub use context::{untracked, ReactiveContext};
pub use effect::{watch_effect, Effect};
pub use ids::{SourceId, SubscriberId};
pub use memo::{Memo, MemoState};
pub use object::{NotAnObject, ReactiveObject};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::{ReadSignal, Signal};
