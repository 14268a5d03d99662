//! Reactive Context
//!
//! The reactive context tracks which computation is currently running, so
//! that reading a signal can register that computation as a dependent.
//!
//! # Implementation
//!
//! A thread-local stack holds one frame per running computation. Running a
//! memo or effect pushes a frame; the guard pops it on drop, including on
//! unwind. Frames nest, so a memo that reads another memo attributes each
//! read to the innermost computation only.
//!
//! An *untracked* frame has no subscriber. Reads under it are not recorded,
//! which is how store hooks and snapshots read state without accidentally
//! subscribing the surrounding effect.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::ids::{SourceId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
struct Frame {
    subscriber_id: Option<SubscriberId>,
    /// Sources read while this frame was on top, in first-read order.
    dependencies: IndexSet<SourceId>,
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a context under which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber_id,
                dependencies: IndexSet::new(),
            });
        });
        Self { subscriber_id }
    }

    /// Whether reads are currently being attributed to a subscriber.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// The subscriber that reads are currently attributed to, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|frame| frame.subscriber_id))
    }

    /// Record a read of `source` in the innermost tracking frame.
    ///
    /// Returns `true` if the read was newly recorded.
    pub fn track_dependency(source: SourceId) -> bool {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().last_mut() {
            Some(frame) if frame.subscriber_id.is_some() => frame.dependencies.insert(source),
            _ => false,
        })
    }

    /// Sources read in the innermost frame so far.
    pub fn get_dependencies() -> Vec<SourceId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|frame| frame.dependencies.iter().copied().collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, frame.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        {
            let _ctx = ReactiveContext::enter(id);
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn repeated_reads_are_recorded_once() {
        let _ctx = ReactiveContext::enter(SubscriberId::new());
        let a = SourceId::new();
        let b = SourceId::new();

        assert!(ReactiveContext::track_dependency(a));
        assert!(ReactiveContext::track_dependency(b));
        assert!(!ReactiveContext::track_dependency(a));

        assert_eq!(ReactiveContext::get_dependencies(), vec![a, b]);
    }

    #[test]
    fn untracked_frame_hides_outer_subscriber() {
        let id = SubscriberId::new();
        let _ctx = ReactiveContext::enter(id);

        untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert!(!ReactiveContext::track_dependency(SourceId::new()));
        });

        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        assert!(ReactiveContext::get_dependencies().is_empty());
    }
}
