//! Typed event channel.
//!
//! Scenes publish state-change notifications (resource loaded/failed,
//! recompile scheduled, frame aborted) through a typed channel instead of
//! an ad hoc handle map. `subscribe` returns a [`Subscription`] token that
//! unsubscribes when dropped, so listeners cannot leak.
//!
//! The engine is single-threaded; the channel uses `Rc<RefCell<..>>`
//! internally and `flume` receivers as the listener endpoints.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    struct SubscriberKey;
}

struct Inner<T> {
    subscribers: SlotMap<SubscriberKey, flume::Sender<T>>,
}

/// A typed broadcast channel scoped to one Scene.
pub struct EventChannel<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EventChannel<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                subscribers: SlotMap::with_key(),
            })),
        }
    }

    /// Registers a listener.
    ///
    /// Events published after this call are delivered to the returned
    /// receiver. Dropping the [`Subscription`] removes the listener;
    /// dropping only the receiver has the same effect on the next publish.
    #[must_use]
    pub fn subscribe(&self) -> (Subscription<T>, flume::Receiver<T>) {
        let (tx, rx) = flume::unbounded();
        let key = self.inner.borrow_mut().subscribers.insert(tx);
        (
            Subscription {
                inner: Rc::clone(&self.inner),
                key,
            },
            rx,
        )
    }

    /// Delivers an event to every live subscriber.
    ///
    /// Subscribers whose receiver has been dropped are pruned here.
    pub fn publish(&self, event: &T) {
        let mut inner = self.inner.borrow_mut();
        inner
            .subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers, for diagnostics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

/// Owned subscription token. Dropping it unsubscribes.
pub struct Subscription<T> {
    inner: Rc<RefCell<Inner<T>>>,
    key: SubscriberKey,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.borrow_mut().subscribers.remove(self.key);
    }
}
