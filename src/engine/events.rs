//! Publish/subscribe for engine notifications.
//!
//! Each component that emits events owns a `Notifier` for its own event type.
//! Listeners run synchronously on whichever context triggers the event, which
//! may be the audio callback: keep them short and non-blocking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Token returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// Fire-and-forget event fan-out.
///
/// The listener list is swapped atomically, so `notify` never takes a lock.
pub struct Notifier<E> {
    listeners: ArcSwap<Vec<(Subscription, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> Notifier<E> {
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener<E> = Arc::new(listener);
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push((id, listener.clone()));
            next
        });
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut removed = false;
        self.listeners.rcu(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|(id, _)| *id != subscription)
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    pub fn notify(&self, event: &E) {
        let listeners = self.listeners.load();
        for (_, listener) in listeners.iter() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
