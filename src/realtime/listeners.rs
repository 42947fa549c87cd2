use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use crate::domain::events::{
    ChatReadPush, ChatUpdatedPush, NewMessagePush, PresenceUpdate, TypingUpdate,
};

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Listener registry for one push-event type. Handlers are invoked in
/// registration order; the registry never deduplicates or reorders events.
pub(crate) struct EventRegistry<T> {
    entries: Mutex<Vec<(u64, Handler<T>)>>,
}

impl<T> Default for EventRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> EventRegistry<T> {
    fn locked(&self) -> MutexGuard<'_, Vec<(u64, Handler<T>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, id: u64, handler: Handler<T>) {
        self.locked().push((id, handler));
    }

    pub(crate) fn remove(&self, id: u64) {
        self.locked().retain(|(entry_id, _)| *entry_id != id);
    }

    /// Invokes every handler in registration order. The registry lock is
    /// held for the duration, so handlers must not register or detach
    /// listeners of the same event type.
    pub(crate) fn dispatch(&self, payload: &T) {
        for (_, handler) in self.locked().iter() {
            handler(payload);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locked().len()
    }
}

/// Per-event listener registries shared between the channel handle and its
/// reader task.
#[derive(Default)]
pub(crate) struct ListenerHub {
    next_id: AtomicU64,
    pub(crate) message: EventRegistry<NewMessagePush>,
    pub(crate) chat_updated: EventRegistry<ChatUpdatedPush>,
    pub(crate) chat_read: EventRegistry<ChatReadPush>,
    pub(crate) typing: EventRegistry<TypingUpdate>,
    pub(crate) presence: EventRegistry<PresenceUpdate>,
}

impl ListenerHub {
    /// Registers a handler on the registry chosen by `select` and returns
    /// the capability to detach it again.
    pub(crate) fn subscribe<T, F>(
        self: &Arc<Self>,
        select: for<'a> fn(&'a ListenerHub) -> &'a EventRegistry<T>,
        handler: F,
    ) -> Subscription
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        select(self).register(id, Box::new(handler));

        let hub = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(hub) = hub.upgrade() {
                select(&hub).remove(id);
            }
        })
    }
}

/// Capability to detach a registered push-event listener.
///
/// Detaches when dropped, so teardown is deterministic: components hold
/// their subscriptions and release them together.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Explicitly detaches the listener; equivalent to dropping the
    /// subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}
