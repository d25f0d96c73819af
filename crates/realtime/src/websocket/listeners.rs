//! Listener registry and fan-out
//!
//! Listeners are invoked in registration order. Dispatch runs on a snapshot
//! taken outside the lock, so a listener may register or remove listeners
//! (or call back into the relay) without deadlocking. Each invocation is
//! isolated: a panicking listener is logged and the remaining listeners
//! still receive the message.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use lotline_shared::Message;

/// Consumer callback invoked for every inbound message
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Registration id, unique per relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push((id, listener));

        tracing::debug!(
            listener_id = %id,
            listener_count = entries.len(),
            "Realtime listener registered"
        );
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() < before;

        if removed {
            tracing::debug!(
                listener_id = %id,
                listener_count = entries.len(),
                "Realtime listener removed"
            );
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn snapshot(&self) -> Vec<(ListenerId, Listener)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver a message to every listener; returns how many returned normally
    pub(crate) fn dispatch(&self, message: &Message) -> usize {
        let mut delivered = 0;

        for (id, listener) in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| listener(message))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(
                        listener_id = %id,
                        kind = %message.kind,
                        "Realtime listener panicked, continuing delivery"
                    );
                }
            }
        }

        delivered
    }
}

/// Registration guard returned by `Relay::subscribe`.
///
/// `unsubscribe` removes exactly this listener and is a no-op after the
/// first call. Dropping the handle unsubscribes as well.
#[must_use = "dropping a ListenerHandle unregisters the listener"]
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
    active: AtomicBool,
}

impl ListenerHandle {
    pub(crate) fn new(id: ListenerId, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
