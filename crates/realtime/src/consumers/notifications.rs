//! Notification center
//!
//! Listens for inbox events on the shared relay. A `notification:new` event
//! carries no list data, so the center asks its owner to refetch over REST.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use lotline_shared::{Message, MessageKind};

use crate::websocket::{ListenerHandle, Relay};

#[derive(Debug, Default)]
struct InboxCounters {
    notifications: AtomicU32,
    chat_messages: AtomicU32,
}

/// Inbox badge state fed by the relay. Detaches when dropped.
#[derive(Debug)]
pub struct NotificationCenter {
    counters: Arc<InboxCounters>,
    listener: ListenerHandle,
}

impl NotificationCenter {
    /// Connect the relay if needed and start listening.
    ///
    /// `on_refresh` runs for every `notification:new` event.
    pub fn attach<F>(relay: &Relay, on_refresh: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        relay.connect();

        let counters = Arc::new(InboxCounters::default());
        let listener_counters = Arc::clone(&counters);
        let listener = relay.subscribe(move |message: &Message| match message.kind {
            MessageKind::NotificationNew => {
                listener_counters
                    .notifications
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!(user_id = ?message.user_id, "New notification, refreshing");
                on_refresh();
            }
            MessageKind::ChatMessageNew | MessageKind::ShopMessageNew => {
                listener_counters
                    .chat_messages
                    .fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        });

        Self { counters, listener }
    }

    /// Notifications received since the last `mark_seen`
    pub fn unseen_notifications(&self) -> u32 {
        self.counters.notifications.load(Ordering::Relaxed)
    }

    /// Chat and shop messages received since the last `mark_seen`
    pub fn unseen_messages(&self) -> u32 {
        self.counters.chat_messages.load(Ordering::Relaxed)
    }

    pub fn mark_seen(&self) {
        self.counters.notifications.store(0, Ordering::Relaxed);
        self.counters.chat_messages.store(0, Ordering::Relaxed);
    }

    /// Stop listening; the relay connection stays up for other consumers
    pub fn detach(&self) {
        self.listener.unsubscribe();
    }
}
