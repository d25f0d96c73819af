//! Realtime relay
//!
//! Owns at most one live transport and at most one pending reconnect timer,
//! never both. Every call on `Relay` returns immediately; transport events
//! are handled by a driver task per transport, so listeners see messages in
//! the order they arrived on the wire.
//!
//! Failures never reach callers: a missing token makes `connect` a no-op,
//! malformed frames are dropped, sends without a transport are dropped with a
//! warning, and an unexpected close schedules a reconnect.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use lotline_shared::{EntityId, Message};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::credentials::{CredentialSource, SessionToken};
use super::endpoint;
use super::listeners::{ListenerHandle, ListenerRegistry};
use super::reconnect::Backoff;
use super::transport::{CloseInfo, Transport, TransportEvent, WebSocketTransport};
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no reconnect scheduled
    Idle,
    /// A transport exists (its handshake may still be in flight)
    Open,
    /// Waiting for the reconnect timer
    ReconnectPending,
}

/// Handle to the shared realtime connection.
///
/// Cheap to clone; all clones drive the same connection. Build one per
/// session and hand clones to every consumer.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    endpoint: Url,
    redeclare_topics: bool,
    credentials: Arc<dyn CredentialSource>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
    listeners: Arc<ListenerRegistry>,
    shared: Mutex<SharedState>,
}

struct SharedState {
    /// Incremented for every transport; events from older ones are ignored
    generation: u64,
    link: Option<Link>,
    reconnect: Option<PendingReconnect>,
    backoff: Backoff,
    /// Declared auction topics, only tracked when re-declaration is on
    topics: BTreeSet<EntityId>,
}

struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
}

struct PendingReconnect {
    /// Generation of the transport whose close scheduled this timer
    generation: u64,
    handle: JoinHandle<()>,
}

impl Relay {
    pub fn builder(config: RelayConfig) -> RelayBuilder {
        RelayBuilder {
            config,
            credentials: None,
            transport: None,
            runtime: None,
        }
    }

    /// Open the connection if there is none and a session token is available
    pub fn connect(&self) {
        let Some(token) = self.inner.credentials.token() else {
            tracing::debug!("No session token, skipping realtime connect");
            return;
        };

        let mut shared = self.inner.lock();
        if shared.link.is_some() {
            return;
        }
        if let Some(pending) = shared.reconnect.take() {
            pending.handle.abort();
        }

        shared.generation += 1;
        let generation = shared.generation;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        shared.link = Some(Link {
            generation,
            outbound: outbound_tx,
        });
        let attempt = shared.backoff.attempts();
        drop(shared);

        tracing::info!(
            generation,
            attempt,
            endpoint = %self.inner.endpoint,
            "Opening realtime connection"
        );

        let url = endpoint::with_token(&self.inner.endpoint, &token);
        let _runtime = self.inner.runtime.enter();
        self.inner.transport.open(url, outbound_rx, events_tx);
        self.inner.runtime.spawn(drive_transport(
            Arc::downgrade(&self.inner),
            generation,
            events_rx,
        ));
    }

    /// Queue a message on the live transport.
    ///
    /// Returns `false` when there is no transport; the message is dropped.
    pub fn send(&self, message: &Message) -> bool {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(kind = %message.kind, error = %e, "Failed to encode realtime message");
                return false;
            }
        };

        let shared = self.inner.lock();
        let Some(link) = shared.link.as_ref() else {
            tracing::warn!(kind = %message.kind, "Realtime connection not open, message dropped");
            return false;
        };

        match link.outbound.send(frame) {
            Ok(()) => {
                tracing::trace!(generation = link.generation, kind = %message.kind, "Realtime message queued");
                true
            }
            Err(_) => {
                tracing::warn!(
                    generation = link.generation,
                    kind = %message.kind,
                    "Realtime transport already gone, message dropped"
                );
                false
            }
        }
    }

    /// Register a listener for every future inbound message.
    ///
    /// Does not connect. The listener stays registered across reconnects until
    /// the returned handle is unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(Arc::new(listener));
        ListenerHandle::new(id, &self.inner.listeners)
    }

    /// Ask the server for one auction's events
    pub fn subscribe_to_auction(&self, auction_id: impl Into<EntityId>) -> bool {
        let auction_id = auction_id.into();
        if self.inner.redeclare_topics {
            self.inner.lock().topics.insert(auction_id.clone());
        }
        tracing::debug!(auction_id = %auction_id, "Subscribing to auction");
        self.send(&Message::subscribe(auction_id))
    }

    /// Stop receiving one auction's events
    pub fn unsubscribe_from_auction(&self, auction_id: impl Into<EntityId>) -> bool {
        let auction_id = auction_id.into();
        if self.inner.redeclare_topics {
            self.inner.lock().topics.remove(&auction_id);
        }
        tracing::debug!(auction_id = %auction_id, "Unsubscribing from auction");
        self.send(&Message::unsubscribe(auction_id))
    }

    /// Close the transport and cancel any pending reconnect.
    ///
    /// Listeners stay registered for the next `connect`.
    pub fn disconnect(&self) {
        let mut shared = self.inner.lock();
        let link = shared.link.take();
        if let Some(pending) = shared.reconnect.take() {
            pending.handle.abort();
            tracing::debug!(
                generation = pending.generation,
                "Cancelled pending realtime reconnect"
            );
        }
        shared.backoff.reset();
        drop(shared);

        // Dropping the outbound sender tells the transport to close
        if let Some(link) = link {
            tracing::info!(generation = link.generation, "Realtime connection closed by client");
        }
    }

    pub fn state(&self) -> ConnectionState {
        let shared = self.inner.lock();
        if shared.link.is_some() {
            ConnectionState::Open
        } else if shared.reconnect.is_some() {
            ConnectionState::ReconnectPending
        } else {
            ConnectionState::Idle
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    fn from_inner(inner: Arc<RelayInner>) -> Self {
        Self { inner }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner
            .lock()
            .link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    fn handle_open(&self, generation: u64) {
        let mut shared = self.inner.lock();
        // disconnect() + connect() may have replaced the link since the driver checked
        let Some(link) = shared
            .link
            .as_ref()
            .filter(|link| link.generation == generation)
        else {
            return;
        };

        let mut greeting = vec![Message::ping()];
        if self.inner.redeclare_topics && !shared.topics.is_empty() {
            tracing::debug!(generation, topic_count = shared.topics.len(), "Re-declaring auction subscriptions");
            greeting.extend(shared.topics.iter().cloned().map(Message::subscribe));
        }

        // Queued on this link only, never on a replacement
        for message in &greeting {
            match message.to_frame() {
                Ok(frame) => {
                    let _ = link.outbound.send(frame);
                }
                Err(e) => {
                    tracing::error!(kind = %message.kind, error = %e, "Failed to encode realtime message");
                }
            }
        }
        shared.backoff.reset();
        drop(shared);

        tracing::info!(generation, "Realtime connection open");
    }

    fn handle_frame(&self, generation: u64, frame: &str) {
        let message = match Message::parse(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(generation, error = %e, "Dropping malformed realtime frame");
                return;
            }
        };

        let delivered = self.inner.listeners.dispatch(&message);
        tracing::trace!(generation, kind = %message.kind, delivered, "Realtime message dispatched");
    }

    fn handle_close(&self, generation: u64, close: CloseInfo) {
        let mut shared = self.inner.lock();
        if !shared
            .link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
        {
            return;
        }
        shared.link = None;
        debug_assert!(
            shared.reconnect.is_none(),
            "reconnect timer must not coexist with a live transport"
        );

        match shared.backoff.next_delay() {
            Some(delay) => {
                tracing::warn!(
                    generation,
                    code = ?close.code,
                    reason = %close.reason,
                    delay_ms = delay.as_millis() as u64,
                    "Realtime connection closed unexpectedly, scheduling reconnect"
                );
                let handle = self.inner.runtime.spawn(reconnect_after(
                    Arc::downgrade(&self.inner),
                    generation,
                    delay,
                ));
                shared.reconnect = Some(PendingReconnect { generation, handle });
            }
            None => {
                tracing::warn!(
                    generation,
                    attempts = shared.backoff.attempts(),
                    code = ?close.code,
                    reason = %close.reason,
                    "Realtime connection closed, reconnect attempts exhausted"
                );
            }
        }
    }

    fn fire_reconnect(&self, generation: u64) {
        {
            let mut shared = self.inner.lock();
            match shared.reconnect.as_ref() {
                Some(pending) if pending.generation == generation => {
                    shared.reconnect = None;
                }
                // Cancelled or superseded
                _ => return,
            }
        }

        self.connect();
        if self.state() == ConnectionState::Idle {
            tracing::info!(generation, "Realtime reconnect skipped, no session token");
        }
    }
}

impl RelayInner {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Consume one transport's events until it closes or is replaced
async fn drive_transport(
    inner: Weak<RelayInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let relay = Relay::from_inner(inner);
        if !relay.is_current(generation) {
            tracing::trace!(generation, "Ignoring events from a released transport");
            return;
        }

        match event {
            TransportEvent::Opened => relay.handle_open(generation),
            TransportEvent::Frame(frame) => relay.handle_frame(generation, &frame),
            TransportEvent::Binary(len) => {
                tracing::warn!(generation, bytes = len, "Dropping binary realtime frame");
            }
            TransportEvent::Error(error) => {
                tracing::warn!(generation, error = %error, "Realtime transport error");
            }
            TransportEvent::Closed(close) => {
                relay.handle_close(generation, close);
                return;
            }
        }
    }

    // Transport went away without reporting a close
    if let Some(inner) = inner.upgrade() {
        Relay::from_inner(inner)
            .handle_close(generation, CloseInfo::new(None, "transport dropped"));
    }
}

async fn reconnect_after(inner: Weak<RelayInner>, generation: u64, delay: Duration) {
    tokio::time::sleep(delay).await;
    if let Some(inner) = inner.upgrade() {
        Relay::from_inner(inner).fire_reconnect(generation);
    }
}

/// Builder for [`Relay`]
pub struct RelayBuilder {
    config: RelayConfig,
    credentials: Option<Arc<dyn CredentialSource>>,
    transport: Option<Arc<dyn Transport>>,
    runtime: Option<Handle>,
}

impl RelayBuilder {
    /// Where the session token comes from; defaults to an empty `SessionToken`
    pub fn credentials(mut self, credentials: impl CredentialSource) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    /// Network transport; defaults to `WebSocketTransport`
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Runtime that drives transports and timers; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> RelayResult<Relay> {
        let endpoint = endpoint::derive(&self.config.api_url)?;
        // The default transport can only reach wss:// with a TLS backend compiled in
        if self.transport.is_none() && endpoint.scheme() == "wss" && !cfg!(feature = "native-tls")
        {
            return Err(RelayError::TlsUnavailable(endpoint.to_string()));
        }
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| RelayError::NoRuntime)?,
        };

        Ok(Relay::from_inner(Arc::new(RelayInner {
            endpoint,
            redeclare_topics: self.config.redeclare_topics,
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(SessionToken::new())),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(WebSocketTransport)),
            runtime,
            listeners: Arc::new(ListenerRegistry::default()),
            shared: Mutex::new(SharedState {
                generation: 0,
                link: None,
                reconnect: None,
                backoff: Backoff::new(self.config.reconnect),
                topics: BTreeSet::new(),
            }),
        })))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    /// Counts opens and drops everything it is given
    #[derive(Clone, Default)]
    struct CountingTransport {
        opens: Arc<AtomicUsize>,
    }

    impl Transport for CountingTransport {
        fn open(
            &self,
            _url: Url,
            _outbound: mpsc::UnboundedReceiver<String>,
            _events: mpsc::UnboundedSender<TransportEvent>,
        ) {
            self.opens.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_build_requires_runtime() {
        let result = Relay::builder(RelayConfig::default()).build();
        assert!(matches!(result, Err(RelayError::NoRuntime)));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let relay = Relay::builder(RelayConfig::default())
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        assert_eq!(relay.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_build_rejects_bad_api_url() {
        let config = RelayConfig {
            api_url: "mailto:ops@lotline.example".to_string(),
            ..RelayConfig::default()
        };
        assert!(matches!(
            Relay::builder(config).build(),
            Err(RelayError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_without_token_is_noop() {
        let transport = CountingTransport::default();
        let relay = Relay::builder(RelayConfig::default())
            .transport(transport.clone())
            .build()
            .unwrap();

        relay.connect();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
        assert_eq!(relay.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_token_read_on_every_connect() {
        let transport = CountingTransport::default();
        let session = SessionToken::new();
        let relay = Relay::builder(RelayConfig::default())
            .credentials(session.clone())
            .transport(transport.clone())
            .build()
            .unwrap();

        relay.connect();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);

        session.set("late-login");
        relay.connect();
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert!(relay.is_connected());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_send_without_transport_warns() {
        let transport = CountingTransport::default();
        let relay = Relay::builder(RelayConfig::default())
            .credentials(SessionToken::with_token("tok"))
            .transport(transport.clone())
            .build()
            .unwrap();

        assert!(!relay.send(&Message::ping()));
        assert!(!relay.subscribe_to_auction("A1"));
        assert_eq!(transport.opens.load(Ordering::SeqCst), 0);
        assert_eq!(relay.state(), ConnectionState::Idle);
        assert!(logs_contain("Realtime connection not open, message dropped"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_send_after_transport_released_warns() {
        let transport = CountingTransport::default();
        let relay = Relay::builder(RelayConfig::default())
            .credentials(SessionToken::with_token("tok"))
            .transport(transport)
            .build()
            .unwrap();

        // CountingTransport drops the outbound receiver immediately
        relay.connect();
        assert!(!relay.send(&Message::ping()));
        assert!(logs_contain("Realtime transport already gone"));
    }

    /// Keeps both ends of every link so tests can inspect queued frames
    #[derive(Clone, Default)]
    struct HoldingTransport {
        links: Arc<Mutex<Vec<(mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<TransportEvent>)>>>,
    }

    impl Transport for HoldingTransport {
        fn open(
            &self,
            _url: Url,
            outbound: mpsc::UnboundedReceiver<String>,
            events: mpsc::UnboundedSender<TransportEvent>,
        ) {
            self.links.lock().unwrap().push((outbound, events));
        }
    }

    impl HoldingTransport {
        fn queued(&self, link: usize) -> Vec<String> {
            let mut links = self.links.lock().unwrap();
            let mut frames = Vec::new();
            while let Ok(frame) = links[link].0.try_recv() {
                frames.push(frame);
            }
            frames
        }
    }

    fn https_config() -> RelayConfig {
        RelayConfig {
            api_url: "https://lotline.example/api".to_string(),
            ..RelayConfig::default()
        }
    }

    #[cfg(not(feature = "native-tls"))]
    #[tokio::test]
    async fn test_https_api_url_needs_tls_backend() {
        let result = Relay::builder(https_config()).build();
        match result {
            Err(RelayError::TlsUnavailable(endpoint)) => {
                assert_eq!(endpoint, "wss://lotline.example/ws");
            }
            other => panic!("expected TlsUnavailable, got {:?}", other.err()),
        }

        // A custom transport brings its own TLS
        let relay = Relay::builder(https_config())
            .transport(CountingTransport::default())
            .build();
        assert!(relay.is_ok());
    }

    #[cfg(feature = "native-tls")]
    #[tokio::test]
    async fn test_https_api_url_with_tls_backend() {
        assert!(Relay::builder(https_config()).build().is_ok());
    }

    #[tokio::test]
    async fn test_stale_open_leaves_new_link_alone() {
        let transport = HoldingTransport::default();
        let relay = Relay::builder(RelayConfig::default())
            .credentials(SessionToken::with_token("tok"))
            .transport(transport.clone())
            .build()
            .unwrap();

        relay.connect();
        let stale = relay.inner.lock().generation;
        relay.disconnect();
        relay.connect();
        relay.inner.lock().backoff.next_delay();

        // Opened from the released transport arrives after the swap
        relay.handle_open(stale);
        assert!(transport.queued(1).is_empty());
        assert_eq!(relay.inner.lock().backoff.attempts(), 1);

        relay.handle_open(stale + 1);
        assert_eq!(transport.queued(1), vec![r#"{"type":"ping"}"#.to_string()]);
        assert_eq!(relay.inner.lock().backoff.attempts(), 0);
    }

    #[tokio::test]
    async fn test_close_schedules_single_timer() {
        let transport = HoldingTransport::default();
        let relay = Relay::builder(RelayConfig::default())
            .credentials(SessionToken::with_token("tok"))
            .transport(transport)
            .build()
            .unwrap();

        relay.connect();
        let generation = relay.inner.lock().generation;
        relay.handle_close(generation, CloseInfo::new(Some(1006), "abnormal closure"));
        relay.handle_close(generation, CloseInfo::new(Some(1006), "abnormal closure"));

        let shared = relay.inner.lock();
        assert!(shared.link.is_none());
        assert_eq!(
            shared.reconnect.as_ref().map(|pending| pending.generation),
            Some(generation)
        );
        assert_eq!(shared.backoff.attempts(), 1);
    }
}
