//! In-memory transport for relay tests

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lotline_realtime::{
    CloseInfo, Message, Relay, RelayConfig, SessionToken, Transport, TransportEvent,
};
use tokio::sync::mpsc;
use url::Url;

struct MockLink {
    url: Url,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

/// Records every `open` and lets tests play the server side
#[derive(Clone, Default)]
pub struct MockTransport {
    links: Arc<Mutex<Vec<MockLink>>>,
}

impl Transport for MockTransport {
    fn open(
        &self,
        url: Url,
        outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        self.links.lock().unwrap().push(MockLink {
            url,
            outbound,
            events,
        });
    }
}

impl MockTransport {
    /// Number of transports the relay has opened
    pub fn open_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    pub fn url(&self, link: usize) -> Url {
        self.links.lock().unwrap()[link].url.clone()
    }

    pub fn emit(&self, link: usize, event: TransportEvent) {
        let _ = self.links.lock().unwrap()[link].events.send(event);
    }

    pub fn opened(&self, link: usize) {
        self.emit(link, TransportEvent::Opened);
    }

    pub fn frame(&self, link: usize, frame: &str) {
        self.emit(link, TransportEvent::Frame(frame.to_string()));
    }

    pub fn close(&self, link: usize) {
        self.emit(
            link,
            TransportEvent::Closed(CloseInfo::new(Some(1006), "abnormal closure")),
        );
    }

    /// Frames the relay has written to this transport so far
    pub fn sent(&self, link: usize) -> Vec<String> {
        let mut links = self.links.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = links[link].outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Whether the relay dropped its side of the outbound queue
    pub fn is_released(&self, link: usize) -> bool {
        let mut links = self.links.lock().unwrap();
        matches!(
            links[link].outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

pub fn relay_with(config: RelayConfig, token: Option<&str>) -> (Relay, MockTransport, SessionToken) {
    let transport = MockTransport::default();
    let session = SessionToken::new();
    if let Some(token) = token {
        session.set(token);
    }

    let relay = Relay::builder(config)
        .credentials(session.clone())
        .transport(transport.clone())
        .build()
        .unwrap();

    (relay, transport, session)
}

pub fn relay(token: Option<&str>) -> (Relay, MockTransport, SessionToken) {
    relay_with(RelayConfig::default(), token)
}

/// Let spawned driver tasks process pending events
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Listener that records every message it receives
pub fn recorder() -> (
    Arc<Mutex<Vec<Message>>>,
    impl Fn(&Message) + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |message: &Message| {
        sink.lock().unwrap().push(message.clone())
    })
}

pub const RECONNECT: Duration = Duration::from_secs(5);
