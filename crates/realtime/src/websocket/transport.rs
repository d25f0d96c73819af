//! Transport seam between the relay and the network
//!
//! The relay hands a transport the outbound frame queue and an event sender.
//! A transport reports its lifecycle through `TransportEvent`s and always
//! finishes with exactly one `Closed`. When the relay drops the outbound
//! sender the transport closes the connection.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use super::endpoint;

/// Why a transport closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code, if the peer sent one
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Lifecycle and data events reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed
    Opened,
    /// Inbound text frame
    Frame(String),
    /// Inbound binary frame of the given length
    Binary(usize),
    /// Transport-level error; a `Closed` follows
    Error(String),
    Closed(CloseInfo),
}

/// Opens duplex connections for the relay
pub trait Transport: Send + Sync + 'static {
    /// Start connecting to `url` and return immediately.
    ///
    /// Frames from `outbound` are written once the connection is up; events
    /// go to `events`. Called inside the relay's tokio runtime context.
    fn open(
        &self,
        url: Url,
        outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
    );
}

/// tokio-tungstenite backed transport
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: Url,
        outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) {
        tokio::spawn(run_socket(url, outbound, events));
    }
}

async fn run_socket(
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let socket = match connect_async(url.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            tracing::debug!(
                endpoint = %endpoint::redacted(&url),
                error = %e,
                "WebSocket connect failed"
            );
            let _ = events.send(TransportEvent::Error(e.to_string()));
            let _ = events.send(TransportEvent::Closed(CloseInfo::new(
                None,
                "connection failed",
            )));
            return;
        }
    };

    let _ = events.send(TransportEvent::Opened);
    let (mut sink, mut stream) = socket.split();

    let close = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break CloseInfo::new(None, "write failed");
                    }
                }
                None => {
                    // Relay released this transport
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break CloseInfo::new(Some(1000), "closed by client");
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    let _ = events.send(TransportEvent::Binary(bytes.len()));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    break match frame {
                        Some(frame) => CloseInfo::new(
                            Some(u16::from(frame.code)),
                            frame.reason.as_str(),
                        ),
                        None => CloseInfo::new(None, "closed by server"),
                    };
                }
                Some(Ok(_)) => {} // Ping/pong handled by tungstenite
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break CloseInfo::new(None, "read failed");
                }
                None => break CloseInfo::new(None, "stream ended"),
            },
        }
    };

    let _ = events.send(TransportEvent::Closed(close));
}
