//! Lotline Realtime Library
//!
//! Client-side relay for the auction and notification event stream, plus the
//! consumers that sit on top of it.

pub mod config;
pub mod consumers;
pub mod error;
pub mod websocket;

pub use config::{ConfigError, RelayConfig};
pub use consumers::{AuctionEvent, AuctionEventKind, AuctionWatch, NotificationCenter};
pub use error::{RelayError, RelayResult};
pub use lotline_shared::{EntityId, FrameError, Message, MessageKind};
pub use websocket::{
    CloseInfo, ConnectionState, CredentialSource, ListenerHandle, ListenerId, ReconnectPolicy,
    Relay, RelayBuilder, SessionToken, Transport, TransportEvent, WebSocketTransport,
};
