//! Realtime relay over a single shared WebSocket
//!
//! Provides the client side of the auction/notification event stream:
//! - One live connection per relay, opened with the session token
//! - Listener fan-out of every inbound message, in wire order
//! - Auction topic subscribe/unsubscribe control frames
//! - Automatic reconnect after an unexpected close
//!
//! # Architecture
//!
//! - **Relay**: Connection lifecycle, send path and reconnect scheduling
//! - **Listeners**: Registry of consumer callbacks with isolated dispatch
//! - **Transport**: Seam between the relay and the network (tokio-tungstenite)
//! - **Endpoint**: Derives the `ws(s)://.../ws?token=...` URL from the API origin
//! - **Reconnect**: Fixed or exponential reconnect delays

pub mod credentials;
pub mod endpoint;
pub mod listeners;
pub mod reconnect;
pub mod relay;
pub mod transport;

pub use credentials::{CredentialSource, SessionToken};
pub use listeners::{ListenerHandle, ListenerId};
pub use reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY};
pub use relay::{ConnectionState, Relay, RelayBuilder};
pub use transport::{CloseInfo, Transport, TransportEvent, WebSocketTransport};
