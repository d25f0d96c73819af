//! Realtime message model
//!
//! Every frame exchanged with the realtime endpoint is a JSON object of the
//! shape `{type, auction_id?, user_id?, data?}`. The `type` discriminant comes
//! from a closed set; anything outside it is a malformed frame.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FrameError;

// =============================================================================
// Message Kinds
// =============================================================================

/// Discriminant of a realtime message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    // Connection control
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "subscribe")]
    Subscribe,
    #[serde(rename = "unsubscribe")]
    Unsubscribe,
    #[serde(rename = "error")]
    Error,

    // Bidding
    #[serde(rename = "bid:new")]
    BidNew,
    #[serde(rename = "bid:outbid")]
    BidOutbid,

    // Auction lifecycle
    #[serde(rename = "auction:ending")]
    AuctionEnding,
    #[serde(rename = "auction:ended")]
    AuctionEnded,
    #[serde(rename = "auction:won")]
    AuctionWon,
    #[serde(rename = "auction:sold")]
    AuctionSold,
    #[serde(rename = "auction:update")]
    AuctionUpdate,

    // Inbox
    #[serde(rename = "notification:new")]
    NotificationNew,
    #[serde(rename = "message:new")]
    ChatMessageNew,
    #[serde(rename = "shop_message:new")]
    ShopMessageNew,
}

impl MessageKind {
    /// Wire name of this kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Subscribe => "subscribe",
            MessageKind::Unsubscribe => "unsubscribe",
            MessageKind::Error => "error",
            MessageKind::BidNew => "bid:new",
            MessageKind::BidOutbid => "bid:outbid",
            MessageKind::AuctionEnding => "auction:ending",
            MessageKind::AuctionEnded => "auction:ended",
            MessageKind::AuctionWon => "auction:won",
            MessageKind::AuctionSold => "auction:sold",
            MessageKind::AuctionUpdate => "auction:update",
            MessageKind::NotificationNew => "notification:new",
            MessageKind::ChatMessageNew => "message:new",
            MessageKind::ShopMessageNew => "shop_message:new",
        }
    }

    /// Connection management rather than domain data
    pub const fn is_control(&self) -> bool {
        matches!(
            self,
            MessageKind::Ping
                | MessageKind::Pong
                | MessageKind::Subscribe
                | MessageKind::Unsubscribe
                | MessageKind::Error
        )
    }

    /// Bid and auction lifecycle events, scoped to one auction
    pub const fn is_auction_event(&self) -> bool {
        matches!(
            self,
            MessageKind::BidNew
                | MessageKind::BidOutbid
                | MessageKind::AuctionEnding
                | MessageKind::AuctionEnded
                | MessageKind::AuctionWon
                | MessageKind::AuctionSold
                | MessageKind::AuctionUpdate
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Entity Identifiers
// =============================================================================

/// Identifier of an auction or a user.
///
/// The backend is not consistent about sending ids as strings or numbers;
/// numbers are kept in their decimal form so `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Unsigned(id) => Self(id.to_string()),
            RawId::Signed(id) => Self(id.to_string()),
        })
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Message
// =============================================================================

/// One realtime frame, inbound or outbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<EntityId>,

    /// Opaque event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    /// Message of the given kind with no optional fields
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            auction_id: None,
            user_id: None,
            data: None,
        }
    }

    /// Liveness probe sent when a connection opens
    pub fn ping() -> Self {
        Self::new(MessageKind::Ping)
    }

    /// Declare interest in one auction's events
    pub fn subscribe(auction_id: impl Into<EntityId>) -> Self {
        Self::new(MessageKind::Subscribe).with_auction(auction_id)
    }

    /// Withdraw interest in one auction's events
    pub fn unsubscribe(auction_id: impl Into<EntityId>) -> Self {
        Self::new(MessageKind::Unsubscribe).with_auction(auction_id)
    }

    pub fn with_auction(mut self, auction_id: impl Into<EntityId>) -> Self {
        self.auction_id = Some(auction_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<EntityId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Parse one inbound text frame
    pub fn parse(frame: &str) -> Result<Self, FrameError> {
        serde_json::from_str(frame).map_err(FrameError::Malformed)
    }

    /// Serialize for the wire
    pub fn to_frame(&self) -> Result<String, FrameError> {
        serde_json::to_string(self).map_err(FrameError::Encode)
    }

    /// Whether this message targets the given auction
    pub fn is_for_auction(&self, auction_id: &EntityId) -> bool {
        self.auction_id.as_ref() == Some(auction_id)
    }
}
