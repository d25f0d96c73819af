//! Auction watch
//!
//! Follows a single auction while a detail view is open: declares topic
//! interest on start, forwards matching bid/auction events, and withdraws the
//! interest when dropped.

use lotline_shared::{EntityId, Message, MessageKind};
use serde_json::Value;

use crate::websocket::{ListenerHandle, Relay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionEventKind {
    BidPlaced,
    Outbid,
    Ending,
    Ended,
    Won,
    Sold,
    Updated,
}

impl AuctionEventKind {
    fn from_kind(kind: MessageKind) -> Option<Self> {
        Some(match kind {
            MessageKind::BidNew => Self::BidPlaced,
            MessageKind::BidOutbid => Self::Outbid,
            MessageKind::AuctionEnding => Self::Ending,
            MessageKind::AuctionEnded => Self::Ended,
            MessageKind::AuctionWon => Self::Won,
            MessageKind::AuctionSold => Self::Sold,
            MessageKind::AuctionUpdate => Self::Updated,
            _ => return None,
        })
    }

    /// Bidding is closed after this event
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Ended | Self::Won | Self::Sold)
    }
}

/// Bid or lifecycle event for a watched auction
#[derive(Debug, Clone, PartialEq)]
pub struct AuctionEvent {
    pub kind: AuctionEventKind,
    pub auction_id: EntityId,
    pub user_id: Option<EntityId>,
    pub data: Option<Value>,
}

impl AuctionEvent {
    /// Auction-scoped events only; anything else yields `None`
    pub fn from_message(message: &Message) -> Option<Self> {
        Some(Self {
            kind: AuctionEventKind::from_kind(message.kind)?,
            auction_id: message.auction_id.clone()?,
            user_id: message.user_id.clone(),
            data: message.data.clone(),
        })
    }
}

/// Live subscription to one auction. Unsubscribes when dropped.
pub struct AuctionWatch {
    relay: Relay,
    auction_id: EntityId,
    listener: ListenerHandle,
}

impl AuctionWatch {
    /// Connect the relay if needed, declare interest and start forwarding events
    pub fn start<F>(relay: &Relay, auction_id: impl Into<EntityId>, handler: F) -> Self
    where
        F: Fn(AuctionEvent) + Send + Sync + 'static,
    {
        let auction_id = auction_id.into();
        relay.connect();

        let target = auction_id.clone();
        let listener = relay.subscribe(move |message: &Message| {
            if !message.is_for_auction(&target) {
                return;
            }
            if let Some(event) = AuctionEvent::from_message(message) {
                handler(event);
            }
        });
        relay.subscribe_to_auction(auction_id.clone());

        tracing::debug!(auction_id = %auction_id, "Auction watch started");
        Self {
            relay: relay.clone(),
            auction_id,
            listener,
        }
    }

    pub fn auction_id(&self) -> &EntityId {
        &self.auction_id
    }
}

impl Drop for AuctionWatch {
    fn drop(&mut self) {
        self.listener.unsubscribe();
        self.relay.unsubscribe_from_auction(self.auction_id.clone());
        tracing::debug!(auction_id = %self.auction_id, "Auction watch stopped");
    }
}
