//! Relay consumers
//!
//! UI-facing collaborators that only use the relay's public interface:
//! - **NotificationCenter**: refreshes notification lists and counts unseen chat messages
//! - **AuctionWatch**: follows one auction's bid and lifecycle events

pub mod auction;
pub mod notifications;

pub use auction::{AuctionEvent, AuctionEventKind, AuctionWatch};
pub use notifications::NotificationCenter;
