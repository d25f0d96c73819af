//! Lotline Shared Types
//!
//! This crate contains the realtime message model shared by the relay and its consumers.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
