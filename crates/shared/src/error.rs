//! Error types for realtime frames

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(serde_json::Error),
}
