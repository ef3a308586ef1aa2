//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding or framing protocol messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed payload: expected {expected} bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    #[error("Unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    #[error("Invalid animation state: {0}")]
    InvalidAnimationState(u8),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(u64),
}
