//! Server error types.

use crate::server::transport::ConnectionId;
use protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the registry, tick loop and transport.
///
/// Everything except [`ServerError::Listener`] is local to one connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server full: all {capacity} player slots are in use")]
    CapacityExceeded { capacity: usize },

    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Listener failed: {0}")]
    Listener(#[from] std::io::Error),
}

impl ServerError {
    /// Whether the offending connection must be closed.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            ServerError::CapacityExceeded { .. } | ServerError::Protocol(_)
        )
    }
}
