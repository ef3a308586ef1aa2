use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server closed the connection")]
    Closed,

    #[error("Snapshot carried no records")]
    EmptySnapshot,

    #[error("Snapshot addressed to player {received}, expected {expected}")]
    IdentityChanged { expected: u8, received: u8 },
}
