//! Authoritative fixed-tick server for the portal duel.

pub mod config;
mod error;
pub mod server;

pub use config::{Config, ServerConfig};
pub use error::ServerError;
pub use server::{
    CombatAggregator, ConnectionId, ConnectionRegistry, PlayerRecord, TcpTransport, TickLoop,
    Transport, TransportEvent, run,
};
