//! Headless client for the duel server.
//!
//! [`Connection`] speaks the wire protocol over TCP, [`RemoteWorld`] folds received
//! snapshots into a view of every player, and [`LocalPlayer`] produces the updates a real
//! game client would send each frame.

mod error;
pub mod game;
pub mod network;

pub use error::ClientError;
pub use game::{LocalPlayer, PortalSlot, RemoteWorld, SnapshotEvents};
pub use network::Connection;
