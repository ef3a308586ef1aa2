//! Authoritative per-player record.

use protocol::packets::{ClientUpdate, ServerRecord};
use protocol::{PlayerId, PlayerState};

/// The server's canonical state for one connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    /// Slot id, stable for the lifetime of the connection.
    pub id: PlayerId,
    /// Body, portals and animation as last reported by the owning client.
    pub state: PlayerState,
    /// Whether anyone reported hitting this player during the last tick.
    pub got_hit: bool,
    /// Number of updates applied since the connection opened.
    pub updates: u64,
}

impl PlayerRecord {
    /// Create a record at the spawn point for `id`.
    pub fn spawn(id: PlayerId) -> Self {
        Self {
            id,
            state: PlayerState::spawn(id),
            got_hit: false,
            updates: 0,
        }
    }

    /// Overwrite every client-owned field. Last write wins; nothing is merged.
    pub fn apply(&mut self, update: &ClientUpdate) {
        self.state = update.state;
        self.updates += 1;
    }

    /// The wire form of this record.
    pub fn to_wire(&self) -> ServerRecord {
        ServerRecord {
            id: self.id,
            state: self.state,
            got_hit: self.got_hit,
        }
    }
}
