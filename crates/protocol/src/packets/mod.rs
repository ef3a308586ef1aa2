//! Packet definitions for the duel protocol.
//!
//! Both directions are byte streams of tagged frames:
//! - client -> server: `'b'` followed by one fixed-size [`ClientUpdate`] payload
//! - server -> client: `'m'`, a little-endian `u64` payload length, then a snapshot payload

mod client;
mod server;

pub use client::*;
pub use server::*;

use crate::TRANSFORM_SIZE;

/// Leading tag of every frame on the stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    /// Client update (client -> server).
    ClientUpdate = b'b',
    /// World snapshot (server -> client).
    Snapshot = b'm',
}

impl MessageTag {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Size of an encoded [`ClientUpdate`]: three transforms, hit id, animation state, frame.
pub const CLIENT_PAYLOAD_SIZE: usize = TRANSFORM_SIZE * 3 + 1 + 1 + 4;

/// Size of an encoded [`ServerRecord`]: id, three transforms, hit flag, animation state, frame.
pub const SERVER_RECORD_SIZE: usize = 1 + TRANSFORM_SIZE * 3 + 1 + 1 + 4;

/// Tag plus payload.
pub const CLIENT_FRAME_SIZE: usize = 1 + CLIENT_PAYLOAD_SIZE;

/// Tag plus `u64` length.
pub const SNAPSHOT_HEADER_SIZE: usize = 1 + 8;

/// Largest snapshot payload a receiver accepts: the ping byte and one record per possible id.
pub const MAX_SNAPSHOT_PAYLOAD: u64 = 1 + 255 * SERVER_RECORD_SIZE as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_sizes() {
        assert_eq!(CLIENT_PAYLOAD_SIZE, 90);
        assert_eq!(SERVER_RECORD_SIZE, 91);
    }
}
