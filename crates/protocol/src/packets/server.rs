//! Server -> Client record encoding and snapshot framing.

use bytes::{Buf, Bytes, BytesMut};

use super::{MAX_SNAPSHOT_PAYLOAD, MessageTag, SERVER_RECORD_SIZE, SNAPSHOT_HEADER_SIZE};
use crate::{AnimationState, BinaryReader, BinaryWriter, PlayerId, PlayerState, ProtocolError};

/// One player's authoritative state as broadcast to every client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerRecord {
    pub id: PlayerId,
    pub state: PlayerState,
    pub got_hit: bool,
}

impl ServerRecord {
    /// Encode the fixed-size record.
    pub fn encode(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(SERVER_RECORD_SIZE);
        self.write(&mut w);
        debug_assert_eq!(w.len(), SERVER_RECORD_SIZE);
        w.finish()
    }

    /// Append the record to an existing writer.
    pub fn write(&self, w: &mut BinaryWriter) {
        w.put_u8(self.id);
        w.put_transform(&self.state.body);
        w.put_transform(&self.state.portal_a);
        w.put_transform(&self.state.portal_b);
        w.put_u8(self.got_hit as u8);
        w.put_u8(self.state.animation.into());
        w.put_u32(self.state.frame);
    }

    /// Decode a record. Anything but exactly [`SERVER_RECORD_SIZE`] bytes is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != SERVER_RECORD_SIZE {
            return Err(ProtocolError::MalformedPayload {
                expected: SERVER_RECORD_SIZE,
                actual: data.len(),
            });
        }

        let mut reader = BinaryReader::new(Bytes::copy_from_slice(data));
        let id = reader.get_u8();
        let body = reader.get_transform();
        let portal_a = reader.get_transform();
        let portal_b = reader.get_transform();
        let got_hit = reader.get_u8() != 0;
        let animation = AnimationState::try_from(reader.get_u8())?;
        let frame = reader.get_u32();

        Ok(ServerRecord {
            id,
            state: PlayerState {
                body,
                portal_a,
                portal_b,
                animation,
                frame,
            },
            got_hit,
        })
    }
}

/// A decoded snapshot payload. The recipient's own record is always first.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub ping: bool,
    pub records: Vec<ServerRecord>,
}

impl Snapshot {
    /// The recipient's own record.
    pub fn own(&self) -> Option<&ServerRecord> {
        self.records.first()
    }

    /// Every other player's record, in server order.
    pub fn others(&self) -> &[ServerRecord] {
        self.records.get(1..).unwrap_or_default()
    }

    /// Encode the payload (ping byte and records, no frame header).
    pub fn encode(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(1 + self.records.len() * SERVER_RECORD_SIZE);
        w.put_u8(self.ping as u8);
        for record in &self.records {
            record.write(&mut w);
        }
        w.finish()
    }

    /// Decode a payload: one ping byte followed by whole records.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let Some((&ping, body)) = payload.split_first() else {
            return Err(ProtocolError::MalformedPayload {
                expected: 1,
                actual: 0,
            });
        };
        if body.len() % SERVER_RECORD_SIZE != 0 {
            return Err(ProtocolError::MalformedPayload {
                expected: 1 + (body.len() / SERVER_RECORD_SIZE) * SERVER_RECORD_SIZE,
                actual: payload.len(),
            });
        }

        let records = body
            .chunks_exact(SERVER_RECORD_SIZE)
            .map(ServerRecord::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot {
            ping: ping != 0,
            records,
        })
    }
}

/// Build a snapshot payload from records that are already encoded.
///
/// `own` goes first, then `others` in the order given.
pub fn build_snapshot<'a>(
    ping: bool,
    own: &[u8],
    others: impl IntoIterator<Item = &'a [u8]>,
) -> BinaryWriter {
    let mut w = BinaryWriter::with_capacity(1 + SERVER_RECORD_SIZE * 4);
    w.put_u8(ping as u8);
    w.put_slice(own);
    for record in others {
        w.put_slice(record);
    }
    w
}

/// Prefix a snapshot payload with its `'m'` tag and `u64` length.
pub fn frame_snapshot(payload: &[u8]) -> Bytes {
    let mut w = BinaryWriter::with_capacity(SNAPSHOT_HEADER_SIZE + payload.len());
    w.put_u8(MessageTag::Snapshot.as_u8());
    w.put_u64(payload.len() as u64);
    w.put_slice(payload);
    w.finish()
}

/// Split the next complete snapshot frame off the front of `buf`, returning its payload.
///
/// Returns `Ok(None)` until the header and the whole payload are buffered.
pub fn take_snapshot_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };
    if tag != MessageTag::Snapshot.as_u8() {
        return Err(ProtocolError::UnknownMessageType(tag));
    }
    if buf.len() < SNAPSHOT_HEADER_SIZE {
        return Ok(None);
    }

    let mut header = BinaryReader::new(Bytes::copy_from_slice(&buf[1..SNAPSHOT_HEADER_SIZE]));
    let len = header.get_u64();
    if len > MAX_SNAPSHOT_PAYLOAD {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let total = SNAPSHOT_HEADER_SIZE + len as usize;
    if buf.len() < total {
        return Ok(None);
    }

    let mut frame = buf.split_to(total);
    frame.advance(SNAPSHOT_HEADER_SIZE);
    Ok(Some(frame.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Transform, spawn_transform};
    use glam::{Quat, Vec3};

    fn record(id: PlayerId, got_hit: bool) -> ServerRecord {
        ServerRecord {
            id,
            state: PlayerState {
                body: spawn_transform(id),
                portal_a: Transform::new(Vec3::splat(id as f32), Quat::from_rotation_y(0.5)),
                portal_b: Transform::IDENTITY,
                animation: AnimationState::Move,
                frame: 42,
            },
            got_hit,
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let rec = record(7, true);
        let data = rec.encode();
        assert_eq!(data.len(), SERVER_RECORD_SIZE);
        assert_eq!(data[0], 7);
        assert_eq!(data[85], 1);
        assert_eq!(ServerRecord::decode(&data), Ok(rec));
    }

    #[test]
    fn test_record_wrong_length_rejected() {
        let data = record(1, false).encode();
        assert!(matches!(
            ServerRecord::decode(&data[1..]),
            Err(ProtocolError::MalformedPayload { expected: 91, actual: 90 })
        ));
    }

    #[test]
    fn test_snapshot_order_and_frame() {
        let own = record(2, false).encode();
        let other = record(1, true).encode();
        let payload = build_snapshot(true, &own, [&other[..]]).finish();
        assert_eq!(payload.len(), 1 + 2 * SERVER_RECORD_SIZE);

        let framed = frame_snapshot(&payload);
        assert_eq!(framed[0], b'm');
        assert_eq!(&framed[1..9], &(payload.len() as u64).to_le_bytes());

        let mut buf = BytesMut::from(&framed[..]);
        let taken = take_snapshot_frame(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());

        let snapshot = Snapshot::decode(&taken).unwrap();
        assert!(snapshot.ping);
        assert_eq!(snapshot.own().map(|r| r.id), Some(2));
        assert_eq!(snapshot.others(), &[record(1, true)]);
    }

    #[test]
    fn test_partial_snapshot_frame_stays_buffered() {
        let payload = Snapshot {
            ping: false,
            records: vec![record(1, false)],
        }
        .encode();
        let framed = frame_snapshot(&payload);

        let mut buf = BytesMut::from(&framed[..5]);
        assert_eq!(take_snapshot_frame(&mut buf), Ok(None));
        buf.extend_from_slice(&framed[5..framed.len() - 1]);
        assert_eq!(take_snapshot_frame(&mut buf), Ok(None));
        buf.extend_from_slice(&framed[framed.len() - 1..]);
        assert_eq!(take_snapshot_frame(&mut buf), Ok(Some(payload)));
    }

    #[test]
    fn test_snapshot_rejects_bad_tag_and_oversize() {
        let mut buf = BytesMut::from(&b"b\0\0\0\0\0\0\0\0"[..]);
        assert_eq!(
            take_snapshot_frame(&mut buf),
            Err(ProtocolError::UnknownMessageType(b'b'))
        );

        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"m");
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(
            take_snapshot_frame(&mut buf),
            Err(ProtocolError::FrameTooLarge(u64::MAX))
        );
    }

    #[test]
    fn test_snapshot_decode_rejects_truncated_record() {
        let payload = Snapshot {
            ping: false,
            records: vec![record(1, false), record(2, false)],
        }
        .encode();
        assert!(Snapshot::decode(&payload[..payload.len() - 1]).is_err());
        assert!(Snapshot::decode(&[]).is_err());
        assert_eq!(
            Snapshot::decode(&[0]),
            Ok(Snapshot {
                ping: false,
                records: Vec::new()
            })
        );
    }
}
