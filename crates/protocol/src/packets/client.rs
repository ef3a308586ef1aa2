//! Client -> Server update encoding, decoding and framing.

use bytes::{Buf, Bytes, BytesMut};

use super::{CLIENT_FRAME_SIZE, CLIENT_PAYLOAD_SIZE, MessageTag};
use crate::{AnimationState, BinaryReader, BinaryWriter, PlayerId, PlayerState, ProtocolError};

/// One client's report of its own state for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientUpdate {
    pub state: PlayerState,
    /// Who this client hit since its last update. `None` is encoded as id 0.
    pub hit_target: Option<PlayerId>,
}

impl ClientUpdate {
    /// Encode the fixed-size payload (without the `'b'` tag).
    pub fn encode(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(CLIENT_PAYLOAD_SIZE);
        self.write_payload(&mut w);
        debug_assert_eq!(w.len(), CLIENT_PAYLOAD_SIZE);
        w.finish()
    }

    /// Encode the payload preceded by its stream tag.
    pub fn encode_frame(&self) -> Bytes {
        let mut w = BinaryWriter::with_capacity(CLIENT_FRAME_SIZE);
        w.put_u8(MessageTag::ClientUpdate.as_u8());
        self.write_payload(&mut w);
        w.finish()
    }

    fn write_payload(&self, w: &mut BinaryWriter) {
        w.put_transform(&self.state.body);
        w.put_transform(&self.state.portal_a);
        w.put_transform(&self.state.portal_b);
        w.put_u8(self.hit_target.unwrap_or(0));
        w.put_u8(self.state.animation.into());
        w.put_u32(self.state.frame);
    }

    /// Decode a payload. Anything but exactly [`CLIENT_PAYLOAD_SIZE`] bytes is rejected.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != CLIENT_PAYLOAD_SIZE {
            return Err(ProtocolError::MalformedPayload {
                expected: CLIENT_PAYLOAD_SIZE,
                actual: data.len(),
            });
        }

        let mut reader = BinaryReader::new(Bytes::copy_from_slice(data));
        let body = reader.get_transform();
        let portal_a = reader.get_transform();
        let portal_b = reader.get_transform();
        let hit_target = match reader.get_u8() {
            0 => None,
            id => Some(id),
        };
        let animation = AnimationState::try_from(reader.get_u8())?;
        let frame = reader.get_u32();

        Ok(ClientUpdate {
            state: PlayerState {
                body,
                portal_a,
                portal_b,
                animation,
                frame,
            },
            hit_target,
        })
    }
}

/// Split the next complete client frame off the front of `buf`, returning its payload.
///
/// Returns `Ok(None)` while the frame is still partial; the bytes stay in `buf`.
/// A leading byte other than `'b'` is an error and nothing is consumed.
pub fn take_client_frame(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };
    if tag != MessageTag::ClientUpdate.as_u8() {
        return Err(ProtocolError::UnknownMessageType(tag));
    }
    if buf.len() < CLIENT_FRAME_SIZE {
        return Ok(None);
    }

    let mut frame = buf.split_to(CLIENT_FRAME_SIZE);
    frame.advance(1);
    Ok(Some(frame.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transform;
    use glam::{Quat, Vec3};

    fn sample() -> ClientUpdate {
        ClientUpdate {
            state: PlayerState {
                body: Transform::new(Vec3::new(1.5, -2.0, 0.25), Quat::from_rotation_z(0.3)),
                portal_a: Transform::new(Vec3::new(4.0, 5.0, 6.0), Quat::from_rotation_x(1.0)),
                portal_b: Transform::new(Vec3::new(-7.0, 8.0, -9.0), Quat::IDENTITY),
                animation: AnimationState::Guard,
                frame: 117,
            },
            hit_target: Some(2),
        }
    }

    #[test]
    fn test_roundtrip() {
        let update = sample();
        let data = update.encode();
        assert_eq!(data.len(), CLIENT_PAYLOAD_SIZE);
        assert_eq!(ClientUpdate::decode(&data), Ok(update));
    }

    #[test]
    fn test_no_hit_is_zero_byte() {
        let update = ClientUpdate {
            hit_target: None,
            ..sample()
        };
        let data = update.encode();
        assert_eq!(data[84], 0);
        assert_eq!(data[85], AnimationState::Guard as u8);
        assert_eq!(&data[86..90], &117u32.to_le_bytes());
        assert_eq!(ClientUpdate::decode(&data).map(|u| u.hit_target), Ok(None));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let data = sample().encode();
        assert_eq!(
            ClientUpdate::decode(&data[..CLIENT_PAYLOAD_SIZE - 1]),
            Err(ProtocolError::MalformedPayload {
                expected: CLIENT_PAYLOAD_SIZE,
                actual: CLIENT_PAYLOAD_SIZE - 1
            })
        );
        let mut long = data.to_vec();
        long.push(0);
        assert!(ClientUpdate::decode(&long).is_err());
        assert!(ClientUpdate::decode(&[]).is_err());
    }

    #[test]
    fn test_bad_animation_state_rejected() {
        let mut data = sample().encode().to_vec();
        data[85] = 9;
        assert_eq!(
            ClientUpdate::decode(&data),
            Err(ProtocolError::InvalidAnimationState(9))
        );
    }

    #[test]
    fn test_take_frame_waits_for_whole_frame() {
        let frame = sample().encode_frame();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame[..40]);
        assert_eq!(take_client_frame(&mut buf), Ok(None));
        assert_eq!(buf.len(), 40);

        buf.extend_from_slice(&frame[40..]);
        buf.extend_from_slice(&frame[..3]);
        let payload = take_client_frame(&mut buf).unwrap().unwrap();
        assert_eq!(payload.len(), CLIENT_PAYLOAD_SIZE);
        assert_eq!(ClientUpdate::decode(&payload), Ok(sample()));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_take_frame_rejects_unknown_tag() {
        let mut buf = BytesMut::from(&b"x123"[..]);
        assert_eq!(
            take_client_frame(&mut buf),
            Err(ProtocolError::UnknownMessageType(b'x'))
        );
        assert_eq!(buf.len(), 4);
    }
}
