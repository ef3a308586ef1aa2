//! TCP session with the duel server.

use bytes::BytesMut;
use protocol::packets::{ClientUpdate, Snapshot, take_snapshot_frame};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::ClientError;

const READ_BUFFER_SIZE: usize = 4096;

pub struct Connection {
    stream: TcpStream,
    inbound: BytesMut,
    peer: SocketAddr,
}

impl Connection {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!("Connected to {}", peer);
        Ok(Self {
            stream,
            inbound: BytesMut::with_capacity(READ_BUFFER_SIZE),
            peer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send one `'b'` frame.
    pub async fn send_update(&mut self, update: &ClientUpdate) -> Result<(), ClientError> {
        self.stream.write_all(&update.encode_frame()).await?;
        Ok(())
    }

    /// Write bytes as-is, bypassing framing.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Wait for the next complete snapshot.
    ///
    /// Cancel-safe: bytes already read stay buffered for the next call.
    pub async fn recv_snapshot(&mut self) -> Result<Snapshot, ClientError> {
        loop {
            if let Some(payload) = take_snapshot_frame(&mut self.inbound)? {
                return Ok(Snapshot::decode(&payload)?);
            }
            self.inbound.reserve(READ_BUFFER_SIZE);
            if self.stream.read_buf(&mut self.inbound).await? == 0 {
                return Err(ClientError::Closed);
            }
        }
    }

    /// Half-close the stream; the server sees a normal disconnect.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::packets::{ServerRecord, build_snapshot, frame_snapshot};
    use protocol::{PlayerId, PlayerState};
    use tokio::net::TcpListener;

    fn record(id: PlayerId) -> ServerRecord {
        ServerRecord {
            id,
            state: PlayerState::spawn(id),
            got_hit: id == 2,
        }
    }

    #[tokio::test]
    async fn test_recv_snapshot_across_split_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let own = record(1).encode();
            let other = record(2).encode();
            let payload = build_snapshot(true, &own, [&other[..]]);
            let frame = frame_snapshot(payload.as_slice());

            // Two frames, the first split mid-header.
            socket.write_all(&frame[..5]).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            socket.write_all(&frame[5..]).await.unwrap();
            socket.write_all(&frame).await.unwrap();

            let mut update = [0u8; 91];
            socket.read_exact(&mut update).await.unwrap();
            update
        });

        let mut connection = Connection::connect(addr).await.unwrap();
        for _ in 0..2 {
            let snapshot = connection.recv_snapshot().await.unwrap();
            assert!(snapshot.ping);
            assert_eq!(snapshot.own().unwrap().id, 1);
            assert_eq!(snapshot.others().len(), 1);
            assert!(snapshot.others()[0].got_hit);
        }

        let update = ClientUpdate {
            state: PlayerState::spawn(1),
            hit_target: Some(2),
        };
        connection.send_update(&update).await.unwrap();
        let received = server.await.unwrap();
        assert_eq!(received[0], b'b');
        assert_eq!(ClientUpdate::decode(&received[1..]).unwrap(), update);
    }

    #[tokio::test]
    async fn test_recv_reports_close_and_bad_tag() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"x").await.unwrap();
        });

        let mut closed = Connection::connect(addr).await.unwrap();
        assert!(matches!(
            closed.recv_snapshot().await,
            Err(ClientError::Closed)
        ));

        let mut garbled = Connection::connect(addr).await.unwrap();
        assert!(matches!(
            garbled.recv_snapshot().await,
            Err(ClientError::Protocol(protocol::ProtocolError::UnknownMessageType(b'x')))
        ));
    }
}
