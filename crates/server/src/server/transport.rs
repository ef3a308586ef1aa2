//! Connection transport.
//!
//! The tick loop sees connections only through [`Transport`]: a bounded poll that yields
//! open, close and data events, plus per-connection `send` and `close`. [`TcpTransport`]
//! runs one accept task and a reader/writer task pair per socket. None of those tasks
//! touch game state; they funnel events through a single queue drained by the tick loop.

use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, warn};

use crate::ServerError;

/// Transport-level connection handle. Never reused within one transport.
pub type ConnectionId = u64;

/// What the tick loop learns from one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open { connection: ConnectionId, addr: SocketAddr },
    Close { connection: ConnectionId },
    Data { connection: ConnectionId, bytes: Bytes },
}

/// Event source and byte sink for the tick loop.
pub trait Transport {
    /// Wait for the next event, returning `Ok(None)` once `deadline` passes with nothing
    /// queued. Only a lost listener is an error.
    fn poll(
        &mut self,
        deadline: Instant,
    ) -> impl Future<Output = Result<Option<TransportEvent>, ServerError>> + Send;

    /// Queue bytes on a connection's outbound stream. Unknown connections are ignored.
    ///
    /// A connection that stops draining its stream may be closed here; `poll` then reports
    /// its `Close`.
    fn send(&mut self, connection: ConnectionId, bytes: Bytes);

    /// Close a connection. Bytes already queued are flushed first; no further events are
    /// reported for it.
    fn close(&mut self, connection: ConnectionId);
}

/// Internal queue item; `Open` carries the handles the transport keeps per connection.
enum Inbound {
    Open {
        connection: ConnectionId,
        addr: SocketAddr,
        writer: mpsc::Sender<Bytes>,
        reader: AbortHandle,
    },
    Close {
        connection: ConnectionId,
    },
    Data {
        connection: ConnectionId,
        bytes: Bytes,
    },
    ListenerFailed(io::Error),
}

struct Peer {
    writer: mpsc::Sender<Bytes>,
    reader: AbortHandle,
}

/// TCP implementation of [`Transport`].
pub struct TcpTransport {
    local_addr: SocketAddr,
    events: mpsc::Receiver<Inbound>,
    peers: HashMap<ConnectionId, Peer>,
    /// Connections dropped by `send`, reported on the next `poll`.
    dropped: VecDeque<ConnectionId>,
    accept_task: JoinHandle<()>,
}

/// Depth of the shared event queue; readers wait when it is full.
const EVENT_QUEUE_DEPTH: usize = 1024;
const READ_BUFFER_SIZE: usize = 4096;
/// Frames a connection may have queued before it is dropped as a slow consumer.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;
/// A single write blocked longer than this ends the connection.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after the process runs out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

impl TcpTransport {
    /// Bind the listening socket and start accepting connections.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let accept_task = tokio::spawn(accept_loop(listener, tx));
        Ok(Self {
            local_addr,
            events,
            peers: HashMap::new(),
            dropped: VecDeque::new(),
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections the transport still holds open.
    pub fn open_connections(&self) -> usize {
        self.peers.len()
    }
}

impl Transport for TcpTransport {
    async fn poll(&mut self, deadline: Instant) -> Result<Option<TransportEvent>, ServerError> {
        if let Some(connection) = self.dropped.pop_front() {
            return Ok(Some(TransportEvent::Close { connection }));
        }
        loop {
            let inbound = match timeout_at(deadline, self.events.recv()).await {
                Err(_elapsed) => return Ok(None),
                Ok(None) => {
                    return Err(ServerError::Listener(io::Error::other(
                        "event queue closed",
                    )));
                }
                Ok(Some(inbound)) => inbound,
            };

            match inbound {
                Inbound::Open {
                    connection,
                    addr,
                    writer,
                    reader,
                } => {
                    self.peers.insert(connection, Peer { writer, reader });
                    return Ok(Some(TransportEvent::Open { connection, addr }));
                }
                Inbound::Close { connection } => {
                    // Connections we closed ourselves are already forgotten.
                    if self.peers.remove(&connection).is_some() {
                        return Ok(Some(TransportEvent::Close { connection }));
                    }
                }
                Inbound::Data { connection, bytes } => {
                    if self.peers.contains_key(&connection) {
                        return Ok(Some(TransportEvent::Data { connection, bytes }));
                    }
                }
                Inbound::ListenerFailed(e) => return Err(ServerError::Listener(e)),
            }
        }
    }

    fn send(&mut self, connection: ConnectionId, bytes: Bytes) {
        let Some(peer) = self.peers.get(&connection) else {
            return;
        };
        match peer.writer.try_send(bytes) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Connection {} has {} frames queued, dropping slow consumer",
                    connection, OUTBOUND_QUEUE_DEPTH
                );
                self.close(connection);
                self.dropped.push_back(connection);
            }
            // A closed writer means the socket is gone; its reader reports the close.
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn close(&mut self, connection: ConnectionId) {
        if let Some(peer) = self.peers.remove(&connection) {
            peer.reader.abort();
            debug!("Closing connection {}", connection);
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
        for peer in self.peers.values() {
            peer.reader.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<Inbound>) {
    let mut next_connection: ConnectionId = 1;
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => match accept_backoff(&e) {
                Some(pause) => {
                    warn!("Accept failed, still listening: {}", e);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    continue;
                }
                None => {
                    error!("Accept failed: {}", e);
                    let _ = tx.send(Inbound::ListenerFailed(e)).await;
                    return;
                }
            },
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let connection = next_connection;
        next_connection += 1;

        let (read, write) = stream.into_split();
        let (writer, outbound) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        tokio::spawn(write_loop(connection, write, outbound));

        // The reader waits for `start` so Open is always queued ahead of its Data.
        let (start, started) = oneshot::channel();
        let reader = tokio::spawn(read_loop(connection, read, tx.clone(), started)).abort_handle();
        let open = Inbound::Open {
            connection,
            addr,
            writer,
            reader,
        };
        if tx.send(open).await.is_err() {
            return;
        }
        let _ = start.send(());
    }
}

/// How long to pause before accepting again, or `None` if the listener is unusable.
///
/// Aborted handshakes only affect that one peer. Descriptor exhaustion clears once
/// connections close, so it is retried after a pause.
fn accept_backoff(e: &io::Error) -> Option<Duration> {
    const ENFILE: i32 = 23;
    const EMFILE: i32 = 24;

    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Some(Duration::ZERO),
        _ if matches!(e.raw_os_error(), Some(ENFILE | EMFILE)) => Some(ACCEPT_BACKOFF),
        _ => None,
    }
}

async fn read_loop(
    connection: ConnectionId,
    mut read: OwnedReadHalf,
    tx: mpsc::Sender<Inbound>,
    started: oneshot::Receiver<()>,
) {
    if started.await.is_err() {
        return;
    }
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    loop {
        buf.reserve(READ_BUFFER_SIZE);
        match read.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let bytes = buf.split().freeze();
                if tx.send(Inbound::Data { connection, bytes }).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("Read error on connection {}: {}", connection, e);
                break;
            }
        }
    }
    let _ = tx.send(Inbound::Close { connection }).await;
}

async fn write_loop(
    connection: ConnectionId,
    mut write: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
) {
    while let Some(bytes) = outbound.recv().await {
        match timeout(WRITE_TIMEOUT, write.write_all(&bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write error on connection {}: {}", connection, e);
                return;
            }
            Err(_elapsed) => {
                debug!("Write timed out on connection {}", connection);
                return;
            }
        }
    }
    let _ = write.shutdown().await;
}
