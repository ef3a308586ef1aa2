//! End-to-end tests: the TCP transport and tick loop driven by real client sessions.

use client::{ClientError, Connection, LocalPlayer, RemoteWorld};
use glam::Vec3;
use protocol::packets::Snapshot;
use protocol::{PlayerId, spawn_transform};
use server::{ServerConfig, ServerError, TcpTransport, TickLoop};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start(capacity: usize) -> Self {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr();
        let config = ServerConfig {
            capacity,
            tick_interval_ms: 10,
            ..ServerConfig::default()
        };
        let mut tick_loop = TickLoop::new(transport, &config);
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { tick_loop.run(rx).await });
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        timeout(WAIT, self.handle).await.unwrap().unwrap().unwrap();
    }
}

async fn next(connection: &mut Connection) -> Result<Snapshot, ClientError> {
    timeout(WAIT, connection.recv_snapshot())
        .await
        .expect("timed out waiting for a snapshot")
}

/// Read snapshots until one satisfies `pred`.
async fn until(connection: &mut Connection, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
    for _ in 0..300 {
        let snapshot = next(connection).await.unwrap();
        if pred(&snapshot) {
            return snapshot;
        }
    }
    panic!("condition never observed");
}

async fn join(addr: SocketAddr) -> (Connection, PlayerId) {
    let mut connection = Connection::connect(addr).await.unwrap();
    let snapshot = next(&mut connection).await.unwrap();
    let id = snapshot.own().unwrap().id;
    (connection, id)
}

#[tokio::test]
async fn test_players_get_distinct_ids_and_see_each_other() {
    let server = TestServer::start(4).await;
    let (mut a, id_a) = join(server.addr).await;
    let (mut b, id_b) = join(server.addr).await;
    assert_eq!((id_a, id_b), (1, 2));

    let snapshot = until(&mut a, |s| s.records.len() == 2).await;
    assert_eq!(snapshot.own().unwrap().id, 1);
    assert_eq!(snapshot.own().unwrap().state.body, spawn_transform(1));
    assert_eq!(snapshot.others()[0].id, 2);
    assert_eq!(snapshot.others()[0].state.body, spawn_transform(2));

    let snapshot = next(&mut b).await.unwrap();
    assert_eq!(snapshot.own().unwrap().id, 2);
    assert_eq!(snapshot.others()[0].id, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_movement_and_hit_reach_other_player() {
    let server = TestServer::start(4).await;
    let (mut a, id_a) = join(server.addr).await;
    let (mut b, id_b) = join(server.addr).await;
    until(&mut a, |s| s.records.len() == 2).await;

    let mut attacker = LocalPlayer::spawn(id_a);
    attacker.move_by(Vec3::new(0.5, 0.0, 0.0));
    attacker.strike(id_b);
    let update = attacker.tick();
    a.send_update(&update).await.unwrap();

    let mut world = RemoteWorld::new();
    let hit = until(&mut b, |s| s.own().is_some_and(|own| own.got_hit)).await;
    world.apply(&hit).unwrap();
    assert_eq!(world.player(id_a).unwrap().state, update.state);

    // One report, one tick: the flag is gone from the next snapshot.
    let after = next(&mut b).await.unwrap();
    assert!(after.records.iter().all(|r| !r.got_hit));
    assert!(!world.apply(&after).unwrap().got_hit);

    server.stop().await;
}

#[tokio::test]
async fn test_over_capacity_connection_is_closed() {
    let server = TestServer::start(1).await;
    let (mut a, id_a) = join(server.addr).await;
    assert_eq!(id_a, 1);

    let mut rejected = Connection::connect(server.addr).await.unwrap();
    let result = timeout(WAIT, rejected.recv_snapshot()).await.unwrap();
    assert!(matches!(
        result,
        Err(ClientError::Closed) | Err(ClientError::Io(_))
    ));

    // The admitted player is unaffected.
    let snapshot = next(&mut a).await.unwrap();
    assert_eq!(snapshot.records.len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_garbage_closes_only_sender() {
    let server = TestServer::start(4).await;
    let (mut a, _) = join(server.addr).await;
    let (mut b, _) = join(server.addr).await;
    until(&mut a, |s| s.records.len() == 2).await;

    b.send_raw(b"garbage").await.unwrap();
    let closed = loop {
        match next(&mut b).await {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    assert!(matches!(closed, ClientError::Closed | ClientError::Io(_)));

    let snapshot = until(&mut a, |s| s.records.len() == 1).await;
    assert_eq!(snapshot.own().unwrap().id, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_frees_slot() {
    let server = TestServer::start(1).await;
    let (mut a, _) = join(server.addr).await;
    a.shutdown().await.unwrap();
    drop(a);

    // The close races the next connect; retry until the slot is free again.
    for _ in 0..50 {
        let mut b = Connection::connect(server.addr).await.unwrap();
        if let Ok(snapshot) = next(&mut b).await {
            assert_eq!(snapshot.own().unwrap().id, 1);
            assert_eq!(snapshot.own().unwrap().state.body, spawn_transform(1));
            server.stop().await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("slot was never released");
}
