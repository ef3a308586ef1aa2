//! Fixed-rate tick loop: drain inbound events, stamp hits, broadcast snapshots.
//!
//! Deadlines advance by exactly one period per tick, anchored to the first deadline, so the
//! cadence does not drift. A tick that overruns leaves the next deadline in the past; that
//! tick then skips draining and broadcasts immediately.

use bytes::Bytes;
use protocol::packets::{build_snapshot, frame_snapshot};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::combat::CombatAggregator;
use super::registry::ConnectionRegistry;
use super::transport::{ConnectionId, Transport, TransportEvent};
use crate::ServerError;
use crate::config::ServerConfig;

/// Where the loop is within the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    /// Accepting and applying inbound events until the deadline.
    Draining,
    /// Stamping hit flags and queueing snapshots.
    Broadcasting,
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u64,
    /// Transport events handled during the drain.
    pub events: usize,
    /// Client updates applied.
    pub updates: usize,
    /// Connections closed for protocol violations.
    pub violations: usize,
    /// Distinct players hit.
    pub hits: usize,
    /// Snapshots queued.
    pub snapshots: usize,
    /// Whether the deadline had already passed when draining began.
    pub late: bool,
    /// Whether this tick carried the ping pulse.
    pub ping: bool,
    /// Whether this tick raised the overrun warning for its late streak.
    pub overrun_warned: bool,
}

/// Raises the ping flag for one tick each time `interval` has elapsed.
#[derive(Debug, Clone)]
pub struct PingTimer {
    interval: Duration,
    last: Instant,
}

impl PingTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    pub fn sample(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// The authoritative tick loop. Owns every piece of mutable game state.
pub struct TickLoop<T> {
    transport: T,
    registry: ConnectionRegistry,
    combat: CombatAggregator,
    period: Duration,
    next_deadline: Instant,
    ping: PingTimer,
    phase: TickPhase,
    tick_count: u64,
    late_streak: u32,
    overrun_warn_ticks: u32,
}

impl<T: Transport> TickLoop<T> {
    pub fn new(transport: T, config: &ServerConfig) -> Self {
        let now = Instant::now();
        let period = config.tick_interval();
        Self {
            transport,
            registry: ConnectionRegistry::new(config.capacity),
            combat: CombatAggregator::new(),
            period,
            next_deadline: now + period,
            ping: PingTimer::new(config.ping_interval(), now),
            phase: TickPhase::Draining,
            tick_count: 0,
            late_streak: 0,
            overrun_warn_ticks: config.overrun_warn_ticks.max(1),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Deadline that ends the next drain.
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Run ticks until `shutdown` turns true. Only a transport failure ends it early.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        info!(
            "Tick loop started: {:?} period, {} player slots",
            self.period,
            self.registry.capacity()
        );
        while !*shutdown.borrow() {
            self.run_tick().await?;
        }
        info!("Tick loop stopped after {} ticks", self.tick_count);
        Ok(())
    }

    /// Run one full tick: drain until the deadline, then stamp and broadcast.
    pub async fn run_tick(&mut self) -> Result<TickStats, ServerError> {
        let deadline = self.next_deadline;
        let mut stats = TickStats {
            tick: self.tick_count,
            late: Instant::now() >= deadline,
            ..TickStats::default()
        };
        stats.overrun_warned = self.track_overrun(stats.late);

        self.phase = TickPhase::Draining;
        self.combat.reset();
        self.drain(deadline, &mut stats).await?;

        self.phase = TickPhase::Broadcasting;
        self.registry.stamp_hits(&self.combat);
        stats.hits = self.combat.hit_count();
        stats.ping = self.ping.sample(Instant::now());
        stats.snapshots = self.broadcast(stats.ping);

        self.next_deadline = deadline + self.period;
        self.tick_count += 1;
        self.phase = TickPhase::Draining;

        debug!(
            "Tick #{}: {} events, {} updates, {} hits, {} snapshots{}",
            stats.tick,
            stats.events,
            stats.updates,
            stats.hits,
            stats.snapshots,
            if stats.ping { ", ping" } else { "" }
        );
        Ok(stats)
    }

    async fn drain(&mut self, deadline: Instant, stats: &mut TickStats) -> Result<(), ServerError> {
        // Checked before every poll so a flooded queue cannot stretch the tick.
        while Instant::now() < deadline {
            let Some(event) = self.transport.poll(deadline).await? else {
                break;
            };
            stats.events += 1;
            self.dispatch(event, stats);
        }
        Ok(())
    }

    fn dispatch(&mut self, event: TransportEvent, stats: &mut TickStats) {
        match event {
            TransportEvent::Open { connection, addr } => {
                match self.registry.on_connection_open(connection) {
                    Ok(id) => info!(
                        "Player {} joined from {} (connection {})",
                        id, addr, connection
                    ),
                    Err(e) => {
                        warn!("Connection {} from {} rejected: {}", connection, addr, e);
                        self.transport.close(connection);
                    }
                }
            }
            TransportEvent::Close { connection } => {
                self.registry.on_connection_close(connection);
            }
            TransportEvent::Data { connection, bytes } => {
                match self.registry.receive(connection, &bytes, &mut self.combat) {
                    Ok(applied) => stats.updates += applied,
                    Err(e) if e.closes_connection() => {
                        warn!("Closing connection {}: {}", connection, e);
                        stats.violations += 1;
                        self.drop_connection(connection);
                    }
                    Err(e) => debug!("Ignoring data from connection {}: {}", connection, e),
                }
            }
        }
    }

    fn drop_connection(&mut self, connection: ConnectionId) {
        self.registry.on_connection_close(connection);
        self.transport.close(connection);
    }

    /// Queue one snapshot per live connection: its own record first, then the rest in
    /// registry order. Returns the number of snapshots queued.
    fn broadcast(&mut self, ping: bool) -> usize {
        let encoded: Vec<(ConnectionId, Bytes)> = self
            .registry
            .connections()
            .map(|(connection, record)| (connection, record.to_wire().encode()))
            .collect();

        for (index, (connection, own)) in encoded.iter().enumerate() {
            let others = encoded
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, (_, record))| &record[..]);
            let payload = build_snapshot(ping, own, others);
            self.transport.send(*connection, frame_snapshot(payload.as_slice()));
        }
        encoded.len()
    }

    /// Count consecutive late ticks. Returns true when this tick triggers the streak's
    /// single overrun warning.
    fn track_overrun(&mut self, late: bool) -> bool {
        if !late {
            if self.late_streak >= self.overrun_warn_ticks {
                info!("Tick loop back on schedule after {} late ticks", self.late_streak);
            }
            self.late_streak = 0;
            return false;
        }

        self.late_streak += 1;
        if self.late_streak != self.overrun_warn_ticks {
            return false;
        }
        warn!(
            "Tick loop overrun: {} ticks in a row started late ({:?} period, {} players)",
            self.late_streak,
            self.period,
            self.registry.len()
        );
        true
    }
}
