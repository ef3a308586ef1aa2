//! Connection to player bookkeeping.
//!
//! Players live in a fixed arena of seats addressed by id, so an id can only be handed to a
//! new connection after the seat it names has been emptied.

use bytes::BytesMut;
use protocol::PlayerId;
use protocol::packets::{ClientUpdate, take_client_frame};
use std::collections::HashMap;
use tracing::{debug, info};

use super::combat::CombatAggregator;
use super::player::PlayerRecord;
use super::slots::SlotAllocator;
use super::transport::ConnectionId;
use crate::ServerError;

/// One occupied slot: the owning connection, its record, and its unconsumed input bytes.
#[derive(Debug)]
struct Seat {
    connection: ConnectionId,
    record: PlayerRecord,
    inbound: BytesMut,
}

/// Maps live connections to their authoritative [`PlayerRecord`]s.
#[derive(Debug)]
pub struct ConnectionRegistry {
    slots: SlotAllocator,
    seats: Vec<Option<Seat>>,
    by_connection: HashMap<ConnectionId, PlayerId>,
}

impl ConnectionRegistry {
    pub fn new(capacity: usize) -> Self {
        let slots = SlotAllocator::new(capacity);
        let seats = (0..slots.capacity()).map(|_| None).collect();
        Self {
            slots,
            seats,
            by_connection: HashMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of live players.
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.by_connection.contains_key(&connection)
    }

    /// Seat a new connection at the smallest free id.
    ///
    /// Fails with [`ServerError::CapacityExceeded`] when every id is taken; the caller
    /// closes the connection.
    pub fn on_connection_open(
        &mut self,
        connection: ConnectionId,
    ) -> Result<PlayerId, ServerError> {
        if self.contains(connection) {
            return Err(ServerError::DuplicateConnection(connection));
        }
        let id = self.slots.acquire().ok_or(ServerError::CapacityExceeded {
            capacity: self.capacity(),
        })?;

        let record = PlayerRecord::spawn(id);
        debug!(
            "Player {} spawned at {:?} for connection {}",
            id, record.state.body.position, connection
        );
        self.seats[id as usize - 1] = Some(Seat {
            connection,
            record,
            inbound: BytesMut::with_capacity(256),
        });
        self.by_connection.insert(connection, id);
        Ok(id)
    }

    /// Remove a connection's player and free its id. Unknown connections return `None`.
    pub fn on_connection_close(&mut self, connection: ConnectionId) -> Option<PlayerRecord> {
        let id = self.by_connection.remove(&connection)?;
        let seat = self.seats.get_mut(id as usize - 1)?.take()?;
        self.slots.release(id);
        if !seat.inbound.is_empty() {
            debug!(
                "Dropping {} unconsumed bytes from connection {}",
                seat.inbound.len(),
                connection
            );
        }
        info!("Player {} left (connection {})", id, connection);
        Some(seat.record)
    }

    /// Decode one unframed update payload and apply it to the connection's record.
    ///
    /// Entry point for transports that deliver whole messages. Stream transports go through
    /// [`receive`](Self::receive). A payload that fails to decode leaves the record
    /// untouched; the caller closes the connection.
    pub fn apply_client_message(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        combat: &mut CombatAggregator,
    ) -> Result<(), ServerError> {
        let seat = self.seat_mut(connection)?;
        let update = ClientUpdate::decode(payload)?;
        apply_update(&mut seat.record, &update, combat);
        Ok(())
    }

    /// Buffer bytes from the stream and apply every complete update frame, in order.
    ///
    /// Returns the number of updates applied. A trailing partial frame stays buffered for
    /// the next call.
    pub fn receive(
        &mut self,
        connection: ConnectionId,
        data: &[u8],
        combat: &mut CombatAggregator,
    ) -> Result<usize, ServerError> {
        let seat = self.seat_mut(connection)?;
        seat.inbound.extend_from_slice(data);

        let mut applied = 0;
        while let Some(payload) = take_client_frame(&mut seat.inbound)? {
            let update = ClientUpdate::decode(&payload)?;
            apply_update(&mut seat.record, &update, combat);
            applied += 1;
        }
        Ok(applied)
    }

    /// Copy this tick's hit set onto every live record.
    pub fn stamp_hits(&mut self, combat: &CombatAggregator) {
        for seat in self.seats.iter_mut().flatten() {
            seat.record.got_hit = combat.was_hit(seat.record.id);
        }
    }

    pub fn get(&self, connection: ConnectionId) -> Option<&PlayerRecord> {
        let id = *self.by_connection.get(&connection)?;
        self.seats[id as usize - 1].as_ref().map(|seat| &seat.record)
    }

    pub fn id_of(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(&connection).copied()
    }

    /// Live records in ascending id order.
    pub fn records(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.seats.iter().flatten().map(|seat| &seat.record)
    }

    /// Live connections and their records in ascending id order.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &PlayerRecord)> {
        self.seats
            .iter()
            .flatten()
            .map(|seat| (seat.connection, &seat.record))
    }

    fn seat_mut(&mut self, connection: ConnectionId) -> Result<&mut Seat, ServerError> {
        let id = self
            .by_connection
            .get(&connection)
            .copied()
            .ok_or(ServerError::UnknownConnection(connection))?;
        self.seats
            .get_mut(id as usize - 1)
            .and_then(Option::as_mut)
            .ok_or(ServerError::UnknownConnection(connection))
    }
}

fn apply_update(record: &mut PlayerRecord, update: &ClientUpdate, combat: &mut CombatAggregator) {
    record.apply(update);
    if let Some(target) = update.hit_target {
        combat.report_hit(target);
    }
}
