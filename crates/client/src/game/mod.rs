//! Client-side view of the duel: the local player's outgoing state and everyone else's
//! last known state.

use glam::Vec3;
use protocol::packets::{ClientUpdate, ServerRecord, Snapshot};
use protocol::{AnimationState, AnimationStateMachine, PlayerId, PlayerState, Transform};
use std::collections::BTreeMap;

use crate::ClientError;

/// What changed between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotEvents {
    pub joined: Vec<PlayerId>,
    pub left: Vec<PlayerId>,
    /// Someone hit us during the tick this snapshot closes.
    pub got_hit: bool,
    pub ping: bool,
}

/// Players as seen through the server's snapshots.
#[derive(Debug, Default)]
pub struct RemoteWorld {
    my_id: Option<PlayerId>,
    me: Option<ServerRecord>,
    others: BTreeMap<PlayerId, ServerRecord>,
    snapshots: u64,
}

impl RemoteWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one snapshot in. The first record is always ours; the first snapshot tells us
    /// our id and later ones must agree.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Result<SnapshotEvents, ClientError> {
        let own = *snapshot.own().ok_or(ClientError::EmptySnapshot)?;
        match self.my_id {
            None => self.my_id = Some(own.id),
            Some(expected) if expected != own.id => {
                return Err(ClientError::IdentityChanged {
                    expected,
                    received: own.id,
                });
            }
            Some(_) => {}
        }

        let others: BTreeMap<PlayerId, ServerRecord> = snapshot
            .others()
            .iter()
            .map(|record| (record.id, *record))
            .collect();
        let events = SnapshotEvents {
            joined: others
                .keys()
                .filter(|id| !self.others.contains_key(id))
                .copied()
                .collect(),
            left: self
                .others
                .keys()
                .filter(|id| !others.contains_key(id))
                .copied()
                .collect(),
            got_hit: own.got_hit,
            ping: snapshot.ping,
        };

        self.me = Some(own);
        self.others = others;
        self.snapshots += 1;
        Ok(events)
    }

    pub fn my_id(&self) -> Option<PlayerId> {
        self.my_id
    }

    /// Our own record as the server last echoed it.
    pub fn me(&self) -> Option<&ServerRecord> {
        self.me.as_ref()
    }

    pub fn player(&self, id: PlayerId) -> Option<&ServerRecord> {
        self.others.get(&id)
    }

    /// Every other player, in id order.
    pub fn others(&self) -> impl Iterator<Item = &ServerRecord> {
        self.others.values()
    }

    pub fn snapshot_count(&self) -> u64 {
        self.snapshots
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalSlot {
    A,
    B,
}

/// The player this client controls.
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    id: PlayerId,
    state: PlayerState,
    animator: AnimationStateMachine,
    pending_hit: Option<PlayerId>,
}

impl LocalPlayer {
    /// Place the player at the shared spawn point for `id`.
    pub fn spawn(id: PlayerId) -> Self {
        Self {
            id,
            state: PlayerState::spawn(id),
            animator: AnimationStateMachine::new(),
            pending_hit: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn animation(&self) -> AnimationState {
        self.animator.state()
    }

    /// Translate the body and play the move clip unless a one-shot is running.
    pub fn move_by(&mut self, delta: Vec3) {
        self.state.body.position += delta;
        self.play(AnimationState::Move);
    }

    /// Return to idle unless a one-shot is running.
    pub fn stand(&mut self) {
        self.play(AnimationState::Idle);
    }

    pub fn guard(&mut self) {
        self.animator.set_state(AnimationState::Guard);
    }

    /// Swing at `target`. The hit goes out with the next update only.
    pub fn strike(&mut self, target: PlayerId) {
        self.pending_hit = Some(target);
        self.animator.set_state(AnimationState::Action);
    }

    pub fn place_portal(&mut self, slot: PortalSlot, transform: Transform) {
        match slot {
            PortalSlot::A => self.state.portal_a = transform,
            PortalSlot::B => self.state.portal_b = transform,
        }
    }

    /// Advance the animation one frame and produce the update to send.
    pub fn tick(&mut self) -> ClientUpdate {
        self.animator.update();
        let (animation, frame) = self.animator.snapshot();
        self.state.animation = animation;
        self.state.frame = frame;
        ClientUpdate {
            state: self.state,
            hit_target: self.pending_hit.take(),
        }
    }

    fn play(&mut self, clip: AnimationState) {
        let current = self.animator.state();
        if current != clip && !current.is_oneshot() {
            self.animator.set_state(clip);
        }
    }
}
