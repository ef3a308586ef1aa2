//! Animation state shared with the renderer.
//!
//! Only the state and frame number cross the network; the state machine below is the
//! client-local rule that produces them.

use crate::ProtocolError;

/// Discrete animation state. The numeric values are part of the wire contract.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimationState {
    #[default]
    Idle = 0,
    Move = 1,
    Action = 2,
    Guard = 3,
}

impl AnimationState {
    pub const ALL: [AnimationState; 4] = [
        AnimationState::Idle,
        AnimationState::Move,
        AnimationState::Action,
        AnimationState::Guard,
    ];

    /// Inclusive frame range of the clip for this state.
    pub const fn frame_range(self) -> (u32, u32) {
        match self {
            AnimationState::Idle => (0, 29),
            AnimationState::Move => (40, 59),
            AnimationState::Action => (70, 99),
            AnimationState::Guard => (100, 129),
        }
    }

    /// One-shot clips fall back to idle when they finish instead of looping.
    pub const fn is_oneshot(self) -> bool {
        matches!(self, AnimationState::Action | AnimationState::Guard)
    }
}

impl TryFrom<u8> for AnimationState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AnimationState::Idle),
            1 => Ok(AnimationState::Move),
            2 => Ok(AnimationState::Action),
            3 => Ok(AnimationState::Guard),
            other => Err(ProtocolError::InvalidAnimationState(other)),
        }
    }
}

impl From<AnimationState> for u8 {
    fn from(state: AnimationState) -> Self {
        state as u8
    }
}

/// Frame-advancing state machine run once per client frame.
#[derive(Debug, Clone)]
pub struct AnimationStateMachine {
    state: AnimationState,
    frame: u32,
    changed: bool,
}

impl AnimationStateMachine {
    pub fn new() -> Self {
        Self {
            state: AnimationState::Idle,
            frame: AnimationState::Idle.frame_range().0,
            changed: false,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Switch clips; the jump to the first frame happens on the next [`update`](Self::update).
    pub fn set_state(&mut self, state: AnimationState) {
        self.state = state;
        self.changed = true;
    }

    pub fn update(&mut self) {
        let (first, last) = self.state.frame_range();
        if self.changed {
            self.frame = first;
            self.changed = false;
            return;
        }

        self.frame += 1;
        if self.frame > last {
            if self.state.is_oneshot() {
                self.state = AnimationState::Idle;
                self.frame = AnimationState::Idle.frame_range().0;
            } else {
                self.frame = first;
            }
        }
    }

    /// The pair that goes on the wire.
    pub fn snapshot(&self) -> (AnimationState, u32) {
        (self.state, self.frame)
    }
}

impl Default for AnimationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
