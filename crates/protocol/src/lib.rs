//! Shared protocol crate for the duel server.
//!
//! This crate contains:
//! - Binary reading/writing utilities
//! - The fixed-layout client update and server record codecs
//! - Stream framing for both directions
//! - Shared types (transforms, animation state, spawn layout)

mod animation;
mod binary;
mod error;
pub mod packets;

pub use animation::{AnimationState, AnimationStateMachine};
pub use binary::{BinaryReader, BinaryWriter, QUAT_SIZE, TRANSFORM_SIZE, VEC3_SIZE};
pub use error::ProtocolError;

use glam::{Quat, Vec3};

/// Player identity on the wire. `0` means "unknown" or "nobody".
pub type PlayerId = u8;

/// Position and orientation of a body or portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The per-player fields both directions carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub body: Transform,
    pub portal_a: Transform,
    pub portal_b: Transform,
    pub animation: AnimationState,
    pub frame: u32,
}

impl PlayerState {
    /// State of a freshly spawned player with the given id.
    pub fn spawn(id: PlayerId) -> Self {
        Self {
            body: spawn_transform(id),
            portal_a: Transform::IDENTITY,
            portal_b: Transform::IDENTITY,
            animation: AnimationState::Idle,
            frame: AnimationState::Idle.frame_range().0,
        }
    }
}

/// First spawn point; later ids are offset along [`SPAWN_SPACING`].
pub const SPAWN_ORIGIN: Vec3 = Vec3::new(1.0, 0.0, 0.0);
pub const SPAWN_SPACING: Vec3 = Vec3::new(0.2, 0.2, 0.0);

/// Deterministic spawn transform for a player id, so simultaneous joins never overlap.
///
/// Clients use the same layout to place themselves once they learn their id.
pub fn spawn_transform(id: PlayerId) -> Transform {
    let index = id.saturating_sub(1) as f32;
    Transform {
        position: SPAWN_ORIGIN + SPAWN_SPACING * index,
        rotation: Quat::from_axis_angle(Vec3::Z, (-90.0f32).to_radians()),
    }
}
