//! Binary reading and writing utilities for the duel protocol.
//!
//! All values are little-endian. Vectors and quaternions are written as their raw
//! `f32` components, quaternions in `x, y, z, w` order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::{Quat, Vec3};

use crate::Transform;

/// Byte width of an encoded [`Vec3`].
pub const VEC3_SIZE: usize = 3 * 4;
/// Byte width of an encoded [`Quat`].
pub const QUAT_SIZE: usize = 4 * 4;
/// Byte width of an encoded [`Transform`].
pub const TRANSFORM_SIZE: usize = VEC3_SIZE + QUAT_SIZE;

/// A reader for parsing fixed-layout binary records.
///
/// Callers check the total length up front; the getters assume enough bytes remain.
#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    pub fn get_u8(&mut self) -> u8 {
        self.buf.get_u8()
    }

    #[inline]
    pub fn get_u32(&mut self) -> u32 {
        self.buf.get_u32_le()
    }

    #[inline]
    pub fn get_u64(&mut self) -> u64 {
        self.buf.get_u64_le()
    }

    #[inline]
    pub fn get_f32(&mut self) -> f32 {
        self.buf.get_f32_le()
    }

    pub fn get_vec3(&mut self) -> Vec3 {
        let x = self.get_f32();
        let y = self.get_f32();
        let z = self.get_f32();
        Vec3::new(x, y, z)
    }

    pub fn get_quat(&mut self) -> Quat {
        let x = self.get_f32();
        let y = self.get_f32();
        let z = self.get_f32();
        let w = self.get_f32();
        Quat::from_xyzw(x, y, z, w)
    }

    pub fn get_transform(&mut self) -> Transform {
        let position = self.get_vec3();
        let rotation = self.get_quat();
        Transform { position, rotation }
    }
}

/// A writer for building binary protocol messages.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    #[inline]
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32_le(v);
    }

    pub fn put_vec3(&mut self, v: Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }

    pub fn put_quat(&mut self, q: Quat) {
        self.put_f32(q.x);
        self.put_f32(q.y);
        self.put_f32(q.z);
        self.put_f32(q.w);
    }

    pub fn put_transform(&mut self, t: &Transform) {
        self.put_vec3(t.position);
        self.put_quat(t.rotation);
    }

    /// Write raw bytes.
    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
