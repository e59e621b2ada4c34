// src/streaming/types.rs
use std::fmt;

use glam::{IVec2, Vec3};

use crate::error::StreamError;
use super::height_field::HeightField;

/// Offset of a mesh slot from the viewpoint chunk, in chunks.
pub type GridOffset = IVec2;

/// Integer chunk coordinate. `y` is always 0; the grid is planar.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Default)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, y: 0, z }
    }

    /// Chunk containing a world position. Chunk `c` covers
    /// `[c*length - length/2, c*length + length/2)`.
    #[inline]
    pub fn containing(position: Vec3, length: f32) -> Self {
        Self::new(
            (position.x / length + 0.5).floor() as i32,
            (position.z / length + 0.5).floor() as i32,
        )
    }

    #[inline]
    pub fn offset(self, d: GridOffset) -> Self {
        Self::new(self.x + d.x, self.z + d.y)
    }

    #[inline]
    pub fn delta(self, other: ChunkCoord) -> GridOffset {
        IVec2::new(other.x - self.x, other.z - self.z)
    }

    /// World-space center of this chunk (y = 0).
    #[inline]
    pub fn center(self, length: f32) -> Vec3 {
        Vec3::new(self.x as f32 * length, 0.0, self.z as f32 * length)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Detail levels of a mesh slot and its four axis neighbours, used for
/// seam stitching. `west` is the `x + 1` side and `north` the `z + 1` side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LodEntry {
    pub center: u8,
    pub north: u8,
    pub south: u8,
    pub west: u8,
    pub east: u8,
}

impl LodEntry {
    pub fn new(x: i32, z: i32, limit: u8) -> Self {
        let cheb = |a: i32, b: i32| -> u8 {
            let d = a.unsigned_abs().max(b.unsigned_abs());
            d.min(limit as u32) as u8
        };
        Self {
            center: cheb(x, z),
            west: cheb(x + 1, z),
            east: cheb(x - 1, z),
            north: cheb(x, z + 1),
            south: cheb(x, z - 1),
        }
    }

    /// Mesh subdivision divisor for the slot itself.
    #[inline]
    pub fn stride(&self) -> u32 {
        1u32 << self.center
    }
}

/// A pending build in the creation queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildRequest {
    pub coord: ChunkCoord,
    pub slot: GridOffset,
    pub lod: LodEntry,
}

/// Posted from worker threads to the main-thread loop.
pub enum BuildEvent {
    Completed {
        request: BuildRequest,
        field: HeightField,
        build_ms: f64,
    },
    Failed {
        request: BuildRequest,
        error: StreamError,
    },
}

impl BuildEvent {
    pub fn request(&self) -> &BuildRequest {
        match self {
            BuildEvent::Completed { request, .. } | BuildEvent::Failed { request, .. } => request,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StreamStats {
    pub center: (i32, i32, i32),

    pub resident: u32,
    pub mesh_slots: u32,

    pub in_flight: u32,
    pub queued: u32,
    pub launched: u32,

    pub pool_len: u32,
    pub pool_capacity: u32,
    pub buffers_allocated: u64,
    pub buffers_reused: u64,
    pub buffers_dropped: u64,

    pub builds_done: u64,
    pub builds_failed: u64,
    pub build_ms_avg: f64,
    pub build_ms_max: f64,

    pub evicted: u64,
    pub restitches: u64,
    pub restitches_deferred: u64,
    pub missing_heights: u64,
}
