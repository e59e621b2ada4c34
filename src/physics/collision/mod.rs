// src/physics/collision/mod.rs

use glam::Vec3;

use crate::config::TerrainConfig;
use crate::error::StreamError;

/// Height lookups the collision patch needs from the terrain.
///
/// Positions are world space. Implementations decide which resident data
/// backs a position; the patch only distinguishes "resident" from "had to
/// fall back".
pub trait HeightQuery {
    /// Height from a resident field covering `p`, if one does.
    fn resident_height(&self, p: Vec3) -> Option<f32>;

    /// Height evaluated without resident data.
    fn fallback_height(&self, p: Vec3) -> f32;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestitchReport {
    pub revision: u64,
    /// Vertices that used `fallback_height`.
    pub fallbacks: usize,
}

/// Square triangle-list collision surface that follows the viewpoint.
///
/// Topology is fixed at construction: `(subdivisions + 1)^2` quads, two
/// triangles each, centered on `position`. Only vertex heights change.
pub struct CollisionPatch {
    base: Vec<Vec3>,
    faces: Vec<Vec3>,
    quads: usize,
    size: f32,
    position: Vec3,
    revision: u64,
    missing: Vec<Vec3>,
}

impl CollisionPatch {
    pub fn new(cfg: &TerrainConfig) -> Self {
        let quads = cfg.collision_subdivisions as usize + 1;
        let size = cfg.collision_size();
        let q = size / quads as f32;
        let half = size * 0.5;

        let mut base = Vec::with_capacity(quads * quads * 6);
        for qz in 0..quads {
            for qx in 0..quads {
                let x0 = -half + qx as f32 * q;
                let z0 = -half + qz as f32 * q;
                let (x1, z1) = (x0 + q, z0 + q);
                base.extend_from_slice(&[
                    Vec3::new(x0, 0.0, z0),
                    Vec3::new(x1, 0.0, z0),
                    Vec3::new(x1, 0.0, z1),
                    Vec3::new(x0, 0.0, z0),
                    Vec3::new(x1, 0.0, z1),
                    Vec3::new(x0, 0.0, z1),
                ]);
            }
        }

        Self {
            faces: base.clone(),
            base,
            quads,
            size,
            position: Vec3::ZERO,
            revision: 0,
            missing: Vec::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> f32 {
        self.size
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Triangle list in patch-local space; x/z fixed, y resampled.
    #[inline]
    pub fn faces(&self) -> &[Vec3] {
        &self.faces
    }

    /// Bumped on every resample.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// World positions that fell back during the last resample.
    #[inline]
    pub fn missing(&self) -> &[Vec3] {
        &self.missing
    }

    /// Snaps to the half-patch lattice on x/z; y is dropped.
    pub fn snap(&self, p: Vec3) -> Vec3 {
        let s = self.size * 0.5;
        let snap = |v: f32| (v / s + 0.5).floor() * s;
        Vec3::new(snap(p.x), 0.0, snap(p.z))
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Re-reads every vertex height through `q`.
    pub fn resample<Q: HeightQuery>(&mut self, q: &Q) -> RestitchReport {
        self.missing.clear();
        for (b, out) in self.base.iter().zip(self.faces.iter_mut()) {
            let world = *b + self.position;
            out.y = match q.resident_height(world) {
                Some(h) => h,
                None => {
                    self.missing.push(world);
                    q.fallback_height(world)
                }
            };
        }

        if !self.missing.is_empty() {
            let first = self.missing[0];
            let err = StreamError::MissingNeighbor { x: first.x, z: first.z };
            tracing::warn!(count = self.missing.len(), %err, "collision heights fell back to noise");
        }

        self.revision += 1;
        RestitchReport { revision: self.revision, fallbacks: self.missing.len() }
    }

    /// Surface height under world `p` by interpolating the patch triangles.
    pub fn ground_height(&self, p: Vec3) -> Option<f32> {
        let q = self.size / self.quads as f32;
        let local = p - self.position;
        let u = (local.x + self.size * 0.5) / q;
        let v = (local.z + self.size * 0.5) / q;
        let n = self.quads as f32;
        if !(0.0..n).contains(&u) || !(0.0..n).contains(&v) {
            return None;
        }

        let (qx, qz) = (u.floor(), v.floor());
        let (fx, fz) = (u - qx, v - qz);
        let b = (qz as usize * self.quads + qx as usize) * 6;
        let h00 = self.faces[b].y;
        let h10 = self.faces[b + 1].y;
        let h11 = self.faces[b + 2].y;
        let h01 = self.faces[b + 5].y;

        let h = if fx >= fz {
            h00 + fx * (h10 - h00) + fz * (h11 - h10)
        } else {
            h00 + fz * (h01 - h00) + fx * (h11 - h01)
        };
        Some(h + self.position.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slope {
        resident_below_x: f32,
    }

    impl HeightQuery for Slope {
        fn resident_height(&self, p: Vec3) -> Option<f32> {
            (p.x < self.resident_below_x).then_some(p.x * 0.5)
        }
        fn fallback_height(&self, _p: Vec3) -> f32 {
            -1.0
        }
    }

    #[test]
    fn default_patch_topology() {
        let p = CollisionPatch::new(&TerrainConfig::default());
        assert_eq!(p.size(), 32.0);
        assert_eq!(p.faces().len(), 32 * 32 * 6);
        let min_x = p.faces().iter().map(|v| v.x).fold(f32::MAX, f32::min);
        let max_x = p.faces().iter().map(|v| v.x).fold(f32::MIN, f32::max);
        assert_eq!((min_x, max_x), (-16.0, 16.0));
    }

    #[test]
    fn snap_uses_half_size_lattice() {
        let p = CollisionPatch::new(&TerrainConfig::default());
        assert_eq!(p.snap(Vec3::new(7.9, 40.0, -8.1)), Vec3::new(0.0, 0.0, -16.0));
        assert_eq!(p.snap(Vec3::new(8.0, 0.0, 31.0)), Vec3::new(16.0, 0.0, 32.0));
    }

    #[test]
    fn resample_tracks_fallbacks_and_revision() {
        let mut p = CollisionPatch::new(&TerrainConfig::default());
        p.set_position(Vec3::new(100.0, 0.0, 0.0));

        let all = p.resample(&Slope { resident_below_x: f32::MAX });
        assert_eq!(all, RestitchReport { revision: 1, fallbacks: 0 });
        for f in p.faces() {
            assert_eq!(f.y, (f.x + 100.0) * 0.5);
        }

        let part = p.resample(&Slope { resident_below_x: 100.0 });
        assert_eq!(part.revision, 2);
        assert!(part.fallbacks > 0);
        assert_eq!(part.fallbacks, p.missing().len());
        assert!(p.missing().iter().all(|m| m.x >= 100.0));
    }

    #[test]
    fn ground_height_interpolates_triangles() {
        let mut p = CollisionPatch::new(&TerrainConfig::default());
        p.resample(&Slope { resident_below_x: f32::MAX });

        let h = p.ground_height(Vec3::new(3.25, 99.0, -2.5)).unwrap();
        assert!((h - 1.625).abs() < 1e-5);
        assert!(p.ground_height(Vec3::new(16.5, 0.0, 0.0)).is_none());
        assert!(p.ground_height(Vec3::new(-16.0, 0.0, -16.0)).is_some());
    }
}
