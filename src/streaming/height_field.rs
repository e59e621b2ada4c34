// src/streaming/height_field.rs
use std::ops::Range;

use glam::Vec3;

use crate::config::TerrainConfig;
use crate::world::NoiseSource;
use super::types::ChunkCoord;

/// Placement of a chunk's sample grid in world space.
///
/// Sample `(i, j)` sits at `origin + (i - 1, j - 1) * step`; index 0 and
/// `res - 1` are the padding ring outside the chunk proper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldGeometry {
    pub coord: ChunkCoord,
    pub origin_x: f32,
    pub origin_z: f32,
    pub step: f32,
    pub length: f32,
    pub res: usize,
}

impl FieldGeometry {
    pub fn for_chunk(coord: ChunkCoord, cfg: &TerrainConfig) -> Self {
        let length = cfg.length();
        let half = length * 0.5;
        Self {
            coord,
            origin_x: coord.x as f32 * length - half,
            origin_z: coord.z as f32 * length - half,
            step: cfg.step_size(),
            length,
            res: cfg.resolution(),
        }
    }

    #[inline]
    pub fn world_x(&self, i: usize) -> f32 {
        self.origin_x + (i as f32 - 1.0) * self.step
    }

    #[inline]
    pub fn world_z(&self, j: usize) -> f32 {
        self.origin_z + (j as f32 - 1.0) * self.step
    }

    /// Normalized samples for rows `rows`, row-major.
    pub fn sample_rows(&self, noise: &dyn NoiseSource, rows: Range<usize>) -> Vec<f32> {
        let mut out = Vec::with_capacity(rows.len() * self.res);
        for j in rows {
            let z = self.world_z(j) as f64;
            for i in 0..self.res {
                out.push(noise.sample(self.world_x(i) as f64, z));
            }
        }
        out
    }
}

/// Height samples of one chunk.
///
/// Mutable only while owned by its build; the cache publishes it behind an
/// `Arc` once every row has been written.
#[derive(Clone, Debug)]
pub struct HeightField {
    geom: FieldGeometry,
    samples: Vec<f32>,
}

impl HeightField {
    /// Fresh buffer for `cfg`'s resolution, not yet placed.
    pub fn allocate(cfg: &TerrainConfig) -> Self {
        let res = cfg.resolution();
        Self {
            geom: FieldGeometry::for_chunk(ChunkCoord::default(), cfg),
            samples: vec![0.0; res * res],
        }
    }

    /// Re-targets the buffer at `coord`. Old samples stay until overwritten
    /// by the next generation pass.
    pub fn place(&mut self, coord: ChunkCoord, cfg: &TerrainConfig) {
        self.geom = FieldGeometry::for_chunk(coord, cfg);
        let n = self.geom.res * self.geom.res;
        if self.samples.len() != n {
            self.samples.resize(n, 0.0);
        }
    }

    #[inline]
    pub fn geometry(&self) -> &FieldGeometry {
        &self.geom
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.geom.coord
    }

    #[inline]
    pub fn resolution(&self) -> usize {
        self.geom.res
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        debug_assert!(i < self.geom.res && j < self.geom.res);
        self.samples[j * self.geom.res + i]
    }

    /// Copies row-major `data` into rows starting at `first_row`.
    pub fn write_rows(&mut self, first_row: usize, data: &[f32]) {
        let start = first_row * self.geom.res;
        self.samples[start..start + data.len()].copy_from_slice(data);
    }

    /// Half-open on `[origin, origin + length)` so neighbours partition space.
    #[inline]
    pub fn in_bounds(&self, p: Vec3) -> bool {
        let g = &self.geom;
        p.x >= g.origin_x
            && p.x < g.origin_x + g.length
            && p.z >= g.origin_z
            && p.z < g.origin_z + g.length
    }

    /// Nearest stored sample to a world position.
    pub fn normalized_at(&self, p: Vec3) -> f32 {
        let g = &self.geom;
        let last = (g.res - 1) as f32;
        let i = (((p.x - g.origin_x) / g.step).round() + 1.0).clamp(0.0, last) as usize;
        let j = (((p.z - g.origin_z) / g.step).round() + 1.0).clamp(0.0, last) as usize;
        self.get(i, j)
    }

    /// World height at `p`, using the current amplitude settings.
    #[inline]
    pub fn height_at(&self, p: Vec3, cfg: &TerrainConfig) -> f32 {
        cfg.true_height(self.normalized_at(p))
    }
}
