// src/physics/world_query.rs
use glam::{IVec2, Vec3};

use crate::{
    config::TerrainConfig,
    error::StreamError,
    streaming::{cache::ChunkCache, height_field::HeightField, types::ChunkCoord},
    world::NoiseSource,
};

use super::collision::HeightQuery;

/// Heights for a collision patch from the four chunks around it, with
/// direct noise evaluation for anything they don't cover.
pub struct NeighborQuery<'a> {
    neighbors: Vec<&'a HeightField>,
    noise: &'a dyn NoiseSource,
    cfg: &'a TerrainConfig,
}

impl<'a> NeighborQuery<'a> {
    /// Which side of `chunk` a patch snapped to `snapped` leans toward.
    #[inline]
    pub fn lean(snapped: Vec3, chunk: ChunkCoord, cfg: &TerrainConfig) -> IVec2 {
        let c = chunk.center(cfg.length());
        IVec2::new(
            if snapped.x <= c.x { -1 } else { 1 },
            if snapped.z <= c.z { -1 } else { 1 },
        )
    }

    #[inline]
    pub fn candidates(chunk: ChunkCoord, lean: IVec2) -> [ChunkCoord; 4] {
        [
            chunk,
            chunk.offset(IVec2::new(lean.x, 0)),
            chunk.offset(IVec2::new(0, lean.y)),
            chunk.offset(lean),
        ]
    }

    /// Fails with the first candidate that is not resident.
    pub fn gather(
        cache: &'a ChunkCache,
        chunk: ChunkCoord,
        lean: IVec2,
        noise: &'a dyn NoiseSource,
        cfg: &'a TerrainConfig,
    ) -> Result<Self, StreamError> {
        let neighbors = Self::candidates(chunk, lean)
            .iter()
            .map(|c| {
                cache
                    .get(c)
                    .map(|f| &**f)
                    .ok_or(StreamError::IncompleteNeighborSet { missing: *c })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { neighbors, noise, cfg })
    }
}

impl<'a> HeightQuery for NeighborQuery<'a> {
    #[inline]
    fn resident_height(&self, p: Vec3) -> Option<f32> {
        self.neighbors
            .iter()
            .find(|f| f.in_bounds(p))
            .map(|f| f.height_at(p, self.cfg))
    }

    #[inline]
    fn fallback_height(&self, p: Vec3) -> f32 {
        self.cfg.true_height(self.noise.sample(p.x as f64, p.z as f64))
    }
}
