// src/streaming/manager/keep.rs
use glam::Vec3;

use crate::config::{DistanceMetric, TerrainConfig};
use crate::streaming::types::*;

use super::StreamingController;
use crate::streaming::sink::MeshSink;

#[inline]
pub fn chunk_distance(a: ChunkCoord, b: ChunkCoord, metric: DistanceMetric) -> f32 {
    let dx = (b.x - a.x) as f32;
    let dz = (b.z - a.z) as f32;
    match metric {
        DistanceMetric::Euclidean => (dx * dx + dz * dz).sqrt(),
        DistanceMetric::Chebyshev => dx.abs().max(dz.abs()),
    }
}

/// Strictly inside the render radius.
#[inline(always)]
pub fn in_range(center: ChunkCoord, c: ChunkCoord, cfg: &TerrainConfig) -> bool {
    chunk_distance(center, c, cfg.distance_metric) < cfg.render_distance as f32
}

#[inline]
pub fn viewpoint_chunk(position: Vec3, cfg: &TerrainConfig) -> ChunkCoord {
    ChunkCoord::containing(position, cfg.length())
}

/// World placement of a chunk's mesh.
#[inline]
pub fn mesh_position(c: ChunkCoord, cfg: &TerrainConfig) -> Vec3 {
    c.center(cfg.length()) + cfg.world_offset
}

/// True when the grid around `center` has a hole: some slot's chunk is not
/// resident yet.
pub fn has_missing<S: MeshSink>(mgr: &StreamingController<S>, center: ChunkCoord) -> bool {
    mgr.grid
        .offsets()
        .any(|off| !mgr.cache.contains(&center.offset(off)))
}

/// Evicts resident chunks that fell out of range. Buffers go to the reuse
/// pool before anything new is launched this tick.
pub fn evict_far<S: MeshSink>(mgr: &mut StreamingController<S>, center: ChunkCoord) -> usize {
    let cfg = &mgr.cfg;
    let gone = mgr.cache.evict_where(|c| !in_range(center, c, cfg));
    if !gone.is_empty() {
        tracing::debug!(count = gone.len(), %center, "evicted out-of-range chunks");
    }
    gone.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_strict() {
        let cfg = TerrainConfig { render_distance: 2, ..Default::default() };
        let o = ChunkCoord::new(0, 0);
        assert!(in_range(o, ChunkCoord::new(1, 1), &cfg));
        assert!(!in_range(o, ChunkCoord::new(2, 0), &cfg));
        assert!(!in_range(o, ChunkCoord::new(0, -2), &cfg));
    }

    #[test]
    fn metrics_differ_off_axis() {
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(3, 4);
        assert_eq!(chunk_distance(a, b, DistanceMetric::Euclidean), 5.0);
        assert_eq!(chunk_distance(a, b, DistanceMetric::Chebyshev), 4.0);

        let count = |metric| {
            let cfg = TerrainConfig { render_distance: 4, distance_metric: metric, ..Default::default() };
            let mut n = 0;
            for x in -4..=4 {
                for z in -4..=4 {
                    if in_range(a, ChunkCoord::new(x, z), &cfg) {
                        n += 1;
                    }
                }
            }
            n
        };
        // r=4: the circle drops the four corners of the 7x7 square.
        assert_eq!(count(DistanceMetric::Euclidean), 45);
        assert_eq!(count(DistanceMetric::Chebyshev), 49);
    }

    #[test]
    fn mesh_position_includes_world_offset() {
        let cfg = TerrainConfig { world_offset: Vec3::new(1.0, -5.0, 2.0), ..Default::default() };
        let p = mesh_position(ChunkCoord::new(-1, 2), &cfg);
        assert_eq!(p, Vec3::new(-63.0, -5.0, 130.0));
    }
}
