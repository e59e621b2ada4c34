// src/streaming/manager/mod.rs
pub mod build;
pub mod grid;
pub mod keep;
mod stats;


use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tracing::{debug, info, instrument};

use crate::{
    config::TerrainConfig,
    error::StreamError,
    physics::{CollisionPatch, NeighborQuery, RestitchReport},
    world::{FractalNoise, NoiseSource},
};

use crate::streaming::{
    build_pool::WorkerPool,
    cache::ChunkCache,
    height_field::HeightField,
    sink::{GlobalParam, MeshSink},
    types::*,
};

use build::BuildScheduler;
use grid::{LodTable, MeshGrid};

/// Where the terrain is being looked at from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewpoint {
    pub position: Vec3,
    /// Degrees; 0 faces +z, positive turns toward +x.
    pub yaw_deg: f32,
}

impl Viewpoint {
    pub fn new(position: Vec3, yaw_deg: f32) -> Self {
        Self { position, yaw_deg }
    }
}

/// What a streaming tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// False when the viewpoint chunk was unchanged and nothing was missing.
    pub scanned: bool,
    pub requested: usize,
    pub evicted: usize,
    pub completed: usize,
}

/// Outcome of a collision tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchUpdate {
    /// Same snapped position, nothing pending.
    Unchanged,
    Restitched(RestitchReport),
    /// A neighbor chunk is still being built; retried next tick.
    Deferred { missing: ChunkCoord },
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PatchCounters {
    pub restitches: u64,
    pub deferred: u64,
    pub missing_heights: u64,
}

/// Owns the chunk cache, the build pipeline and the mesh slots, and keeps
/// them centred on a moving viewpoint. Every method runs on the caller's
/// (main) thread; only height generation happens on the pool.
pub struct StreamingController<S: MeshSink> {
    pub(crate) cfg: TerrainConfig,
    noise: Arc<dyn NoiseSource>,
    // Caller-supplied noise survives reconfigure; config-built noise is rebuilt.
    custom_noise: bool,
    pool: WorkerPool,

    pub(crate) sink: S,
    pub(crate) cache: ChunkCache,
    pub(crate) sched: BuildScheduler,
    pub(crate) lods: LodTable,
    pub(crate) grid: MeshGrid,
    pub(crate) patch: CollisionPatch,

    pub(crate) last_center: Option<ChunkCoord>,
    restitch_pending: bool,
    visible: bool,
    pub(crate) patch_counters: PatchCounters,
}

impl<S: MeshSink> StreamingController<S> {
    /// Controller with noise built from `cfg.noise` and `cfg.seed`.
    pub fn new(cfg: TerrainConfig, sink: S) -> Result<Self, StreamError> {
        cfg.validate()?;
        let noise: Arc<dyn NoiseSource> = Arc::new(FractalNoise::new(&cfg.noise, cfg.seed));
        Ok(Self::build(cfg, noise, false, sink))
    }

    /// Controller sampling a caller-supplied noise source.
    pub fn with_noise_source(
        cfg: TerrainConfig,
        noise: Arc<dyn NoiseSource>,
        sink: S,
    ) -> Result<Self, StreamError> {
        cfg.validate()?;
        Ok(Self::build(cfg, noise, true, sink))
    }

    fn build(cfg: TerrainConfig, noise: Arc<dyn NoiseSource>, custom_noise: bool, sink: S) -> Self {
        let pool = WorkerPool::new(cfg.worker_threads);
        let mut mgr = Self {
            sched: BuildScheduler::new(pool.clone(), noise.clone(), cfg.generation_split_rows),
            cache: ChunkCache::new(cfg.reuse_pool_capacity),
            lods: LodTable::default(),
            grid: MeshGrid::default(),
            patch: CollisionPatch::new(&cfg),
            cfg,
            noise,
            custom_noise,
            pool,
            sink,
            last_center: None,
            restitch_pending: true,
            visible: true,
            patch_counters: PatchCounters::default(),
        };
        mgr.setup();
        mgr
    }

    /// Lays out slots for the current config and publishes shader globals.
    fn setup(&mut self) {
        self.lods = LodTable::build(&self.cfg);
        self.grid = MeshGrid::from_table(&self.lods);
        self.cache.reset(self.cfg.reuse_pool_capacity);
        self.cache.reserve(self.grid.len() + self.cfg.reuse_pool_capacity);
        self.patch = CollisionPatch::new(&self.cfg);
        self.last_center = None;
        self.restitch_pending = true;

        self.sink.set_global(GlobalParam::Amplitude(self.cfg.amplitude));
        self.sink.set_global(GlobalParam::HeightExp(self.cfg.height_exp));
        self.sink.set_global(GlobalParam::VertStepSize(self.cfg.step_size()));
        self.sink.set_global(GlobalParam::PartitionLength(self.cfg.length()));

        info!(
            slots = self.grid.len(),
            length = self.cfg.length(),
            resolution = self.cfg.resolution(),
            render_distance = self.cfg.render_distance,
            "terrain streaming ready"
        );
    }

    #[inline]
    pub fn config(&self) -> &TerrainConfig {
        &self.cfg
    }

    #[inline]
    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    #[inline]
    pub fn scheduler(&self) -> &BuildScheduler {
        &self.sched
    }

    #[inline]
    pub fn lod_table(&self) -> &LodTable {
        &self.lods
    }

    #[inline]
    pub fn mesh_grid(&self) -> &MeshGrid {
        &self.grid
    }

    #[inline]
    pub fn collision_patch(&self) -> &CollisionPatch {
        &self.patch
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[inline]
    pub fn center(&self) -> Option<ChunkCoord> {
        self.last_center
    }

    /// Resident field for `coord`, if built.
    pub fn field(&self, coord: ChunkCoord) -> Option<&Arc<HeightField>> {
        self.cache.get(&coord)
    }

    pub fn stats(&self) -> StreamStats {
        stats::stats(self)
    }

    /// Per-frame streaming tick.
    #[instrument(level = "trace", skip(self), fields(x = vp.position.x, z = vp.position.z))]
    pub fn update(&mut self, vp: &Viewpoint) -> TickReport {
        let mut report = TickReport { completed: self.pump_completed(), ..Default::default() };

        let center = keep::viewpoint_chunk(vp.position, &self.cfg);
        if self.last_center == Some(center) && !keep::has_missing(self, center) {
            return report;
        }
        report.scanned = true;

        self.sink.set_global(GlobalParam::ClipmapPosition(center.center(self.cfg.length())));

        let rd = self.cfg.render_distance;
        for off in crate::streaming::priority::biased_offsets(rd, vp.yaw_deg) {
            let coord = center.offset(off);
            if !keep::in_range(center, coord, &self.cfg) {
                continue;
            }
            let Some(slot) = self.grid.get_mut(off) else {
                continue;
            };

            if self.sched.is_in_flight(&coord) {
                if slot.visible && slot.chunk != Some(coord) {
                    self.sink.set_visible(off, false);
                    slot.visible = false;
                }
                continue;
            }

            match self.cache.get(&coord) {
                None => {
                    if slot.visible {
                        self.sink.set_visible(off, false);
                        slot.visible = false;
                    }
                    let req = BuildRequest { coord, slot: off, lod: slot.lod };
                    if self.sched.request(req, &self.cache) {
                        report.requested += 1;
                    }
                }
                Some(field) if slot.chunk != Some(coord) => {
                    let pos = keep::mesh_position(coord, &self.cfg);
                    self.sink.update(off, &slot.lod, field, pos);
                    slot.chunk = Some(coord);
                    slot.visible = self.visible;
                    if !self.visible {
                        self.sink.set_visible(off, false);
                    }
                }
                Some(_) => {}
            }
        }

        if self.last_center != Some(center) {
            debug!(%center, requested = report.requested, "viewpoint chunk changed");
        }
        self.last_center = Some(center);

        report.evicted = keep::evict_far(self, center);
        self.sched.kick(&mut self.cache, &self.cfg);
        report
    }

    /// Applies every completion posted since the last call. Never blocks.
    pub fn pump_completed(&mut self) -> usize {
        let mut n = 0;
        while let Some(ev) = self.sched.try_recv() {
            self.apply(ev);
            n += 1;
        }
        n
    }

    /// Blocks up to `timeout` for one completion and applies it. For
    /// headless drivers and tests; a frame loop should use `update`.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.sched.recv_timeout(timeout) {
            Some(ev) => {
                self.apply(ev);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, ev: BuildEvent) {
        let Some((req, field)) = self.sched.complete(ev, &mut self.cache, &self.cfg) else {
            return;
        };
        let off = match self.last_center {
            Some(c) => c.delta(req.coord),
            None => req.slot,
        };
        if let Some(slot) = self.grid.get_mut(off) {
            let pos = keep::mesh_position(req.coord, &self.cfg);
            self.sink.update(off, &slot.lod, &field, pos);
            slot.chunk = Some(req.coord);
            slot.visible = self.visible;
            if !self.visible {
                self.sink.set_visible(off, false);
            }
        }
    }

    /// Per-physics-tick collision follow.
    pub fn physics_update(&mut self, vp: &Viewpoint) -> PatchUpdate {
        let snapped = self.patch.snap(vp.position);
        if snapped == self.patch.position() && !self.restitch_pending {
            return PatchUpdate::Unchanged;
        }
        let chunk = keep::viewpoint_chunk(vp.position, &self.cfg);
        let lean = NeighborQuery::lean(snapped, chunk, &self.cfg);
        let query =
            match NeighborQuery::gather(&self.cache, chunk, lean, &*self.noise, &self.cfg) {
                Ok(q) => q,
                Err(StreamError::IncompleteNeighborSet { missing }) => {
                    self.restitch_pending = true;
                    self.patch_counters.deferred += 1;
                    debug!(%missing, "collision restitch deferred");
                    return PatchUpdate::Deferred { missing };
                }
                Err(err) => {
                    tracing::error!(%err, "collision restitch failed");
                    self.restitch_pending = true;
                    return PatchUpdate::Unchanged;
                }
            };

        // Only a complete neighbour set moves the patch.
        self.patch.set_position(snapped);
        let report = self.patch.resample(&query);
        self.restitch_pending = false;
        self.patch_counters.restitches += 1;
        self.patch_counters.missing_heights += report.fallbacks as u64;
        PatchUpdate::Restitched(report)
    }

    /// Shows or hides every mesh slot that has a field.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        for (off, slot) in self.grid.iter_mut() {
            if slot.chunk.is_some() && slot.visible != visible {
                self.sink.set_visible(off, visible);
                slot.visible = visible;
            }
        }
    }

    /// Swaps in a new config. Generation-affecting changes tear everything
    /// down and rebuild; presentation changes are pushed to the sink.
    pub fn reconfigure(&mut self, new: TerrainConfig) -> Result<(), StreamError> {
        new.validate()?;
        if new == self.cfg {
            return Ok(());
        }

        if self.cfg.needs_full_reset(&new) {
            info!("terrain config changed; rebuilding all chunks");
            self.teardown();
            if !self.custom_noise && (new.noise != self.cfg.noise || new.seed != self.cfg.seed) {
                self.noise = Arc::new(FractalNoise::new(&new.noise, new.seed));
            }
            if new.worker_threads != self.cfg.worker_threads {
                self.pool = WorkerPool::new(new.worker_threads);
            }
            let timing = self.sched.timing;
            self.sched =
                BuildScheduler::new(self.pool.clone(), self.noise.clone(), new.generation_split_rows);
            self.sched.timing = timing;
            self.cfg = new;
            self.setup();
            return Ok(());
        }

        let old = std::mem::replace(&mut self.cfg, new);
        if old.amplitude != self.cfg.amplitude {
            self.sink.set_global(GlobalParam::Amplitude(self.cfg.amplitude));
        }
        if old.height_exp != self.cfg.height_exp {
            self.sink.set_global(GlobalParam::HeightExp(self.cfg.height_exp));
        }
        if old.world_offset != self.cfg.world_offset {
            for (off, slot) in self.grid.iter_mut() {
                if let Some(c) = slot.chunk {
                    self.sink.set_position(off, keep::mesh_position(c, &self.cfg));
                }
            }
        }
        // Collision heights bake in amplitude and offset.
        self.restitch_pending = true;
        Ok(())
    }

    fn teardown(&mut self) {
        self.sched.shutdown(&mut self.cache);
        for (off, slot) in self.grid.iter_mut() {
            if slot.visible {
                self.sink.set_visible(off, false);
            }
        }
        self.grid.clear();
        self.cache.clear();
        self.last_center = None;
    }

    /// Waits for the running build and drops everything queued. Resident
    /// chunks stay readable.
    pub fn shutdown(&mut self) {
        self.sched.shutdown(&mut self.cache);
    }
}

impl<S: MeshSink> Drop for StreamingController<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
