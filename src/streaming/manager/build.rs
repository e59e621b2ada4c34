// src/streaming/manager/build.rs
// Creation queue + in-flight bookkeeping. Main-thread only; workers talk back
// exclusively through `rx_done`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use rustc_hash::FxHashMap as HashMap;
use tracing::{debug, error, warn};

use crate::config::TerrainConfig;
use crate::streaming::{
    build_pool::{TaskHandle, WorkerPool},
    cache::ChunkCache,
    height_field::HeightField,
    types::{BuildEvent, BuildRequest, ChunkCoord},
    workers::{self, BuildContext},
};
use crate::world::NoiseSource;

// Completion events in flight at once; launches are serialized so this
// never fills.
const DONE_CHANNEL_CAP: usize = 8;

// Teardown gives up on a lost completion after this long.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum BuildPhase {
    Queued,
    Launched(TaskHandle),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BuildTiming {
    pub builds_done: u64,
    pub builds_failed: u64,
    pub build_ms_sum: f64,
    pub build_ms_max: f64,
}

impl BuildTiming {
    fn record(&mut self, build_ms: f64) {
        self.builds_done += 1;
        self.build_ms_sum += build_ms;
        self.build_ms_max = self.build_ms_max.max(build_ms);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.builds_done == 0 {
            0.0
        } else {
            self.build_ms_sum / self.builds_done as f64
        }
    }
}

pub struct BuildScheduler {
    in_flight: HashMap<ChunkCoord, BuildPhase>,
    queue: VecDeque<BuildRequest>,
    active: Option<ChunkCoord>,

    ctx: BuildContext,
    rx_done: Receiver<BuildEvent>,

    pub timing: BuildTiming,
}

impl BuildScheduler {
    pub fn new(pool: WorkerPool, noise: Arc<dyn NoiseSource>, split_rows: usize) -> Self {
        let (tx_done, rx_done) = bounded::<BuildEvent>(DONE_CHANNEL_CAP);
        Self {
            in_flight: HashMap::default(),
            queue: VecDeque::new(),
            active: None,
            ctx: BuildContext { pool, noise, tx_done, split_rows },
            rx_done,
            timing: BuildTiming::default(),
        }
    }

    #[inline]
    pub fn is_in_flight(&self, coord: &ChunkCoord) -> bool {
        self.in_flight.contains_key(coord)
    }

    #[inline]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    #[inline]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Builds currently running on the pool (0 or 1).
    pub fn launched_len(&self) -> usize {
        self.in_flight
            .values()
            .filter(|p| matches!(p, BuildPhase::Launched(_)))
            .count()
    }

    #[inline]
    pub fn active(&self) -> Option<ChunkCoord> {
        self.active
    }

    /// Queues a build. No-op (returns false) when the chunk is already
    /// resident or already requested.
    pub fn request(&mut self, req: BuildRequest, cache: &ChunkCache) -> bool {
        if cache.contains(&req.coord) || self.in_flight.contains_key(&req.coord) {
            return false;
        }
        self.in_flight.insert(req.coord, BuildPhase::Queued);
        self.queue.push_back(req);
        true
    }

    /// Launches the queue head if nothing is running.
    pub fn kick(&mut self, cache: &mut ChunkCache, cfg: &TerrainConfig) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(req) = self.queue.pop_front() else {
            return false;
        };

        let mut field = cache.acquire_buffer(cfg);
        field.place(req.coord, cfg);

        debug!(coord = %req.coord, queued = self.queue.len(), "launching height build");
        let handle = workers::launch(&self.ctx, req, field);
        self.in_flight.insert(req.coord, BuildPhase::Launched(handle));
        self.active = Some(req.coord);
        true
    }

    /// Next posted completion, if any. Never blocks.
    pub fn try_recv(&self) -> Option<BuildEvent> {
        self.rx_done.try_recv().ok()
    }

    /// Blocks up to `timeout` for a completion.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BuildEvent> {
        match self.rx_done.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Main-thread continuation of a build: install, forget, launch next.
    /// Returns the installed field so the caller can show it.
    pub fn complete(
        &mut self,
        ev: BuildEvent,
        cache: &mut ChunkCache,
        cfg: &TerrainConfig,
    ) -> Option<(BuildRequest, Arc<HeightField>)> {
        let coord = ev.request().coord;
        if self.active != Some(coord) {
            // Only the launched build can post; anything else is a bug upstream.
            error!(%coord, active = ?self.active, "completion for a build that is not running");
        }

        let shown = match ev {
            BuildEvent::Completed { request, field, build_ms } => {
                self.timing.record(build_ms);
                debug!(coord = %request.coord, build_ms, "height build complete");
                let field = cache.insert(request.coord, field);
                Some((request, field))
            }
            BuildEvent::Failed { request, error } => {
                self.timing.builds_failed += 1;
                error!(coord = %request.coord, %error, "height build failed");
                None
            }
        };

        self.in_flight.remove(&coord);
        if self.active == Some(coord) {
            self.active = None;
        }
        self.kick(cache, cfg);
        shown
    }

    /// Drops queued requests and waits out the running build. The only
    /// blocking path in the scheduler; never call from a pool thread.
    pub fn shutdown(&mut self, cache: &mut ChunkCache) {
        self.queue.clear();
        self.in_flight.retain(|_, p| matches!(p, BuildPhase::Launched(_)));

        let Some(coord) = self.active.take() else {
            return;
        };
        if let Some(BuildPhase::Launched(handle)) = self.in_flight.get(&coord) {
            handle.wait();
        }
        match self.rx_done.recv_timeout(DRAIN_TIMEOUT) {
            Ok(BuildEvent::Completed { request, field, build_ms }) => {
                self.timing.record(build_ms);
                cache.insert(request.coord, field);
            }
            Ok(BuildEvent::Failed { request, error }) => {
                self.timing.builds_failed += 1;
                error!(coord = %request.coord, %error, "height build failed during shutdown");
            }
            Err(err) => {
                warn!(%coord, %err, "gave up waiting for height build during shutdown");
            }
        }
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::types::LodEntry;

    fn cfg() -> TerrainConfig {
        TerrainConfig { length_exp: 3, generation_split_rows: 4, ..Default::default() }
    }

    fn sched() -> BuildScheduler {
        BuildScheduler::new(WorkerPool::new(2), Arc::new(|_x: f64, _z: f64| 0.75f32), 4)
    }

    fn req(x: i32, z: i32) -> BuildRequest {
        BuildRequest { coord: ChunkCoord::new(x, z), slot: glam::IVec2::new(x, z), lod: LodEntry::default() }
    }

    fn finish_one(s: &mut BuildScheduler, cache: &mut ChunkCache) -> BuildRequest {
        let ev = s.recv_timeout(Duration::from_secs(10)).expect("build never completed");
        let (r, _) = s.complete(ev, cache, &cfg()).expect("build failed");
        r
    }

    #[test]
    fn duplicate_requests_are_noops() {
        let mut s = sched();
        let mut cache = ChunkCache::new(2);
        assert!(s.request(req(0, 0), &cache));
        assert!(!s.request(req(0, 0), &cache));
        assert_eq!(s.queued_len(), 1);
        assert_eq!(s.in_flight_len(), 1);

        assert!(s.kick(&mut cache, &cfg()));
        assert!(!s.request(req(0, 0), &cache));
        assert_eq!(s.in_flight_len(), 1);
        assert_eq!(s.queued_len(), 0);

        finish_one(&mut s, &mut cache);
        assert!(cache.contains(&ChunkCoord::new(0, 0)));
        assert!(!s.is_in_flight(&ChunkCoord::new(0, 0)));

        // Resident => no-op.
        assert!(!s.request(req(0, 0), &cache));
        assert_eq!(s.in_flight_len(), 0);
        assert_eq!(s.queued_len(), 0);
    }

    #[test]
    fn launches_one_at_a_time_in_fifo_order() {
        let mut s = sched();
        let mut cache = ChunkCache::new(2);
        let order = [req(0, 0), req(1, 0), req(-1, 2), req(3, 3)];
        for r in order {
            assert!(s.request(r, &cache));
        }

        assert!(s.kick(&mut cache, &cfg()));
        assert!(!s.kick(&mut cache, &cfg()));
        assert_eq!(s.launched_len(), 1);

        let mut done = Vec::new();
        while s.in_flight_len() > 0 {
            assert!(s.launched_len() <= 1);
            done.push(finish_one(&mut s, &mut cache).coord);
        }
        let want: Vec<_> = order.iter().map(|r| r.coord).collect();
        assert_eq!(done, want);

        for c in want {
            let f = cache.get(&c).unwrap();
            assert!(f.samples().iter().all(|&v| v == 0.75));
        }
        assert_eq!(s.timing.builds_done, 4);
    }

    #[test]
    fn shutdown_waits_for_running_build_and_drops_queue() {
        let mut s = sched();
        let mut cache = ChunkCache::new(2);
        s.request(req(0, 0), &cache);
        s.request(req(0, 1), &cache);
        s.kick(&mut cache, &cfg());

        s.shutdown(&mut cache);
        assert_eq!(s.in_flight_len(), 0);
        assert_eq!(s.queued_len(), 0);
        assert!(s.active().is_none());
        assert!(cache.contains(&ChunkCoord::new(0, 0)));
        assert!(!cache.contains(&ChunkCoord::new(0, 1)));
    }
}
