// src/streaming/workers.rs
// Fan-out / fan-in generation of one height field. Runs entirely on the build
// pool; the only thing that leaves it is a `BuildEvent` on the done channel.

use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{error, instrument, trace};

use crate::error::StreamError;
use crate::world::NoiseSource;

use super::build_pool::{TaskHandle, WorkerPool};
use super::height_field::{FieldGeometry, HeightField};
use super::latch::{Arrival, CompletionLatch};
use super::types::{BuildEvent, BuildRequest};

/// Shared by every build the scheduler launches.
#[derive(Clone)]
pub struct BuildContext {
    pub pool: WorkerPool,
    pub noise: Arc<dyn NoiseSource>,
    pub tx_done: Sender<BuildEvent>,
    pub split_rows: usize,
}

/// Continuation registered with a build: posts the finished field to the
/// main thread. Consumed by the arrival that completes the latch.
struct PostCompletion {
    request: BuildRequest,
    tx_done: Sender<BuildEvent>,
    started: Instant,
}

impl PostCompletion {
    fn post(self, field: HeightField) {
        let build_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        // Receiver gone => controller was dropped; nothing left to notify.
        let _ = self.tx_done.send(BuildEvent::Completed {
            request: self.request,
            field,
            build_ms,
        });
    }
}

struct Build {
    request: BuildRequest,
    geom: FieldGeometry,
    noise: Arc<dyn NoiseSource>,
    // Taken by the last arrival; each block holds the lock only to copy rows.
    field: Mutex<Option<HeightField>>,
    latch: CompletionLatch<PostCompletion>,
    tx_done: Sender<BuildEvent>,
}

/// Number of pool tasks a chunk of `rows` rows is split into.
#[inline]
pub fn block_count(rows: usize, split_rows: usize) -> usize {
    rows.div_ceil(split_rows.max(1))
}

/// Starts generating `field` (already placed at `request.coord`).
pub fn launch(ctx: &BuildContext, request: BuildRequest, field: HeightField) -> TaskHandle {
    launch_inner(ctx, request, field, true)
}

pub(crate) fn launch_inner(
    ctx: &BuildContext,
    request: BuildRequest,
    field: HeightField,
    register_continuation: bool,
) -> TaskHandle {
    let geom = *field.geometry();
    debug_assert_eq!(geom.coord, request.coord);

    let split = ctx.split_rows.max(1);
    let blocks = block_count(geom.res, split);
    let continuation = register_continuation.then(|| PostCompletion {
        request,
        tx_done: ctx.tx_done.clone(),
        started: Instant::now(),
    });

    let build = Arc::new(Build {
        request,
        geom,
        noise: ctx.noise.clone(),
        field: Mutex::new(Some(field)),
        latch: CompletionLatch::with_slot(blocks, continuation),
        tx_done: ctx.tx_done.clone(),
    });

    let pool = ctx.pool.clone();
    ctx.pool.submit(move || fan_out(&pool, build, split))
}

#[instrument(level = "trace", skip_all, fields(coord = %build.request.coord))]
fn fan_out(pool: &WorkerPool, build: Arc<Build>, split: usize) {
    let rows = build.geom.res;
    let mut start = 0;
    while start < rows {
        let end = (start + split).min(rows);
        // The final block runs here; a chunk that fits one block never
        // touches another worker.
        if end == rows {
            run_block(&build, start..end);
            return;
        }
        let b = build.clone();
        pool.spawn(move || run_block(&b, start..end));
        start = end;
    }
}

fn run_block(build: &Build, rows: Range<usize>) {
    // Noise is the expensive part; sample before taking the lock.
    let data = build.geom.sample_rows(build.noise.as_ref(), rows.clone());
    {
        let mut guard = build.field.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(field) = guard.as_mut() {
            field.write_rows(rows.start, &data);
        }
    }
    trace!(coord = %build.request.coord, rows = ?rows, "height rows written");

    match build.latch.arrive() {
        Arrival::Pending => {}
        Arrival::Last(post) => {
            let field = build.field.lock().unwrap_or_else(PoisonError::into_inner).take();
            match field {
                Some(field) => post.post(field),
                None => {
                    error!(coord = %build.request.coord, "height buffer vanished before completion");
                    let _ = build.tx_done.send(BuildEvent::Failed {
                        request: build.request,
                        error: StreamError::InvalidContinuation { coord: build.request.coord },
                    });
                }
            }
        }
        Arrival::Orphaned => {
            let coord = build.request.coord;
            error!(%coord, "height build finished with no continuation registered");
            let _ = build.tx_done.send(BuildEvent::Failed {
                request: build.request,
                error: StreamError::InvalidContinuation { coord },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use crate::config::TerrainConfig;
    use crate::streaming::types::{ChunkCoord, LodEntry};

    fn ctx(split_rows: usize, noise: Arc<dyn NoiseSource>) -> (BuildContext, crossbeam_channel::Receiver<BuildEvent>) {
        let (tx_done, rx_done) = unbounded();
        (
            BuildContext { pool: WorkerPool::new(3), noise, tx_done, split_rows },
            rx_done,
        )
    }

    fn request(coord: ChunkCoord) -> BuildRequest {
        BuildRequest { coord, slot: glam::IVec2::ZERO, lod: LodEntry::default() }
    }

    #[test]
    fn split_counts_blocks() {
        assert_eq!(block_count(67, 128), 1);
        assert_eq!(block_count(67, 10), 7);
        assert_eq!(block_count(60, 10), 6);
        assert_eq!(block_count(5, 0), 5);
    }

    #[test]
    fn fan_out_fills_every_row_and_posts_once() {
        let cfg = TerrainConfig { length_exp: 5, ..Default::default() };
        let noise: Arc<dyn NoiseSource> =
            Arc::new(|x: f64, z: f64| (((x * 31.0 + z * 17.0).abs() % 97.0) / 97.0) as f32);
        let (ctx, rx) = ctx(4, noise.clone());

        let coord = ChunkCoord::new(-2, 3);
        let mut field = HeightField::allocate(&cfg);
        field.place(coord, &cfg);
        let handle = launch(&ctx, request(coord), field);
        assert!(handle.wait_timeout(Duration::from_secs(10)));

        let ev = rx.recv_timeout(Duration::from_secs(10)).expect("no completion");
        let BuildEvent::Completed { request, field, .. } = ev else {
            panic!("build failed");
        };
        assert_eq!(request.coord, coord);

        let g = *field.geometry();
        for j in 0..g.res {
            for i in 0..g.res {
                let want = noise.sample(g.world_x(i) as f64, g.world_z(j) as f64);
                assert_eq!(field.get(i, j), want, "cell ({i}, {j})");
            }
        }
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "posted twice");
    }

    #[test]
    fn missing_continuation_reports_failure() {
        let cfg = TerrainConfig { length_exp: 4, ..Default::default() };
        let (ctx, rx) = ctx(5, Arc::new(|_x: f64, _z: f64| 0.5f32));

        let coord = ChunkCoord::new(1, 1);
        let mut field = HeightField::allocate(&cfg);
        field.place(coord, &cfg);
        launch_inner(&ctx, request(coord), field, false);

        match rx.recv_timeout(Duration::from_secs(10)).expect("no event") {
            BuildEvent::Failed { request, error } => {
                assert_eq!(request.coord, coord);
                assert!(matches!(error, StreamError::InvalidContinuation { .. }));
            }
            BuildEvent::Completed { .. } => panic!("orphaned build must not complete"),
        }
    }
}
