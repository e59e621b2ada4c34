// src/main.rs
// Headless driver: flies a viewpoint over the terrain and logs streaming stats.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use glam::Vec3;
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

use terrain_stream::{
    profiler::TickProf,
    streaming::{GlobalParam, GridOffset, HeightField, LodEntry, PatchUpdate},
    MeshSink, StreamError, StreamingController, TerrainConfig, Viewpoint,
};

const FRAME: Duration = Duration::from_millis(16);
const STREAM_PERIOD: Duration = Duration::from_millis(33); // 30 Hz
const FRAMES: u32 = 900;
const SPEED: f32 = 40.0; // world units per second

/// Counts what a renderer would have been asked to do.
#[derive(Default)]
struct CountingSink {
    updates: u64,
    hidden: u64,
}

impl MeshSink for CountingSink {
    fn update(&mut self, slot: GridOffset, lod: &LodEntry, field: &HeightField, position: Vec3) {
        self.updates += 1;
        trace!(?slot, lod = lod.center, coord = %field.coord(), ?position, "mesh update");
    }

    fn set_visible(&mut self, _slot: GridOffset, visible: bool) {
        if !visible {
            self.hidden += 1;
        }
    }

    fn set_global(&mut self, param: GlobalParam) {
        trace!(?param, "shader global");
    }
}

/// Scripted path: straight legs with a 90 degree turn every `leg` seconds.
fn flight(t: f32, leg: f32) -> Viewpoint {
    let legs = (t / leg).floor();
    let into = t - legs * leg;
    let mut pos = Vec3::ZERO;
    let mut yaw: f32 = 0.0;
    for _ in 0..legs as u32 {
        pos += heading(yaw) * leg * SPEED;
        yaw = turn(yaw);
    }
    pos += heading(yaw) * into * SPEED;
    Viewpoint::new(pos, yaw)
}

fn heading(yaw_deg: f32) -> Vec3 {
    let r = yaw_deg.to_radians();
    Vec3::new(r.sin(), 0.0, r.cos())
}

fn turn(yaw_deg: f32) -> f32 {
    let y = yaw_deg + 90.0;
    if y > 180.0 { y - 360.0 } else { y }
}

fn run(cfg: TerrainConfig) -> Result<(), StreamError> {
    let mut terrain = StreamingController::new(cfg, CountingSink::default())?;
    let mut prof = TickProf::new(Duration::from_secs(1));

    let start = Instant::now();
    let mut last_stream: Option<Instant> = None;
    for frame in 0..FRAMES {
        let t0 = Instant::now();
        let vp = flight(frame as f32 * FRAME.as_secs_f32(), 4.0);

        let ts = Instant::now();
        let completed = terrain.pump_completed();
        prof.add_tick(0, 0, completed);
        if last_stream.map_or(true, |t| t.elapsed() >= STREAM_PERIOD) {
            let r = terrain.update(&vp);
            prof.add_tick(r.requested, r.evicted, r.completed);
            last_stream = Some(Instant::now());
        }
        prof.stream(TickProf::mark_ms(ts));

        let tp = Instant::now();
        if let PatchUpdate::Restitched(r) = terrain.physics_update(&vp) {
            prof.add_restitch();
            if let Some(h) = terrain.collision_patch().ground_height(vp.position) {
                trace!(revision = r.revision, ground = h, "collision patch moved");
            }
        }
        prof.physics(TickProf::mark_ms(tp));

        let stats = prof.should_print().then(|| terrain.stats());
        prof.end_tick(TickProf::mark_ms(t0), stats);

        if let Some(rest) = FRAME.checked_sub(t0.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    terrain.shutdown();
    let s = terrain.stats();
    let sink = terrain.sink();
    info!(
        secs = start.elapsed().as_secs_f32(),
        builds = s.builds_done,
        reused = s.buffers_reused,
        allocated = s.buffers_allocated,
        mesh_updates = sink.updates,
        hides = sink.hidden,
        "flight finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => TerrainConfig::load(&path),
        None => Ok(TerrainConfig::default()),
    };

    match cfg.and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "terrain-stream failed");
            ExitCode::FAILURE
        }
    }
}
