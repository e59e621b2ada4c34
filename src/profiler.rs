use std::time::{Duration, Instant};

use tracing::info;

use crate::streaming::types::StreamStats;

/// Windowed per-tick timings for a streaming driver. Prints (via tracing)
/// once per `print_every`, then resets the window.
pub struct TickProf {
    pub tick: u64,
    pub last_print: Instant,
    pub print_every: Duration,

    pub n_ticks: u64,
    pub t_stream: f64,
    pub t_physics: f64,

    pub requested: u64,
    pub evicted: u64,
    pub completed: u64,
    pub restitched: u64,

    pub max_tick_ms: f64,
}

impl TickProf {
    pub fn new(print_every: Duration) -> Self {
        Self {
            tick: 0,
            last_print: Instant::now(),
            print_every,

            n_ticks: 0,
            t_stream: 0.0,
            t_physics: 0.0,

            requested: 0,
            evicted: 0,
            completed: 0,
            restitched: 0,

            max_tick_ms: 0.0,
        }
    }

    #[inline]
    pub fn mark_ms(t0: Instant) -> f64 {
        t0.elapsed().as_secs_f64() * 1000.0
    }

    #[inline] pub fn stream(&mut self, ms: f64) { self.t_stream += ms; }
    #[inline] pub fn physics(&mut self, ms: f64) { self.t_physics += ms; }

    pub fn add_tick(&mut self, requested: usize, evicted: usize, completed: usize) {
        self.requested += requested as u64;
        self.evicted += evicted as u64;
        self.completed += completed as u64;
    }

    pub fn add_restitch(&mut self) {
        self.restitched += 1;
    }

    #[inline]
    pub fn should_print(&self) -> bool {
        self.last_print.elapsed() >= self.print_every
    }

    pub fn end_tick(&mut self, tick_ms: f64, stats: Option<StreamStats>) {
        self.tick += 1;
        self.n_ticks += 1;
        self.max_tick_ms = self.max_tick_ms.max(tick_ms);

        if !self.should_print() {
            return;
        }

        let nt = self.n_ticks.max(1) as f64;
        info!(
            ticks = self.tick,
            avg_stream_ms = self.t_stream / nt,
            avg_physics_ms = self.t_physics / nt,
            max_tick_ms = self.max_tick_ms,
            requested = self.requested,
            evicted = self.evicted,
            completed = self.completed,
            restitched = self.restitched,
            "[prof]"
        );

        if let Some(s) = stats {
            info!(
                center = ?s.center,
                resident = s.resident,
                in_flight = s.in_flight,
                queued = s.queued,
                pool_len = s.pool_len,
                pool_capacity = s.pool_capacity,
                allocated = s.buffers_allocated,
                reused = s.buffers_reused,
                dropped = s.buffers_dropped,
                builds = s.builds_done,
                failed = s.builds_failed,
                build_ms_avg = s.build_ms_avg,
                build_ms_max = s.build_ms_max,
                deferred = s.restitches_deferred,
                missing_heights = s.missing_heights,
                "[stream]"
            );
        }

        // reset window counters, keep tick + print_every
        self.last_print = Instant::now();
        self.n_ticks = 0;
        self.t_stream = 0.0;
        self.t_physics = 0.0;
        self.requested = 0;
        self.evicted = 0;
        self.completed = 0;
        self.restitched = 0;
        self.max_tick_ms = 0.0;
    }
}
