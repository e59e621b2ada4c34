// src/streaming/manager/stats.rs
use crate::streaming::sink::MeshSink;
use crate::streaming::types::*;

use super::StreamingController;

pub fn stats<S: MeshSink>(mgr: &StreamingController<S>) -> StreamStats {
    let mut s = StreamStats::default();

    if let Some(c) = mgr.last_center {
        s.center = (c.x, c.y, c.z);
    }

    s.resident = mgr.cache.len() as u32;
    s.mesh_slots = mgr.grid.len() as u32;

    s.in_flight = mgr.sched.in_flight_len() as u32;
    s.queued = mgr.sched.queued_len() as u32;
    s.launched = mgr.sched.launched_len() as u32;

    let pool = mgr.cache.pool();
    s.pool_len = pool.len() as u32;
    s.pool_capacity = pool.capacity() as u32;

    let c = mgr.cache.counters();
    s.buffers_allocated = c.allocated;
    s.buffers_reused = c.reused;
    s.buffers_dropped = c.dropped;
    s.evicted = c.evicted;

    let t = mgr.sched.timing;
    s.builds_done = t.builds_done;
    s.builds_failed = t.builds_failed;
    s.build_ms_avg = t.avg_ms();
    s.build_ms_max = t.build_ms_max;

    s.restitches = mgr.patch_counters.restitches;
    s.restitches_deferred = mgr.patch_counters.deferred;
    s.missing_heights = mgr.patch_counters.missing_heights;

    s
}
