// src/streaming/priority.rs
// Request ordering. The creation queue is strict FIFO, so whatever order we
// enumerate the grid in is the order chunks get built.

use super::types::GridOffset;

/// Inclusive integer range walked ascending, or descending when flipped.
#[derive(Clone, Copy, Debug)]
pub struct FlipRange {
    next: i32,
    last: i32,
    step: i32,
    done: bool,
}

impl FlipRange {
    pub fn new(min: i32, max: i32, flip: bool) -> Self {
        let (next, last, step) = if flip { (max, min, -1) } else { (min, max, 1) };
        Self { next, last, step, done: min > max }
    }
}

impl Iterator for FlipRange {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.done {
            return None;
        }
        let v = self.next;
        if v == self.last {
            self.done = true;
        } else {
            self.next += self.step;
        }
        Some(v)
    }
}

/// Axis flips from the viewpoint yaw (degrees, 0 = facing +z, positive
/// turning toward +x). The far side of each axis relative to travel is
/// enumerated last.
#[inline]
pub fn facing_flips(yaw_deg: f32) -> (bool, bool) {
    let x_flip = yaw_deg < 0.0 && yaw_deg >= -180.0;
    let z_flip = yaw_deg > 90.0 || yaw_deg <= -90.0;
    (x_flip, z_flip)
}

/// Offsets of the `(2r+1)^2` grid in direction-biased order: x outer, z inner.
pub fn biased_offsets(radius: i32, yaw_deg: f32) -> impl Iterator<Item = GridOffset> {
    let (x_flip, z_flip) = facing_flips(yaw_deg);
    FlipRange::new(-radius, radius, x_flip).flat_map(move |x| {
        FlipRange::new(-radius, radius, z_flip).map(move |z| GridOffset::new(x, z))
    })
}
