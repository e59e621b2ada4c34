// src/streaming/cache/pool.rs
use std::collections::VecDeque;

use crate::streaming::height_field::HeightField;

/// Fixed-capacity FIFO of retired height buffers. Only saves allocations;
/// contents are garbage until the next generation pass overwrites them.
pub struct ReusePool {
    ring: VecDeque<HeightField>,
    capacity: usize,
}

impl ReusePool {
    pub fn new(capacity: usize) -> Self {
        Self { ring: VecDeque::with_capacity(capacity), capacity }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Hands the buffer back when the pool is full.
    pub fn push(&mut self, field: HeightField) -> Result<(), HeightField> {
        if self.ring.len() >= self.capacity {
            return Err(field);
        }
        self.ring.push_back(field);
        Ok(())
    }

    /// Oldest retired buffer first.
    pub fn pop(&mut self) -> Option<HeightField> {
        self.ring.pop_front()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}
