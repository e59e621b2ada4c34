// src/streaming/cache/mod.rs
pub mod pool;

use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use tracing::trace;

use crate::config::TerrainConfig;
use crate::streaming::height_field::HeightField;
use crate::streaming::types::ChunkCoord;

pub use pool::ReusePool;

#[derive(Clone, Copy, Debug, Default)]
pub struct CacheCounters {
    pub allocated: u64,
    pub reused: u64,
    pub dropped: u64,
    pub evicted: u64,
}

/// Ready height fields by chunk, plus the buffers retired from it.
///
/// Main-thread only. Fields are immutable once inserted; readers get a
/// shared `Arc` view.
pub struct ChunkCache {
    map: HashMap<ChunkCoord, Arc<HeightField>>,
    pool: ReusePool,
    counters: CacheCounters,
}

impl ChunkCache {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            map: HashMap::default(),
            pool: ReusePool::new(pool_capacity),
            counters: CacheCounters::default(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        self.map.reserve(additional);
    }

    #[inline]
    pub fn get(&self, coord: &ChunkCoord) -> Option<&Arc<HeightField>> {
        self.map.get(coord)
    }

    #[inline]
    pub fn contains(&self, coord: &ChunkCoord) -> bool {
        self.map.contains_key(coord)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.map.keys().copied()
    }

    pub fn pool(&self) -> &ReusePool {
        &self.pool
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    /// Publishes a finished field.
    pub fn insert(&mut self, coord: ChunkCoord, field: HeightField) -> Arc<HeightField> {
        debug_assert_eq!(field.coord(), coord);
        let field = Arc::new(field);
        if let Some(old) = self.map.insert(coord, field.clone()) {
            self.retire(old);
        }
        field
    }

    /// Removes `coord` and routes its buffer to the reuse pool.
    pub fn evict(&mut self, coord: &ChunkCoord) -> bool {
        match self.map.remove(coord) {
            Some(old) => {
                self.counters.evicted += 1;
                self.retire(old);
                true
            }
            None => false,
        }
    }

    /// Evicts every resident chunk matching `far`; returns the evicted coords.
    pub fn evict_where<F>(&mut self, mut far: F) -> Vec<ChunkCoord>
    where
        F: FnMut(ChunkCoord) -> bool,
    {
        let doomed: Vec<ChunkCoord> = self.map.keys().copied().filter(|c| far(*c)).collect();
        for c in &doomed {
            self.evict(c);
        }
        doomed
    }

    /// A buffer for the next build: oldest pooled buffer, else a new one.
    pub fn acquire_buffer(&mut self, cfg: &TerrainConfig) -> HeightField {
        match self.pool.pop() {
            Some(field) => {
                self.counters.reused += 1;
                trace!(prev = %field.coord(), "reusing height buffer");
                field
            }
            None => {
                self.counters.allocated += 1;
                trace!("allocating height buffer");
                HeightField::allocate(cfg)
            }
        }
    }

    /// Drops every field and pooled buffer (grid layout changed).
    pub fn clear(&mut self) {
        self.map.clear();
        self.pool.clear();
    }

    /// Rebuilds the pool at a new capacity; pooled buffers are dropped.
    pub fn reset(&mut self, pool_capacity: usize) {
        self.clear();
        self.pool = ReusePool::new(pool_capacity);
    }

    fn retire(&mut self, field: Arc<HeightField>) {
        // A reader still holding the Arc keeps the buffer alive; let it go.
        let Ok(field) = Arc::try_unwrap(field) else {
            self.counters.dropped += 1;
            return;
        };
        if self.pool.push(field).is_err() {
            self.counters.dropped += 1;
        }
    }
}
