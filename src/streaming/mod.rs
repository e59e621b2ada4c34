// src/streaming/mod.rs
// Height-field chunk streaming: build pool, cache + reuse pool, scheduler.

pub mod build_pool;
pub mod cache;
pub mod height_field;
pub mod latch;
pub mod manager;
pub mod priority;
pub mod sink;
pub mod types;
pub mod workers;

pub use cache::ChunkCache;
pub use height_field::{FieldGeometry, HeightField};
pub use manager::{PatchUpdate, StreamingController, TickReport, Viewpoint};
pub use sink::{GlobalParam, MeshSink, NullSink};
pub use types::{ChunkCoord, GridOffset, LodEntry, StreamStats};
