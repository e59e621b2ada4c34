// src/lib.rs
pub mod config;
pub mod error;
pub mod physics;
pub mod profiler;
pub mod streaming;
pub mod world;

pub use config::TerrainConfig;
pub use error::StreamError;
pub use streaming::{MeshSink, NullSink, StreamingController, Viewpoint};
pub use world::{FractalNoise, NoiseSource};
