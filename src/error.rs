// src/error.rs
use thiserror::Error;

use crate::streaming::types::ChunkCoord;

#[derive(Error, Debug)]
pub enum StreamError {
    /// A collision vertex fell outside every candidate neighbor. Recovered
    /// with a direct noise evaluation.
    #[error("no neighbor height field covers x={x}, z={z}")]
    MissingNeighbor { x: f32, z: f32 },

    /// A neighbor chunk needed for restitching is not resident yet.
    #[error("neighbor chunk {missing} is not resident; restitch deferred")]
    IncompleteNeighborSet { missing: ChunkCoord },

    /// The fan-in counter reached zero without a registered continuation.
    #[error("build for chunk {coord} finished without a completion continuation")]
    InvalidContinuation { coord: ChunkCoord },

    #[error("invalid terrain config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl StreamError {
    pub fn config<T: ToString>(msg: T) -> Self {
        StreamError::InvalidConfig(msg.to_string())
    }
}
