// src/config.rs
// -------------
// Terrain streaming knobs. One `TerrainConfig` value is built at startup and
// shared by reference; changing it goes through `StreamingController::reconfigure`.

use std::{fs, path::Path};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StreamError;

pub const DEFAULT_STEP_EXP: u8 = 0;
pub const DEFAULT_LENGTH_EXP: u8 = 6;
pub const DEFAULT_RENDER_DISTANCE: i32 = 6;

// Rows generated per worker task. A chunk whose padded height fits in one
// block is generated on a single worker.
pub const DEFAULT_SPLIT_ROWS: usize = 128;

// 31 cuts => 32x32 quads in the collision plane.
pub const DEFAULT_COLLISION_SUBDIVISIONS: u32 = 31;

// Upper bound so a typo can't ask for a 2^30 sample grid.
const MAX_LENGTH_EXP: u8 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    Perlin,
    OpenSimplex,
    SuperSimplex,
    Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalKind {
    None,
    Fbm,
    Billow,
    Ridged,
}

/// Which distance decides "inside render distance".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Round disc of chunks.
    Euclidean,
    /// Square of chunks.
    Chebyshev,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub kind: NoiseKind,
    pub fractal: FractalKind,
    pub frequency: f64,
    /// Number of noise layers summed.
    pub octaves: usize,
    /// Frequency change between successive octaves.
    pub lacunarity: f64,
    /// Strength falloff of successive octaves.
    pub gain: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            kind: NoiseKind::SuperSimplex,
            fractal: FractalKind::Fbm,
            frequency: 1.0 / (1000.0 * (1u32 << DEFAULT_STEP_EXP) as f64),
            octaves: 10,
            lacunarity: 2.0,
            gain: 0.45,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub seed: u32,
    /// Sample spacing is `2^step_exp` world units.
    pub step_exp: u8,
    /// Chunk edge is `2^length_exp` world units.
    pub length_exp: u8,
    pub amplitude: f32,
    pub height_exp: f32,
    pub noise: NoiseSettings,
    /// In chunks. A chunk is kept while `distance < render_distance`.
    pub render_distance: i32,
    pub distance_metric: DistanceMetric,
    pub reuse_pool_capacity: usize,
    /// Only `y` shifts heights; `x`/`z` move mesh placement.
    pub world_offset: Vec3,
    pub generation_split_rows: usize,
    /// 0 = use the process-wide build pool.
    pub worker_threads: usize,
    pub collision_subdivisions: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            step_exp: DEFAULT_STEP_EXP,
            length_exp: DEFAULT_LENGTH_EXP,
            amplitude: 1.0,
            height_exp: 1.0,
            noise: NoiseSettings::default(),
            render_distance: DEFAULT_RENDER_DISTANCE,
            distance_metric: DistanceMetric::Euclidean,
            reuse_pool_capacity: DEFAULT_RENDER_DISTANCE as usize,
            world_offset: Vec3::ZERO,
            generation_split_rows: DEFAULT_SPLIT_ROWS,
            worker_threads: 0,
            collision_subdivisions: DEFAULT_COLLISION_SUBDIVISIONS,
        }
    }
}

impl TerrainConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, StreamError> {
        let cfg: TerrainConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, StreamError> {
        let text = fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "loaded terrain config");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.length_exp > MAX_LENGTH_EXP {
            return Err(StreamError::config(format!(
                "length_exp {} exceeds {}",
                self.length_exp, MAX_LENGTH_EXP
            )));
        }
        if self.step_exp >= self.length_exp {
            return Err(StreamError::config(format!(
                "step_exp {} must be smaller than length_exp {}",
                self.step_exp, self.length_exp
            )));
        }
        // The collision patch needs the axis neighbours of the viewpoint chunk.
        if self.render_distance < 2 {
            return Err(StreamError::config("render_distance must be at least 2"));
        }
        if self.generation_split_rows == 0 {
            return Err(StreamError::config("generation_split_rows must be non-zero"));
        }
        if self.collision_subdivisions == 0 {
            return Err(StreamError::config("collision_subdivisions must be non-zero"));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(StreamError::config("amplitude must be finite and non-negative"));
        }
        if !self.height_exp.is_finite() || self.height_exp <= 0.0 {
            return Err(StreamError::config("height_exp must be positive"));
        }
        if !(1..=32).contains(&self.noise.octaves) {
            return Err(StreamError::config("noise.octaves must be in 1..=32"));
        }
        if !self.noise.frequency.is_finite() || self.noise.frequency <= 0.0 {
            return Err(StreamError::config("noise.frequency must be positive"));
        }
        Ok(())
    }

    #[inline]
    pub fn step_size(&self) -> f32 {
        (1u32 << self.step_exp) as f32
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (1u32 << self.length_exp) as f32
    }

    /// Samples per side: one per step across the chunk, the closing edge,
    /// and one padding sample on each side for seamless normals.
    #[inline]
    pub fn resolution(&self) -> usize {
        (1usize << (self.length_exp - self.step_exp)) + 1 + 2
    }

    #[inline]
    pub fn lod_limit(&self) -> u8 {
        self.length_exp - self.step_exp - 1
    }

    /// Edge length of the square collision patch.
    #[inline]
    pub fn collision_size(&self) -> f32 {
        (self.collision_subdivisions + 1) as f32 * self.step_size()
    }

    /// World height of a normalized sample.
    #[inline]
    pub fn true_height(&self, normalized: f32) -> f32 {
        (normalized * self.amplitude).powf(self.height_exp) + self.world_offset.y
    }

    /// True when switching from `self` to `other` invalidates generated
    /// chunks or the grid layout. Amplitude, height exponent and world
    /// offset only change how stored samples are interpreted.
    pub fn needs_full_reset(&self, other: &TerrainConfig) -> bool {
        self.seed != other.seed
            || self.step_exp != other.step_exp
            || self.length_exp != other.length_exp
            || self.noise != other.noise
            || self.render_distance != other.render_distance
            || self.distance_metric != other.distance_metric
            || self.reuse_pool_capacity != other.reuse_pool_capacity
            || self.generation_split_rows != other.generation_split_rows
            || self.worker_threads != other.worker_threads
            || self.collision_subdivisions != other.collision_subdivisions
    }
}
