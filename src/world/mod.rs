
pub mod generator;

pub use generator::{FractalNoise, NoiseSource};
