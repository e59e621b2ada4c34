// src/world/generator.rs

use noise::{
    Billow, Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, RidgedMulti, Seedable, SuperSimplex,
    Value,
};

use crate::config::{FractalKind, NoiseKind, NoiseSettings};

/// Scalar field sampled by height generation.
///
/// Implementations must be pure: the same `(x, z)` always yields the same
/// value, and concurrent calls from worker threads are allowed.
pub trait NoiseSource: Send + Sync {
    /// Normalized height in `[0, 1]` at world position `(x, z)`.
    fn sample(&self, x: f64, z: f64) -> f32;
}

type BoxedNoise = Box<dyn NoiseFn<f64, 2> + Send + Sync>;

/// Default sampler: a `noise` crate basis optionally wrapped in a fractal.
pub struct FractalNoise {
    field: BoxedNoise,
}

impl FractalNoise {
    pub fn new(settings: &NoiseSettings, seed: u32) -> Self {
        let field = match settings.kind {
            NoiseKind::Perlin => build::<Perlin>(settings, seed),
            NoiseKind::OpenSimplex => build::<OpenSimplex>(settings, seed),
            NoiseKind::SuperSimplex => build::<SuperSimplex>(settings, seed),
            NoiseKind::Value => build::<Value>(settings, seed),
        };
        Self { field }
    }
}

fn build<T>(s: &NoiseSettings, seed: u32) -> BoxedNoise
where
    T: Default + Seedable + NoiseFn<f64, 2> + Send + Sync + 'static,
{
    match s.fractal {
        FractalKind::None => Box::new(Scaled {
            inner: T::default().set_seed(seed),
            frequency: s.frequency,
        }),
        FractalKind::Fbm => Box::new(
            Fbm::<T>::new(seed)
                .set_octaves(s.octaves)
                .set_frequency(s.frequency)
                .set_lacunarity(s.lacunarity)
                .set_persistence(s.gain),
        ),
        FractalKind::Billow => Box::new(
            Billow::<T>::new(seed)
                .set_octaves(s.octaves)
                .set_frequency(s.frequency)
                .set_lacunarity(s.lacunarity)
                .set_persistence(s.gain),
        ),
        FractalKind::Ridged => Box::new(
            RidgedMulti::<T>::new(seed)
                .set_octaves(s.octaves)
                .set_frequency(s.frequency)
                .set_lacunarity(s.lacunarity)
                .set_persistence(s.gain),
        ),
    }
}

// Plain basis functions have no frequency knob of their own.
struct Scaled<T> {
    inner: T,
    frequency: f64,
}

impl<T: NoiseFn<f64, 2>> NoiseFn<f64, 2> for Scaled<T> {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.inner.get([point[0] * self.frequency, point[1] * self.frequency])
    }
}

impl NoiseSource for FractalNoise {
    #[inline]
    fn sample(&self, x: f64, z: f64) -> f32 {
        // [-1, 1] => [0, 1]; fractal sums can overshoot slightly.
        let v = (self.field.get([x, z]) + 1.0) * 0.5;
        v.clamp(0.0, 1.0) as f32
    }
}

impl<F> NoiseSource for F
where
    F: Fn(f64, f64) -> f32 + Send + Sync,
{
    #[inline]
    fn sample(&self, x: f64, z: f64) -> f32 {
        self(x, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_normalized_and_deterministic() {
        for kind in [NoiseKind::Perlin, NoiseKind::OpenSimplex, NoiseKind::SuperSimplex, NoiseKind::Value] {
            for fractal in [FractalKind::None, FractalKind::Fbm, FractalKind::Billow, FractalKind::Ridged] {
                let settings = NoiseSettings { kind, fractal, frequency: 0.013, ..Default::default() };
                let a = FractalNoise::new(&settings, 11);
                let b = FractalNoise::new(&settings, 11);
                for i in 0..64 {
                    let x = i as f64 * 7.3 - 200.0;
                    let z = i as f64 * -3.1 + 50.0;
                    let v = a.sample(x, z);
                    assert!((0.0..=1.0).contains(&v), "{kind:?}/{fractal:?} gave {v}");
                    assert_eq!(v, b.sample(x, z));
                }
            }
        }
    }

    #[test]
    fn closures_are_noise_sources() {
        let flat = |_x: f64, _z: f64| 0.25f32;
        let src: &dyn NoiseSource = &flat;
        assert_eq!(src.sample(1.0, 2.0), 0.25);
    }
}
