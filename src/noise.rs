// ============================================================================
// NOISE GENERATORS — seeded integer-hash noise + multi-octave value noise
// ============================================================================
//
// All functions are pure in the seed context: for a fixed `NoiseContext` and
// fixed inputs the results are bit-identical across calls and across single-
// vs multi-threaded dispatch. Callers capture the context by value before a
// filter pass; reseeding produces a *new* context and cannot disturb a pass
// already in flight.
// ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color::{clamp01, lerp};

// ============================================================================
// SEED CONTEXT
// ============================================================================

/// The three integers parametrizing the hash noise function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseContext {
    r1: i32,
    r2: i32,
    r3: i32,
}

impl NoiseContext {
    /// A fresh context with seeds drawn from the process-wide random source.
    pub fn reseed() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            r1: 1_000 + rng.gen_range(0..90_000),
            r2: 10_000 + rng.gen_range(0..900_000),
            r3: 100_000 + rng.gen_range(0..1_000_000_000),
        }
    }

    /// Explicit seeds, for reproducible output.
    pub fn from_seeds(r1: i32, r2: i32, r3: i32) -> Self {
        Self { r1, r2, r3 }
    }

    /// Deterministic pseudo-random value in [-1, 1] for an integer lattice
    /// point. All arithmetic is wrapping 32-bit.
    #[inline]
    pub fn hash_noise(&self, x: i32, y: i32) -> f32 {
        let mut n = x.wrapping_add(y.wrapping_mul(57));
        n = (n << 13) ^ n;
        let poly = n
            .wrapping_mul(n.wrapping_mul(n).wrapping_mul(self.r1).wrapping_add(self.r2))
            .wrapping_add(self.r3);
        1.0 - (poly & 0x7fff_ffff) as f32 / 1.073_741_82e9
    }
}

impl Default for NoiseContext {
    fn default() -> Self {
        // arbitrary but fixed seeds, in the same ranges reseed() draws from
        Self::from_seeds(45_289, 561_337, 764_033_219)
    }
}

// ============================================================================
// INTERPOLATION KERNELS
// ============================================================================

/// Kernel used to blend the four lattice corners of a noise cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Linear,
    Cosine,
    Cubic,
}

impl Interpolation {
    /// Remap a blend factor in [0, 1] through the kernel.
    #[inline]
    pub fn step(self, t: f32) -> f32 {
        match self {
            Interpolation::Linear => t,
            Interpolation::Cosine => 0.5 * (1.0 - (t * std::f32::consts::PI).cos()),
            Interpolation::Cubic => t * t * (3.0 - 2.0 * t),
        }
    }
}

// ============================================================================
// SMOOTH / MULTI-OCTAVE SAMPLING
// ============================================================================

#[inline]
fn interpolate(a: f32, b: f32, t: f32, interp: Interpolation) -> f32 {
    lerp(interp.step(t), a, b)
}

/// Sample the 2x2 lattice cell around `(x, y)` and blend the corner hashes.
/// Output stays in [-1, 1].
pub fn smooth_noise(ctx: NoiseContext, x: f32, y: f32, interp: Interpolation) -> f32 {
    let ix = x as i32;
    let iy = y as i32;

    let n1 = ctx.hash_noise(ix, iy);
    let n2 = ctx.hash_noise(ix + 1, iy);
    let n3 = ctx.hash_noise(ix, iy + 1);
    let n4 = ctx.hash_noise(ix + 1, iy + 1);

    let i1 = interpolate(n1, n2, x - ix as f32, interp);
    let i2 = interpolate(n3, n4, x - ix as f32, interp);

    interpolate(i1, i2, y - iy as f32, interp)
}

/// Multi-octave value noise in [0, 1].
///
/// Each octave samples [`smooth_noise`] at the current frequency and
/// accumulates it scaled by the running amplitude; frequency doubles and
/// amplitude decays by `persistence` per octave. `frequency` is `1/scale`
/// for a user-facing zoom parameter.
pub fn value_noise(
    ctx: NoiseContext,
    x: i32,
    y: i32,
    octaves: u32,
    mut frequency: f32,
    persistence: f32,
    interp: Interpolation,
) -> f32 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    for _ in 0..octaves {
        total += smooth_noise(ctx, x as f32 * frequency, y as f32 * frequency, interp) * amplitude;
        frequency *= 2.0;
        amplitude *= persistence;
    }
    clamp01(total)
}

/// Signed smooth noise in [-1, 1] at fractional coordinates, the sampler the
/// procedural texture filters build on.
#[inline]
pub fn noise2(ctx: NoiseContext, x: f32, y: f32) -> f32 {
    smooth_noise(ctx, x, y, Interpolation::Cubic)
}

/// Turbulence: octaves of [`noise2`] magnitudes, each scaled by 1/frequency.
/// `octaves` may be fractional; sampling stops once the frequency exceeds it.
pub fn turbulence2(ctx: NoiseContext, x: f32, y: f32, octaves: f32) -> f32 {
    let mut t = 0.0;
    let mut f = 1.0;
    while f <= octaves {
        t += noise2(ctx, f * x, f * y).abs() / f;
        f *= 2.0;
    }
    t
}

// ============================================================================
// TESTS
// ============================================================================
