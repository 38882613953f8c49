//! Seedable random numbers for grain variations.

use rand::{rngs::SmallRng, Rng, SeedableRng};

// -------------------------------------------------------------------------------------------------

/// Small, fast and seedable pseudo random number source.
///
/// Each voice owns its own instance, so randomized grain parameters are reproducible for a given
/// seed and never shared across threads.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: SmallRng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// A uniform random value in range `[0, 1)`.
    #[inline]
    pub fn unipolar(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// A uniform random value in range `[-1, 1)`.
    #[inline]
    pub fn bipolar(&mut self) -> f32 {
        self.rng.random::<f32>() * 2.0 - 1.0
    }

    /// Bernoulli draw: true with the given probability. Probabilities outside of `[0, 1]`
    /// saturate.
    #[inline]
    pub fn chance(&mut self, probability: f32) -> bool {
        self.unipolar() < probability
    }
}

// -------------------------------------------------------------------------------------------------
