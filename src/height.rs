//! Tower height sampling
//!
//! Heights follow a geometric distribution: start at one and keep flipping a
//! fair coin, adding a level per head, until the first tail. That gives
//! `P(height >= k) = 2^-(k-1)`. The walk is capped so a freak run of heads
//! cannot blow up memory.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default cap on tower height
pub const DEFAULT_MAX_HEIGHT: usize = 32;

/// Largest cap a configuration may ask for
pub const MAX_SUPPORTED_HEIGHT: usize = 64;

/// Coin-flip height generator
#[derive(Debug, Clone)]
pub struct HeightSampler {
    rng: StdRng,
    max_height: usize,
}

impl HeightSampler {
    /// Sampler seeded from system entropy
    pub fn new(max_height: usize) -> Self {
        Self::from_rng(StdRng::from_entropy(), max_height)
    }

    /// Reproducible sampler
    pub fn seeded(max_height: usize, seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), max_height)
    }

    fn from_rng(rng: StdRng, max_height: usize) -> Self {
        Self {
            rng,
            max_height: max_height.clamp(1, MAX_SUPPORTED_HEIGHT),
        }
    }

    /// The cap applied to every sample
    pub fn max_height(&self) -> usize {
        self.max_height
    }

    /// Draw the next tower height, in `1..=max_height`
    pub fn sample(&mut self) -> usize {
        let mut height = 1;
        while height < self.max_height && self.rng.gen_bool(0.5) {
            height += 1;
        }
        height
    }
}
