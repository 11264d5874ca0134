//! Seedable uniform `u32` sampler used for perturbation refresh.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A uniform `u32` source. Abstracted behind a trait so tests can
/// inject a deterministic sequence without reaching into scheduler
/// internals.
pub trait RngSource: Send + Sync + std::fmt::Debug {
    fn next_u32(&mut self) -> u32;
}

/// Default perturbation source, seedable for reproducible simulation
/// runs.
#[derive(Debug)]
pub struct StdRngSource(StdRng);

impl StdRngSource {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for StdRngSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RngSource for StdRngSource {
    fn next_u32(&mut self) -> u32 {
        self.0.r#gen()
    }
}
