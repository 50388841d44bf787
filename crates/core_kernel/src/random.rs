//! Injectable pseudo-random source
//!
//! Rules that sample a fraction of claims draw from a `RandomSource` handed
//! to them at construction time. Production seeds `StdRandom` from OS
//! entropy; tests seed it with a fixed value to get reproducible draws.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::CoreError;

/// Source of uniformly distributed integers
pub trait RandomSource: Send + Sync {
    /// Draws an integer in `1..=max`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when `max` is zero
    fn draw(&self, max: u32) -> Result<u32, CoreError>;
}

/// `RandomSource` over a shared `StdRng`
#[derive(Debug)]
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    /// Seeds the generator from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeds the generator with a fixed value; equal seeds give equal draws
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for StdRandom {
    fn draw(&self, max: u32) -> Result<u32, CoreError> {
        if max == 0 {
            return Err(CoreError::validation("random draw upper bound must be at least 1"));
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rng.gen_range(1..=max))
    }
}
