//! Seeded random source for probabilistic fault injection.
//!
//! With a seed the sequence of injected faults is the same on every run,
//! which keeps flaky-link tests repeatable.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Shared ChaCha8 generator behind a mutex.
pub struct FaultRng {
    inner: Mutex<ChaCha8Rng>,
}

impl FaultRng {
    /// Seeded generator, or one seeded from OS entropy when `seed` is `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// `true` with probability `rate`; rates outside `(0, 1)` saturate.
    pub fn roll(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_bool(rate)
    }
}

impl Default for FaultRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for FaultRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FaultRng")
    }
}
