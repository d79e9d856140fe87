use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of candidate account numbers.
///
/// Implementations only propose values; uniqueness is checked by the account
/// store, which asks again on collision.
pub trait AccountNumberGenerator: Send + Sync {
    /// A candidate consisting of exactly `length` ASCII digits.
    fn generate(&self, length: usize) -> String;
}

/// Uniformly random digits.
pub struct RandomDigits {
    rng: Mutex<StdRng>,
}

impl RandomDigits {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible sequence, for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomDigits {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountNumberGenerator for RandomDigits {
    fn generate(&self, length: usize) -> String {
        // A poisoned lock only means another thread panicked mid-draw; the rng
        // state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }
}

/// Size of the number space for `length` digits.
pub(crate) fn number_space(length: usize) -> u64 {
    10u64.pow(length as u32)
}

/// The candidate following `current`, wrapping to all zeros after all nines.
pub(crate) fn next_in_sequence(current: &str, length: usize) -> String {
    let value = current.parse::<u64>().unwrap_or(0);
    let next = (value + 1) % number_space(length);
    format!("{:0width$}", next, width = length)
}
