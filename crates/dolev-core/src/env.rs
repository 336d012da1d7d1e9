//! Environment abstraction for nondeterministic choice.
//!
//! The adversary, the scheduler and `World::receive` all make nondeterministic
//! choices. Drawing them from an `Environment` keeps the model logic
//! deterministic under a seeded implementation and unpredictable under an
//! entropy-backed one, without code changes.
//!
//! # Invariants
//!
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

/// Source of randomness for every nondeterministic choice in a run.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Unpredictability in production: Uses OS entropy
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Picks an index in `0..upper`. Returns 0 when `upper` is 0.
    ///
    /// Slight modulo bias is acceptable: choices only need coverage, not
    /// uniformity.
    fn choose(&self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.random_u64() % upper as u64) as usize
    }

    /// True with probability `numerator / denominator`.
    fn chance(&self, numerator: u32, denominator: u32) -> bool {
        denominator != 0 && self.choose(denominator as usize) < numerator as usize
    }
}
