//! Deterministic Random Number Generator
//!
//! Uses the Mulberry32 algorithm: a single 32-bit state word advanced by a
//! fixed increment and mixed on output. Given the same seed, produces the
//! identical sequence on all platforms.

use serde::{Deserialize, Serialize};

/// Golden-ratio style increment added to the state on every draw.
const MULBERRY_INCREMENT: u32 = 0x6D2B_79F5;

/// 2^32 as a float, for mapping `u32` output into [0, 1).
const U32_RANGE: f64 = 4_294_967_296.0;

/// Deterministic PRNG using the Mulberry32 algorithm.
///
/// # Determinism Guarantee
///
/// Two generators with the same seed and the same call sequence produce
/// identical outputs. Spawn placement and food relocation depend on this for
/// reproducible matches and replay parity.
///
/// # Example
///
/// ```
/// use snake_arena::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(42);
/// assert_eq!(rng.next_u32(), 2581720956); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u32,
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 32-bit seed.
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next 32-bit random value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(MULBERRY_INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / U32_RANGE
    }

    /// Generate an index in [0, n) as `floor(next_f64() * n)`.
    ///
    /// Returns 0 when `n` is 0.
    #[inline]
    pub fn next_index(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        // Exact: the product is below n and fits the f64 mantissa.
        (self.next_f64() * n as f64) as u32
    }

    /// Generate a boolean that is true with the given probability.
    #[inline]
    pub fn next_bool(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: u32) {
        self.state = state;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        assert_ne!(rng1.next_u32(), rng2.next_u32());
    }

    #[test]
    fn test_rng_known_values() {
        // These values must never change!
        // If they do, recorded replays will diverge.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u32(), 2581720956);
        assert_eq!(rng.next_u32(), 1925393290);
        assert_eq!(rng.next_u32(), 3661312704);

        let mut rng = DeterministicRng::new(123456789);
        assert_eq!(rng.next_u32(), 1107202814);
        assert_eq!(rng.next_u32(), 4169434471);
        assert_eq!(rng.next_u32(), 3372958138);
    }

    #[test]
    fn test_next_f64_range() {
        let mut rng = DeterministicRng::new(2024);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_next_index() {
        let mut rng = DeterministicRng::new(1234);

        for _ in 0..1000 {
            assert!(rng.next_index(24) < 24);
        }

        // Edge cases
        assert_eq!(rng.next_index(0), 0);
        assert_eq!(rng.next_index(1), 0);
    }

    #[test]
    fn test_next_index_matches_float_floor() {
        let mut a = DeterministicRng::new(77);
        let mut b = DeterministicRng::new(77);
        for _ in 0..500 {
            let expected = (b.next_f64() * 16.0).floor() as u32;
            assert_eq!(a.next_index(16), expected);
        }
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = DeterministicRng::new(5555);

        for _ in 0..50 {
            rng.next_u32();
        }

        let saved_state = rng.state();
        let next_values: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();

        rng.set_state(saved_state);

        for expected in next_values {
            assert_eq!(rng.next_u32(), expected);
        }
    }
}
