//! Core deterministic primitives.
//!
//! Grid coordinates, the seeded generator and state hashing. Everything the
//! simulation needs to produce identical results for identical inputs.

pub mod grid;
pub mod rng;
pub mod hash;

// Re-export core types
pub use grid::{Direction, Geometry, Position};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
