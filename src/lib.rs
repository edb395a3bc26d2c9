//! # Snake Arena
//!
//! Host-authoritative multiplayer grid snake with a deterministic simulation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SNAKE ARENA                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Positions, directions, board geometry     │
//! │  ├── rng.rs      - Deterministic Mulberry32 PRNG             │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── snake.rs    - Snake actor and player ids                │
//! │  ├── state.rs    - World: roster, food, match clock          │
//! │  ├── tick.rs     - Authoritative simulation step             │
//! │  ├── events.rs   - Deaths, food, respawns, match end         │
//! │  ├── snapshot.rs - Replicated state projection               │
//! │  └── clock.rs    - Fixed-timestep accumulator                │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Game payloads and relay messages          │
//! │  ├── sequence.rs - Sequenced delivery buffer                 │
//! │  ├── transport.rs- Transport trait and subscriptions         │
//! │  ├── loopback.rs - In-process transport                      │
//! │  ├── ws.rs       - WebSocket transport                       │
//! │  ├── relay.rs    - WebSocket relay server                    │
//! │  └── session.rs  - Local / host / client controller          │
//! │                                                              │
//! │  config.rs       - Board, seed, timing, local players        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - Integer grid coordinates only
//! - BTreeMap for every iteration that affects state
//! - No system time dependencies; time enters as explicit `dt_ms`
//! - All randomness from the seeded Mulberry32 generator
//!
//! Given identical inputs and RNG seed, the simulation produces
//! **identical results** and identical state hashes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, GameConfig, LocalPlayer};
pub use core::grid::{Direction, Geometry, Position};
pub use core::rng::DeterministicRng;
pub use game::snake::{PlayerId, Snake};
pub use game::state::{MatchOutcome, MatchStatus, World};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Board columns
pub const DEFAULT_COLS: i32 = 24;

/// Board rows
pub const DEFAULT_ROWS: i32 = 16;

/// Seed for spawn and food placement
pub const DEFAULT_RNG_SEED: u32 = 123_456_789;

/// Match length (60 seconds)
pub const DEFAULT_MATCH_DURATION_MS: u64 = 60_000;

/// Simulation tick rate (Hz)
pub const DEFAULT_TICK_RATE_HZ: u32 = 10;
