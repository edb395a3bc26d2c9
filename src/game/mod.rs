//! Game Logic Module
//!
//! All game simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `snake`: Player identity and the snake actor
//! - `state`: World (roster, food, match clock, status)
//! - `tick`: Authoritative simulation step and replay
//! - `events`: Game events for replay/verification
//! - `snapshot`: Value projection for replication
//! - `clock`: Fixed-timestep accumulator

pub mod snake;
pub mod state;
pub mod tick;
pub mod events;
pub mod snapshot;
pub mod clock;

// Re-export key types
pub use snake::{PlayerId, Snake};
pub use state::{format_match_clock, MatchOutcome, MatchStatus, World};
pub use tick::{advance, replay_match, TickResult};
pub use events::{DeathCause, GameEvent, GameEventData};
pub use snapshot::{SnakeSnapshot, WorldSnapshot};
pub use clock::FixedStepClock;
