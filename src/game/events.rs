//! Game Events
//!
//! Events generated during simulation for replay, logging and tests.

use serde::{Deserialize, Serialize};

use crate::core::grid::Position;
use crate::game::snake::PlayerId;
use crate::game::state::MatchOutcome;

/// Why a snake died.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeathCause {
    /// Head left the board
    OutOfBounds,
    /// Head entered a cell held by a body (possibly its own)
    Collision {
        /// Snake whose body was hit
        owner: PlayerId,
    },
    /// Two or more heads targeted the same cell
    HeadOn,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Snake died this tick
    SnakeDied {
        /// Snake that died
        snake_id: PlayerId,
        /// Cell it tried to enter
        at: Position,
        /// What killed it
        cause: DeathCause,
    },

    /// Snake ate the food
    FoodEaten {
        /// Snake that ate
        snake_id: PlayerId,
        /// Where the food was
        at: Position,
        /// Where the food moved to
        next_food: Position,
    },

    /// Snake was placed on a fresh spawn
    SnakeRespawned {
        /// Snake placed again
        snake_id: PlayerId,
        /// New head cell
        head: Position,
    },

    /// Match ended
    MatchEnded {
        /// Final result
        outcome: MatchOutcome,
    },
}

/// A game event, stamped with the tick it happened on.
///
/// Events keep the order `advance` produced them in: deaths, survivors'
/// food pickups, respawns, with snakes in id order within each group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create snake died event.
    pub fn snake_died(tick: u32, snake_id: PlayerId, at: Position, cause: DeathCause) -> Self {
        Self::new(tick, GameEventData::SnakeDied { snake_id, at, cause })
    }

    /// Create food eaten event.
    pub fn food_eaten(tick: u32, snake_id: PlayerId, at: Position, next_food: Position) -> Self {
        Self::new(tick, GameEventData::FoodEaten { snake_id, at, next_food })
    }

    /// Create snake respawned event.
    pub fn snake_respawned(tick: u32, snake_id: PlayerId, head: Position) -> Self {
        Self::new(tick, GameEventData::SnakeRespawned { snake_id, head })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u32, outcome: MatchOutcome) -> Self {
        Self::new(tick, GameEventData::MatchEnded { outcome })
    }

    /// Snake the event is about, if any.
    pub fn snake_id(&self) -> Option<&PlayerId> {
        match &self.data {
            GameEventData::SnakeDied { snake_id, .. }
            | GameEventData::FoodEaten { snake_id, .. }
            | GameEventData::SnakeRespawned { snake_id, .. } => Some(snake_id),
            GameEventData::MatchEnded { .. } => None,
        }
    }
}
