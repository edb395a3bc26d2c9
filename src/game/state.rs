//! World State
//!
//! The authoritative simulation: roster, food, match clock and status.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::core::grid::{Direction, Geometry, Position};
use crate::core::hash::{compute_state_hash, StateHash, StateHasher};
use crate::core::rng::DeterministicRng;
use crate::game::events::GameEvent;
use crate::game::snake::{PlayerId, Snake};

/// Random spawn trials before the fixed fallback is used.
pub const SPAWN_TRIALS: u32 = 400;

/// Food cell before the first placement.
const INITIAL_FOOD: Position = Position::new(5, 5);

// =============================================================================
// MATCH STATUS
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MatchStatus {
    /// No match started yet
    #[default]
    Menu = 0,
    /// Ticks advance
    Running = 1,
    /// Frozen until toggled back
    Paused = 2,
    /// Time ran out; outcome is set
    Over = 3,
}

// =============================================================================
// MATCH OUTCOME
// =============================================================================

/// Result of a finished match.
///
/// Externally tagged so it also round-trips through bincode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// A single longest snake
    Winner {
        /// Winner's display name
        name: String,
        /// Winning length
        length: u32,
    },
    /// Several snakes share the maximum length
    Draw {
        /// Shared length
        length: u32,
    },
    /// Empty roster
    NoPlayers,
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOutcome::Winner { name, length } => write!(f, "{name} wins ({length})"),
            MatchOutcome::Draw { length } => write!(f, "Draw ({length})"),
            MatchOutcome::NoPlayers => f.write_str("No players"),
        }
    }
}

/// Format remaining match time as `MM:SS`, rounding seconds up.
pub fn format_match_clock(ms: u64) -> String {
    let total_seconds = ms.div_ceil(1000);
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

// =============================================================================
// WORLD
// =============================================================================

/// Complete simulation state.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug)]
pub struct World {
    /// Board dimensions
    pub geometry: Geometry,

    /// Deterministic RNG
    pub rng: DeterministicRng,

    /// RNG seed (for verification)
    pub rng_seed: u32,

    /// All snakes, keyed by id
    pub snakes: BTreeMap<PlayerId, Snake>,

    /// Single food cell
    pub food: Position,

    /// Current tick
    pub tick: u32,

    /// Configured match length
    pub match_duration_ms: u64,

    /// Time left in the current match
    pub remaining_ms: u64,

    /// Current match status
    pub status: MatchStatus,

    /// Set once the match is over
    pub outcome: Option<MatchOutcome>,

    /// Events generated since the last `take_events`
    pending_events: Vec<GameEvent>,
}

impl World {
    /// Create an empty world in the menu state.
    pub fn new(config: &GameConfig) -> Self {
        let geometry = config.geometry();
        Self {
            geometry,
            rng: DeterministicRng::new(config.rng_seed),
            rng_seed: config.rng_seed,
            snakes: BTreeMap::new(),
            food: Position::new(
                INITIAL_FOOD.x.min(geometry.cols - 1).max(0),
                INITIAL_FOOD.y.min(geometry.rows - 1).max(0),
            ),
            tick: 0,
            match_duration_ms: config.match_duration_ms,
            remaining_ms: config.match_duration_ms,
            status: MatchStatus::Menu,
            outcome: None,
            pending_events: Vec::new(),
        }
    }

    /// Get a snake by ID.
    pub fn get_snake(&self, id: &PlayerId) -> Option<&Snake> {
        self.snakes.get(id)
    }

    /// Check if the match is advancing.
    pub fn is_running(&self) -> bool {
        self.status == MatchStatus::Running
    }

    /// Every cell covered by a snake body.
    pub fn occupied_cells(&self) -> HashSet<Position> {
        self.snakes
            .values()
            .flat_map(|s| s.segments().iter().copied())
            .collect()
    }

    /// Register a snake, or refresh the name/color of an existing one.
    ///
    /// Empty strings leave the existing name/color untouched. New snakes get
    /// a fresh spawn and the food is moved off them if needed.
    pub fn add_or_update_snake(&mut self, id: PlayerId, name: &str, color: &str) {
        if let Some(existing) = self.snakes.get_mut(&id) {
            if !name.is_empty() {
                existing.name = name.to_string();
            }
            if !color.is_empty() {
                existing.color = color.to_string();
            }
            return;
        }

        let (segments, direction) = self.pick_valid_spawn();
        let snake = Snake::new(id.clone(), name, color, segments, direction);
        self.snakes.insert(id, snake);
        self.ensure_food_clear();
    }

    /// Queue a direction for a snake. Unknown ids are ignored.
    ///
    /// Returns whether the direction was stored.
    pub fn queue_direction(&mut self, id: &PlayerId, direction: Direction) -> bool {
        match self.snakes.get_mut(id) {
            Some(snake) => snake.queue_direction(direction),
            None => false,
        }
    }

    /// Drop every snake.
    pub fn clear_snakes(&mut self) {
        self.snakes.clear();
    }

    /// Place the food on a random cell not covered by a snake.
    pub fn spawn_food(&mut self) {
        let occupied = self.occupied_cells();
        self.food = self.geometry.pick_empty_cell(&occupied, &mut self.rng);
    }

    /// Relocate the food if it sits on a snake.
    pub fn ensure_food_clear(&mut self) {
        if self.snakes.values().any(|s| s.occupies(self.food)) {
            self.spawn_food();
        }
    }

    /// Find a horizontal 2-cell spawn clear of every current snake cell.
    ///
    /// Each trial draws the facing first (right below 0.5), then the head
    /// column and row. Falls back to `[(2,2),(1,2)]` facing right.
    pub fn pick_valid_spawn(&mut self) -> (Vec<Position>, Direction) {
        let occupied = self.occupied_cells();

        for _ in 0..SPAWN_TRIALS {
            let direction = if self.rng.next_bool(0.5) {
                Direction::Right
            } else {
                Direction::Left
            };
            let head = self.geometry.random_cell(&mut self.rng);
            let tail = head.step_back(direction);

            if !self.geometry.contains(head) || !self.geometry.contains(tail) {
                continue;
            }
            if occupied.contains(&head) || occupied.contains(&tail) {
                continue;
            }
            return (vec![head, tail], direction);
        }

        (vec![Position::new(2, 2), Position::new(1, 2)], Direction::Right)
    }

    /// Respawn one snake in place, recording the current tick.
    ///
    /// Returns the new head, or `None` for an unknown id.
    pub fn respawn_snake(&mut self, id: &PlayerId) -> Option<Position> {
        if !self.snakes.contains_key(id) {
            return None;
        }
        let (segments, direction) = self.pick_valid_spawn();
        let tick = self.tick;
        let snake = self.snakes.get_mut(id)?;
        snake.reset_to(segments, direction, tick);
        Some(snake.head())
    }

    /// Reset clock and outcome, respawn every snake and place food.
    pub fn start_new_match(&mut self) {
        self.tick = 0;
        self.remaining_ms = self.match_duration_ms;
        self.outcome = None;
        self.status = MatchStatus::Running;

        let ids: Vec<PlayerId> = self.snakes.keys().cloned().collect();
        for id in &ids {
            self.respawn_snake(id);
        }

        self.spawn_food();
    }

    /// Switch between running and paused. No effect in other states.
    pub fn toggle_pause(&mut self) {
        self.status = match self.status {
            MatchStatus::Running => MatchStatus::Paused,
            MatchStatus::Paused => MatchStatus::Running,
            other => other,
        };
    }

    /// Finish the match and rank snakes by length.
    pub fn end_match(&mut self) -> MatchOutcome {
        self.status = MatchStatus::Over;

        let best = self.snakes.values().map(Snake::len).max();
        let outcome = match best {
            None => MatchOutcome::NoPlayers,
            Some(best_len) => {
                let mut leaders = self.snakes.values().filter(|s| s.len() == best_len);
                match (leaders.next(), leaders.next()) {
                    (Some(winner), None) => MatchOutcome::Winner {
                        name: winner.name.clone(),
                        length: best_len as u32,
                    },
                    _ => MatchOutcome::Draw {
                        length: best_len as u32,
                    },
                }
            }
        };

        self.outcome = Some(outcome.clone());
        self.push_event(GameEvent::match_ended(self.tick, outcome.clone()));
        outcome
    }

    /// Outcome as display text, empty while undecided.
    pub fn outcome_text(&self) -> String {
        self.outcome.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            hasher.update_u32(self.rng.state());
            hasher.update_u8(self.status as u8);
            hasher.update_u64(self.remaining_ms);
            hasher.update_position(self.food);

            // BTreeMap guarantees sorted order
            for snake in self.snakes.values() {
                hash_snake(snake, hasher);
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

fn hash_snake(snake: &Snake, hasher: &mut StateHasher) {
    hasher.update_str(snake.id.as_str());
    hasher.update_u32(snake.len() as u32);
    for cell in snake.segments() {
        hasher.update_position(*cell);
    }
    hasher.update_u8(snake.direction() as u8);
    hasher.update_u8(snake.next_direction() as u8);
    hasher.update_u32(snake.pending_growth());
}

// =============================================================================
// TESTS
// =============================================================================
