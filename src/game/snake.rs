//! Snake (per-player actor)
//!
//! A snake is a head-first body of grid cells plus its movement intent.
//! Movement is split in two: `peek_next_head` computes where the head would
//! go without touching state, `commit_step` applies the move once the world
//! has decided the snake survives.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::grid::{Direction, Position};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identity. Shared by the roster and the transport's client ids.
///
/// Implements Ord (lexicographic) for deterministic BTreeMap ordering.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// SNAKE
// =============================================================================

/// State of a single snake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snake {
    /// Unique player ID
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Display color (CSS color string, e.g. `#7cf7c2`)
    pub color: String,

    /// Body cells, head first. Never empty.
    segments: VecDeque<Position>,

    /// Direction used on the last committed step
    direction: Direction,

    /// Direction to adopt on the next step
    next_direction: Direction,

    /// Growth credits; each one keeps the tail for one step
    pending_growth: u32,

    /// Tick of the most recent (re)spawn after death, `None` if never
    last_death_tick: Option<u32>,
}

impl Snake {
    /// Create a snake with the given body and facing.
    ///
    /// An empty `segments` list is replaced by a single cell at the origin
    /// so the head always exists.
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        color: impl Into<String>,
        segments: impl IntoIterator<Item = Position>,
        direction: Direction,
    ) -> Self {
        let mut segments: VecDeque<Position> = segments.into_iter().collect();
        if segments.is_empty() {
            segments.push_back(Position::ORIGIN);
        }

        Self {
            id,
            name: name.into(),
            color: color.into(),
            segments,
            direction,
            next_direction: direction,
            pending_growth: 0,
            last_death_tick: None,
        }
    }

    /// Head cell.
    #[inline]
    pub fn head(&self) -> Position {
        self.segments[0]
    }

    /// Body cells, head first.
    pub fn segments(&self) -> &VecDeque<Position> {
        &self.segments
    }

    /// Body length in cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; a snake has at least a head.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Current direction.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Direction that the next step will use.
    #[inline]
    pub fn next_direction(&self) -> Direction {
        self.next_direction
    }

    /// Outstanding growth credits.
    #[inline]
    pub fn pending_growth(&self) -> u32 {
        self.pending_growth
    }

    /// Tick of the last death, if any.
    #[inline]
    pub fn last_death_tick(&self) -> Option<u32> {
        self.last_death_tick
    }

    /// Check if the body covers `cell`.
    pub fn occupies(&self, cell: Position) -> bool {
        self.segments.contains(&cell)
    }

    /// Queue a direction for the next step.
    ///
    /// A 180° reversal of the current direction is rejected. Returns whether
    /// the direction was stored.
    pub fn queue_direction(&mut self, direction: Direction) -> bool {
        if direction.is_opposite(self.direction) {
            return false;
        }
        self.next_direction = direction;
        true
    }

    /// Where the head would move on the next step. Does not mutate.
    #[inline]
    pub fn peek_next_head(&self) -> Position {
        self.head().step(self.next_direction)
    }

    /// Apply one step with `new_head` as the new head cell.
    ///
    /// Adopts the queued direction, prepends the head and drops the tail
    /// unless a growth credit is pending (then one credit is consumed).
    pub fn commit_step(&mut self, new_head: Position) {
        if !self.next_direction.is_opposite(self.direction) {
            self.direction = self.next_direction;
        }

        self.segments.push_front(new_head);

        if self.pending_growth > 0 {
            self.pending_growth -= 1;
        } else {
            self.segments.pop_back();
        }
    }

    /// Add growth credits.
    pub fn grow(&mut self, amount: u32) {
        self.pending_growth = self.pending_growth.saturating_add(amount);
    }

    /// Replace body and heading wholesale; records `tick` as the death tick.
    pub fn reset_to(&mut self, segments: Vec<Position>, direction: Direction, tick: u32) {
        if !segments.is_empty() {
            self.segments = segments.into();
        }
        self.direction = direction;
        self.next_direction = direction;
        self.pending_growth = 0;
        self.last_death_tick = Some(tick);
    }
}

// =============================================================================
// TESTS
// =============================================================================
