//! Grid Primitives
//!
//! Integer cell coordinates, the four movement directions and the board
//! geometry. Cells are used directly as hash keys, so occupancy lookups never
//! build string keys.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::rng::DeterministicRng;

/// Number of random samples tried before falling back to a row-major scan.
pub const EMPTY_CELL_SAMPLES: u32 = 200;

// =============================================================================
// POSITION
// =============================================================================

/// A single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column (0 = left edge)
    pub x: i32,
    /// Row (0 = top edge)
    pub y: i32,
}

impl Position {
    /// The top-left cell.
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell one step in `direction`.
    #[inline]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.vector();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Neighbouring cell one step against `direction`.
    #[inline]
    pub fn step_back(self, direction: Direction) -> Self {
        self.step(direction.opposite())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Movement direction. Screen coordinates: `Up` decreases `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// (0, -1)
    Up,
    /// (0, 1)
    Down,
    /// (-1, 0)
    Left,
    /// (1, 0)
    Right,
}

impl Direction {
    /// All directions, in wire-name order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit vector for this direction.
    #[inline]
    pub const fn vector(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The 180° reversal of this direction.
    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Check if `other` is the exact reversal of this direction.
    #[inline]
    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }

    /// Wire name (`"up"`, `"down"`, `"left"`, `"right"`).
    pub const fn name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Direction> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Board dimensions. Clients take the host's from each snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    /// Number of columns
    pub cols: i32,
    /// Number of rows
    pub rows: i32,
}

impl Geometry {
    /// Create a new board geometry.
    pub const fn new(cols: i32, rows: i32) -> Self {
        Self { cols, rows }
    }

    /// Check if a cell lies on the board.
    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        p.x >= 0 && p.x < self.cols && p.y >= 0 && p.y < self.rows
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        (self.cols.max(0) as usize) * (self.rows.max(0) as usize)
    }

    /// Draw a uniformly random cell (x first, then y).
    pub fn random_cell(&self, rng: &mut DeterministicRng) -> Position {
        let x = rng.next_index(self.cols.max(0) as u32) as i32;
        let y = rng.next_index(self.rows.max(0) as u32) as i32;
        Position::new(x, y)
    }

    /// Find a cell not present in `occupied`.
    ///
    /// Tries [`EMPTY_CELL_SAMPLES`] random samples first, then scans row-major
    /// for the first free cell. A completely full board yields the origin.
    pub fn pick_empty_cell(&self, occupied: &HashSet<Position>, rng: &mut DeterministicRng) -> Position {
        for _ in 0..EMPTY_CELL_SAMPLES {
            let cell = self.random_cell(rng);
            if !occupied.contains(&cell) {
                return cell;
            }
        }

        for y in 0..self.rows {
            for x in 0..self.cols {
                let cell = Position::new(x, y);
                if !occupied.contains(&cell) {
                    return cell;
                }
            }
        }

        Position::ORIGIN
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges() {
        let g = Geometry::new(5, 4);
        assert!(g.contains(Position::new(0, 0)));
        assert!(g.contains(Position::new(4, 3)));
        assert!(!g.contains(Position::new(5, 0)));
        assert!(!g.contains(Position::new(0, 4)));
        assert!(!g.contains(Position::new(-1, 2)));
        assert!(!g.contains(Position::new(2, -1)));
    }

    #[test]
    fn test_direction_opposites() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().opposite(), d);
            assert!(d.is_opposite(d.opposite()));
            assert!(!d.is_opposite(d));
            let (dx, dy) = d.vector();
            let (ox, oy) = d.opposite().vector();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
        assert!(!Direction::Up.is_opposite(Direction::Left));
    }

    #[test]
    fn test_direction_names() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_name(d.name()), Some(d));
        }
        assert_eq!(Direction::from_name("north"), None);
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "\"left\"");
    }

    #[test]
    fn test_step() {
        let p = Position::new(2, 2);
        assert_eq!(p.step(Direction::Right), Position::new(3, 2));
        assert_eq!(p.step(Direction::Up), Position::new(2, 1));
        assert_eq!(p.step_back(Direction::Right), Position::new(1, 2));
    }

    #[test]
    fn test_pick_empty_cell_avoids_occupied() {
        let g = Geometry::new(6, 6);
        let mut rng = DeterministicRng::new(7);
        let occupied: HashSet<Position> = (0..6).map(|x| Position::new(x, 0)).collect();

        for _ in 0..100 {
            let cell = g.pick_empty_cell(&occupied, &mut rng);
            assert!(g.contains(cell));
            assert!(!occupied.contains(&cell));
        }
    }

    #[test]
    fn test_pick_empty_cell_scan_fallback() {
        // Only one free cell: sampling will usually miss it, the scan must find it.
        let g = Geometry::new(20, 20);
        let free = Position::new(13, 17);
        let occupied: HashSet<Position> = (0..20)
            .flat_map(|y| (0..20).map(move |x| Position::new(x, y)))
            .filter(|p| *p != free)
            .collect();

        let mut rng = DeterministicRng::new(99);
        assert_eq!(g.pick_empty_cell(&occupied, &mut rng), free);
    }

    #[test]
    fn test_pick_empty_cell_full_board() {
        let g = Geometry::new(2, 2);
        let occupied: HashSet<Position> = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .into_iter()
            .map(|(x, y)| Position::new(x, y))
            .collect();

        let mut rng = DeterministicRng::new(1);
        assert_eq!(g.pick_empty_cell(&occupied, &mut rng), Position::ORIGIN);
    }
}
