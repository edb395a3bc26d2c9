//! State Projection
//!
//! Value copies of the world for replication. Clients never simulate; they
//! replace their local world with each snapshot the host sends.

use serde::{Deserialize, Serialize};

use crate::core::grid::{Direction, Geometry, Position};
use crate::game::snake::{PlayerId, Snake};
use crate::game::state::{MatchOutcome, MatchStatus, World};

/// One snake as seen by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeSnapshot {
    /// Snake id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Display color
    pub color: String,
    /// Current facing
    pub direction: Direction,
    /// Head first
    pub segments: Vec<Position>,
}

/// Everything a client needs to render the match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Host tick
    pub tick: u32,
    /// Match status
    pub status: MatchStatus,
    /// Time left in the match
    pub remaining_ms: u64,
    /// Board size
    pub board: Geometry,
    /// Food cell
    pub food: Position,
    /// Snakes in id order
    pub snakes: Vec<SnakeSnapshot>,
    /// Set once the match is over
    pub outcome: Option<MatchOutcome>,
}

impl WorldSnapshot {
    /// Serialize to compact bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from compact bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Look up a snake by id.
    pub fn snake(&self, id: &PlayerId) -> Option<&SnakeSnapshot> {
        self.snakes.iter().find(|s| &s.id == id)
    }
}

impl World {
    /// Project the current state. Snakes are listed in id order.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            status: self.status,
            remaining_ms: self.remaining_ms,
            board: self.geometry,
            food: self.food,
            snakes: self
                .snakes
                .values()
                .map(|s| SnakeSnapshot {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    color: s.color.clone(),
                    direction: s.direction(),
                    segments: s.segments().iter().copied().collect(),
                })
                .collect(),
            outcome: self.outcome.clone(),
        }
    }

    /// Replace the world with a snapshot.
    ///
    /// Every local snake is discarded and rebuilt. The board size follows
    /// the sender's.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) {
        self.geometry = snapshot.board;
        self.tick = snapshot.tick;
        self.status = snapshot.status;
        self.remaining_ms = snapshot.remaining_ms;
        self.food = snapshot.food;
        self.outcome = snapshot.outcome.clone();

        self.snakes.clear();
        for s in &snapshot.snakes {
            let snake = Snake::new(
                s.id.clone(),
                s.name.clone(),
                s.color.clone(),
                s.segments.iter().copied(),
                s.direction,
            );
            self.snakes.insert(s.id.clone(), snake);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn running_world() -> World {
        let mut world = World::new(&GameConfig::default());
        world.add_or_update_snake(PlayerId::new("local-1"), "P1", "#7cf7c2");
        world.add_or_update_snake(PlayerId::new("local-2"), "P2", "#788cff");
        world.start_new_match();
        world
    }

    #[test]
    fn test_snapshot_apply_preserves_snakes() {
        let host = running_world();
        let snapshot = host.snapshot();

        let mut client = World::new(&GameConfig::default());
        client.add_or_update_snake(PlayerId::new("stale"), "Old", "#000");
        client.apply_snapshot(&snapshot);

        assert_eq!(client.snakes.len(), 2);
        assert!(client.get_snake(&PlayerId::new("stale")).is_none());
        for (id, hs) in &host.snakes {
            let cs = client.get_snake(id).unwrap();
            assert_eq!(cs.name, hs.name);
            assert_eq!(cs.color, hs.color);
            assert_eq!(cs.direction(), hs.direction());
            assert_eq!(cs.segments(), hs.segments());
        }
        assert_eq!(client.snapshot(), snapshot);
    }

    #[test]
    fn test_snapshot_apply_adopts_board() {
        let host = running_world();
        let snapshot = host.snapshot();

        let small = GameConfig {
            cols: 10,
            rows: 8,
            ..GameConfig::default()
        };
        let mut client = World::new(&small);
        client.apply_snapshot(&snapshot);

        assert_eq!(client.geometry, host.geometry);
        assert_eq!(client.snapshot(), snapshot);
    }

    #[test]
    fn test_snapshot_is_value_copy() {
        let mut host = running_world();
        let snapshot = host.snapshot();

        let id = PlayerId::new("local-1");
        host.snakes.get_mut(&id).unwrap().grow(3);
        let head = host.snakes[&id].peek_next_head();
        host.snakes.get_mut(&id).unwrap().commit_step(head);

        assert_eq!(snapshot.snake(&id).unwrap().segments.len(), 2);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = running_world().snapshot();
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["status"], "running");
        assert_eq!(value["board"]["cols"], 24);
        assert_eq!(value["snakes"][0]["id"], "local-1");
        assert!(value["outcome"].is_null());

        let back: WorldSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_snapshot_bytes() {
        let mut world = running_world();
        world.end_match();
        let snapshot = world.snapshot();

        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(WorldSnapshot::from_bytes(&bytes).unwrap(), snapshot);
        assert!(WorldSnapshot::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }
}
