//! Authoritative Simulation Tick
//!
//! The core game loop that must be 100% deterministic. Only the host (or a
//! local-mode instance) calls `advance`; clients apply snapshots instead.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::grid::{Direction, Position};
use crate::game::events::{DeathCause, GameEvent};
use crate::game::snake::PlayerId;
use crate::game::state::World;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether match ended this tick
    pub match_ended: bool,
}

/// Run one simulation step of `dt_ms` milliseconds.
///
/// # Order
///
/// 1. Burn match time; at zero, end the match and stop.
/// 2. Advance the tick counter.
/// 3. Compute every candidate head.
/// 4. Snapshot occupancy of all bodies before anyone moves.
/// 5. Out-of-bounds and body hits (own tail included) kill.
/// 6. Heads targeting the same cell all die.
/// 7. Survivors move.
/// 8. Food: first survivor (by id) on it grows; food moves immediately.
/// 9. Dead snakes respawn.
/// 10. Food is moved off any snake.
///
/// # Determinism
///
/// Snakes are processed in id order (BTreeMap) and all randomness comes from
/// `world.rng`. A world that is not running is left untouched.
pub fn advance(world: &mut World, dt_ms: u64) -> TickResult {
    let mut result = TickResult::default();

    if !world.is_running() {
        return result;
    }

    // 1. Match clock
    world.remaining_ms = world.remaining_ms.saturating_sub(dt_ms);
    if world.remaining_ms == 0 {
        world.end_match();
        result.events = world.take_events();
        result.match_ended = true;
        return result;
    }

    // 2. Advance tick counter
    world.tick += 1;
    let tick = world.tick;

    // 3. Candidate heads
    let candidates: BTreeMap<PlayerId, Position> = world
        .snakes
        .iter()
        .map(|(id, snake)| (id.clone(), snake.peek_next_head()))
        .collect();

    // 4. Pre-move occupancy, first writer wins
    let mut occupancy: HashMap<Position, &PlayerId> = HashMap::new();
    for (id, snake) in &world.snakes {
        for cell in snake.segments() {
            occupancy.entry(*cell).or_insert(id);
        }
    }

    // 5. Walls and bodies
    let mut deaths: BTreeMap<PlayerId, DeathCause> = BTreeMap::new();
    for (id, head) in &candidates {
        if !world.geometry.contains(*head) {
            deaths.insert(id.clone(), DeathCause::OutOfBounds);
        } else if let Some(owner) = occupancy.get(head) {
            deaths.insert(
                id.clone(),
                DeathCause::Collision {
                    owner: (*owner).clone(),
                },
            );
        }
    }
    drop(occupancy);

    // 6. Head-on-head
    let mut targets: HashMap<Position, Vec<&PlayerId>> = HashMap::new();
    for (id, head) in &candidates {
        targets.entry(*head).or_default().push(id);
    }
    for ids in targets.values().filter(|ids| ids.len() >= 2) {
        for id in ids {
            deaths.entry((*id).clone()).or_insert(DeathCause::HeadOn);
        }
    }

    for (id, cause) in &deaths {
        let at = candidates[id];
        world.push_event(GameEvent::snake_died(tick, id.clone(), at, cause.clone()));
    }

    // 7. Move survivors
    let survivors: BTreeSet<&PlayerId> = candidates
        .keys()
        .filter(|id| !deaths.contains_key(*id))
        .collect();
    for id in &survivors {
        if let Some(snake) = world.snakes.get_mut(*id) {
            snake.commit_step(candidates[*id]);
        }
    }

    // 8. Food
    for id in &survivors {
        let on_food = world
            .snakes
            .get(*id)
            .is_some_and(|snake| snake.head() == world.food);
        if !on_food {
            continue;
        }
        let eaten_at = world.food;
        if let Some(snake) = world.snakes.get_mut(*id) {
            snake.grow(1);
        }
        // Later snakes are checked against the relocated food.
        world.spawn_food();
        world.push_event(GameEvent::food_eaten(tick, (*id).clone(), eaten_at, world.food));
    }

    // 9. Respawn
    for id in deaths.keys() {
        if let Some(head) = world.respawn_snake(id) {
            world.push_event(GameEvent::snake_respawned(tick, id.clone(), head));
        }
    }

    // 10. Food clear of every body
    world.ensure_food_clear();

    result.events = world.take_events();
    result
}

/// Replay a match from recorded inputs.
///
/// Starts a new match, then for each of `tick_count` steps queues every
/// snake's recorded direction (a `None` or a missing entry keeps the current
/// intent) and advances by `dt_ms`. Stops early when the match ends.
pub fn replay_match(
    initial_world: World,
    snake_inputs: &BTreeMap<PlayerId, Vec<Option<Direction>>>,
    tick_count: u32,
    dt_ms: u64,
) -> (World, Vec<GameEvent>) {
    let mut world = initial_world;
    let mut all_events = Vec::new();

    world.start_new_match();

    for t in 0..tick_count {
        for (id, frames) in snake_inputs {
            if let Some(Some(direction)) = frames.get(t as usize) {
                world.queue_direction(id, *direction);
            }
        }

        let result = advance(&mut world, dt_ms);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (world, all_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::events::GameEventData;
    use crate::game::snake::Snake;
    use crate::game::state::{MatchOutcome, MatchStatus};

    fn board(cols: i32, rows: i32) -> World {
        let config = GameConfig {
            cols,
            rows,
            ..GameConfig::default()
        };
        let mut world = World::new(&config);
        world.status = MatchStatus::Running;
        world
    }

    fn place(world: &mut World, id: &str, cells: &[(i32, i32)], direction: Direction) {
        let snake = Snake::new(
            PlayerId::new(id),
            id.to_uppercase(),
            "#fff",
            cells.iter().map(|&(x, y)| Position::new(x, y)),
            direction,
        );
        world.snakes.insert(PlayerId::new(id), snake);
    }

    fn body(world: &World, id: &str) -> Vec<Position> {
        world.snakes[&PlayerId::new(id)].segments().iter().copied().collect()
    }

    fn deaths(result: &TickResult) -> Vec<(PlayerId, DeathCause)> {
        result
            .events
            .iter()
            .filter_map(|e| match &e.data {
                GameEventData::SnakeDied { snake_id, cause, .. } => Some((snake_id.clone(), cause.clone())),
                _ => None,
            })
            .collect()
    }

    fn assert_valid_spawn(world: &World, id: &str) {
        let snake = &world.snakes[&PlayerId::new(id)];
        assert_eq!(snake.len(), 2);
        for cell in snake.segments() {
            assert!(world.geometry.contains(*cell));
        }
        assert_eq!(snake.segments()[1], snake.head().step_back(snake.direction()));
        assert_eq!(snake.last_death_tick(), Some(world.tick));
    }

    #[test]
    fn test_simple_move() {
        let mut world = board(5, 5);
        place(&mut world, "a", &[(2, 2), (1, 2)], Direction::Right);
        world.food = Position::new(0, 0);

        let result = advance(&mut world, 100);

        assert_eq!(body(&world, "a"), vec![Position::new(3, 2), Position::new(2, 2)]);
        assert_eq!(world.tick, 1);
        assert!(deaths(&result).is_empty());
        assert!(!result.match_ended);
    }

    #[test]
    fn test_wall_death_respawns() {
        let mut world = board(5, 5);
        place(&mut world, "a", &[(4, 2), (3, 2)], Direction::Right);
        world.food = Position::new(0, 0);

        let result = advance(&mut world, 100);

        assert_eq!(world.tick, 1);
        assert_eq!(deaths(&result), vec![(PlayerId::new("a"), DeathCause::OutOfBounds)]);
        assert_valid_spawn(&world, "a");
        assert!(!world.snakes[&PlayerId::new("a")].occupies(world.food));
    }

    #[test]
    fn test_head_on_both_die() {
        let mut world = board(7, 7);
        place(&mut world, "a", &[(2, 3), (1, 3), (0, 3)], Direction::Right);
        place(&mut world, "b", &[(4, 3), (5, 3)], Direction::Left);
        world.food = Position::new(0, 0);

        let result = advance(&mut world, 100);

        let died = deaths(&result);
        assert_eq!(
            died,
            vec![
                (PlayerId::new("a"), DeathCause::HeadOn),
                (PlayerId::new("b"), DeathCause::HeadOn),
            ]
        );
        assert_valid_spawn(&world, "a");
        assert_valid_spawn(&world, "b");

        // Deaths first, then respawns, each group in id order.
        let (a, b) = (PlayerId::new("a"), PlayerId::new("b"));
        let cell = Position::new(3, 3);
        assert_eq!(
            result.events,
            vec![
                GameEvent::snake_died(1, a.clone(), cell, DeathCause::HeadOn),
                GameEvent::snake_died(1, b.clone(), cell, DeathCause::HeadOn),
                GameEvent::snake_respawned(1, a.clone(), world.snakes[&a].head()),
                GameEvent::snake_respawned(1, b.clone(), world.snakes[&b].head()),
            ]
        );
    }

    #[test]
    fn test_food_grows_next_step() {
        let mut fed = board(8, 8);
        place(&mut fed, "a", &[(2, 2), (1, 2)], Direction::Right);
        fed.food = Position::new(3, 2);

        let mut hungry = board(8, 8);
        place(&mut hungry, "a", &[(2, 2), (1, 2)], Direction::Right);
        hungry.food = Position::new(7, 7);

        let result = advance(&mut fed, 100);
        advance(&mut hungry, 100);

        let id = PlayerId::new("a");
        assert_eq!(fed.snakes[&id].pending_growth(), 1);
        assert_ne!(fed.food, Position::new(3, 2));
        assert!(!fed.snakes[&id].occupies(fed.food));
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::FoodEaten { .. })));

        // Credit is spent on the following step wherever the food went.
        advance(&mut fed, 100);
        advance(&mut hungry, 100);
        assert_eq!(fed.snakes[&id].len(), 3);
        assert_eq!(hungry.snakes[&id].len(), 2);
    }

    #[test]
    fn test_own_neck_kills() {
        // Body bends back against the facing: the candidate is the neck.
        let mut world = board(6, 6);
        place(&mut world, "a", &[(2, 2), (3, 2)], Direction::Right);
        world.food = Position::new(5, 5);

        let result = advance(&mut world, 100);

        assert_eq!(
            deaths(&result),
            vec![(
                PlayerId::new("a"),
                DeathCause::Collision {
                    owner: PlayerId::new("a")
                }
            )]
        );
        assert_valid_spawn(&world, "a");
    }

    #[test]
    fn test_moving_into_vacating_tail_dies() {
        // Tail at (2,3) moves away this tick, but the pre-move rule still kills.
        let mut world = board(6, 6);
        place(&mut world, "a", &[(2, 2), (1, 2), (1, 3), (2, 3)], Direction::Right);
        world.snakes.get_mut(&PlayerId::new("a")).unwrap().queue_direction(Direction::Down);
        world.food = Position::new(5, 5);

        let result = advance(&mut world, 100);
        assert_eq!(deaths(&result).len(), 1);
    }

    #[test]
    fn test_collision_with_other_body() {
        let mut world = board(8, 8);
        place(&mut world, "a", &[(2, 2), (1, 2)], Direction::Right);
        place(&mut world, "b", &[(3, 1), (3, 2), (3, 3)], Direction::Up);
        world.food = Position::new(7, 7);

        let result = advance(&mut world, 100);

        assert_eq!(
            deaths(&result),
            vec![(
                PlayerId::new("a"),
                DeathCause::Collision {
                    owner: PlayerId::new("b")
                }
            )]
        );
        assert_eq!(
            body(&world, "b"),
            vec![Position::new(3, 0), Position::new(3, 1), Position::new(3, 2)]
        );
    }

    #[test]
    fn test_paused_world_untouched() {
        let mut world = board(5, 5);
        place(&mut world, "a", &[(2, 2), (1, 2)], Direction::Right);
        world.status = MatchStatus::Paused;
        let before = world.compute_hash();

        let result = advance(&mut world, 100);

        assert!(result.events.is_empty());
        assert_eq!(world.compute_hash(), before);
    }

    #[test]
    fn test_time_runs_out() {
        let mut world = board(10, 10);
        place(&mut world, "a", &[(2, 2), (1, 2), (0, 2)], Direction::Right);
        place(&mut world, "b", &[(2, 5), (1, 5)], Direction::Right);
        world.food = Position::new(9, 9);
        world.remaining_ms = 150;

        let first = advance(&mut world, 100);
        assert!(!first.match_ended);
        assert_eq!(world.remaining_ms, 50);
        assert_eq!(world.tick, 1);

        let second = advance(&mut world, 100);
        assert!(second.match_ended);
        assert_eq!(world.remaining_ms, 0);
        assert_eq!(world.tick, 1);
        assert_eq!(world.status, MatchStatus::Over);
        assert_eq!(
            world.outcome,
            Some(MatchOutcome::Winner {
                name: "A".into(),
                length: 3
            })
        );

        // Over: no more ticks.
        let third = advance(&mut world, 100);
        assert!(!third.match_ended);
        assert_eq!(world.tick, 1);
    }

    #[test]
    fn test_full_match_default_config() {
        let mut world = World::new(&GameConfig::default());
        world.add_or_update_snake(PlayerId::new("local-1"), "P1", "#7cf7c2");
        world.add_or_update_snake(PlayerId::new("local-2"), "P2", "#788cff");
        world.start_new_match();

        let mut steps = 0;
        loop {
            let result = advance(&mut world, 100);
            steps += 1;

            let occupied = world.occupied_cells();
            assert!(!occupied.contains(&world.food));
            if result.match_ended {
                break;
            }
        }

        assert_eq!(steps, 600);
        assert_eq!(world.tick, 599);
        assert!(world.outcome.is_some());
    }

    #[test]
    fn test_replay_determinism() {
        let mut world = World::new(&GameConfig::default());
        world.add_or_update_snake(PlayerId::new("a"), "A", "#fff");
        world.add_or_update_snake(PlayerId::new("b"), "B", "#000");

        let turns = [Direction::Up, Direction::Left, Direction::Down, Direction::Right];
        let mut inputs = BTreeMap::new();
        inputs.insert(
            PlayerId::new("a"),
            (0..300).map(|t| (t % 7 == 0).then(|| turns[t / 7 % 4])).collect::<Vec<_>>(),
        );
        inputs.insert(
            PlayerId::new("b"),
            (0..300).map(|t| (t % 5 == 0).then(|| turns[(t / 5 + 2) % 4])).collect::<Vec<_>>(),
        );

        let (w1, e1) = replay_match(world.clone(), &inputs, 300, 100);
        let (w2, e2) = replay_match(world.clone(), &inputs, 300, 100);

        assert_eq!(w1.tick, 300);
        assert_eq!(w1.compute_hash(), w2.compute_hash());
        assert_eq!(e1.len(), e2.len());
        for (a, b) in e1.iter().zip(&e2) {
            assert_eq!(a.data, b.data);
        }

        // Different inputs diverge.
        let mut other = inputs.clone();
        other.insert(PlayerId::new("a"), vec![Some(Direction::Up); 300]);
        let (w3, _) = replay_match(world, &other, 300, 100);
        assert_ne!(w1.compute_hash(), w3.compute_hash());
    }
}
