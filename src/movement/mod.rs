use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use crate::constants::ICE_SLIP_CHANCE;
use crate::grid::Grid;
use crate::players::PlayerRegistry;
use crate::rng::GameRng;
use crate::types::{Coord, ItemKind};

mod path;

pub use self::path::optimize_path;

const UNREACHED: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovementNode {
    pub cost: i32,
    pub remaining_moves: i32,
}

#[derive(Clone, Debug)]
pub struct ReachMap {
    origin: Coord,
    budget: i32,
    nodes: Vec<MovementNode>,
}

impl ReachMap {
    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn budget(&self) -> i32 {
        self.budget
    }

    pub fn node(&self, grid: &Grid, coord: Coord) -> Option<MovementNode> {
        grid.key_of(coord)
            .and_then(|key| self.nodes.get(key).copied())
    }

    pub fn remaining_at(&self, grid: &Grid, coord: Coord) -> Option<i32> {
        self.node(grid, coord)
            .map(|node| node.remaining_moves)
            .filter(|remaining| *remaining >= 0)
    }

    pub fn contains(&self, grid: &Grid, coord: Coord) -> bool {
        self.remaining_at(grid, coord).is_some()
    }

    pub fn tiles(&self, grid: &Grid) -> BTreeSet<Coord> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.remaining_moves >= 0)
            .map(|(key, _)| grid.coord_of(key))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveExecution {
    pub visited: Vec<Coord>,
    pub final_position: Coord,
    pub cost: i32,
    pub slipped_at: Option<Coord>,
    pub stopped_on_item: Option<ItemKind>,
}

#[derive(Debug)]
pub struct MovementEngine {
    rng: GameRng,
    debug_mode: bool,
    ignore_closed_doors: bool,
}

impl MovementEngine {
    pub fn new(rng: GameRng, debug_mode: bool) -> Self {
        Self {
            rng,
            debug_mode,
            ignore_closed_doors: false,
        }
    }

    pub fn ignores_closed_doors(&self) -> bool {
        self.ignore_closed_doors
    }

    pub fn with_closed_doors_ignored<R>(&mut self, scan: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.ignore_closed_doors;
        self.ignore_closed_doors = true;
        let result = scan(self);
        self.ignore_closed_doors = previous;
        result
    }

    pub fn acquire_node_map(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
    ) -> Vec<MovementNode> {
        let mut nodes: Vec<MovementNode> = (0..grid.tile_count())
            .map(|key| MovementNode {
                cost: grid.tile_cost(grid.coord_of(key), self.ignore_closed_doors),
                remaining_moves: UNREACHED,
            })
            .collect();
        for player in players.active() {
            if player.id == mover_id {
                continue;
            }
            if let Some(key) = grid.key_of(player.position) {
                nodes[key].cost = -1;
            }
        }
        nodes
    }

    pub fn compute_reach(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        origin: Coord,
        budget: i32,
    ) -> ReachMap {
        let budget = budget.max(0);
        let mut nodes = self.acquire_node_map(grid, players, mover_id);
        let Some(origin_key) = grid.key_of(origin) else {
            return ReachMap {
                origin,
                budget,
                nodes,
            };
        };

        let mut visited = vec![false; nodes.len()];
        let mut queue = BinaryHeap::new();
        nodes[origin_key].remaining_moves = budget;
        queue.push((budget, Reverse(origin_key)));

        while let Some((remaining, Reverse(key))) = queue.pop() {
            if visited[key] || remaining != nodes[key].remaining_moves {
                continue;
            }
            visited[key] = true;

            for next in grid.neighbors(grid.coord_of(key)) {
                let Some(next_key) = grid.key_of(next) else {
                    continue;
                };
                let node = nodes[next_key];
                if node.cost < 0 || visited[next_key] {
                    continue;
                }
                let new_remaining = remaining - node.cost;
                if new_remaining <= node.remaining_moves {
                    continue;
                }
                nodes[next_key].remaining_moves = new_remaining;
                if new_remaining >= 0
                    && has_viable_neighbor(grid, &nodes, &visited, next, new_remaining)
                {
                    queue.push((new_remaining, Reverse(next_key)));
                }
            }
        }

        ReachMap {
            origin,
            budget,
            nodes,
        }
    }

    pub fn reachable_tiles(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        origin: Coord,
        budget: i32,
    ) -> BTreeSet<Coord> {
        if !grid.in_bounds(origin) {
            return BTreeSet::new();
        }
        let reach = self.compute_reach(grid, players, mover_id, origin, budget);
        let tiles = reach.tiles(grid);
        tracing::trace!(
            mover_id,
            budget,
            reachable = tiles.len(),
            "movement.reachable"
        );
        tiles
    }

    pub fn path_to(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        destination: Coord,
    ) -> Vec<Coord> {
        let Some(mover) = players.get(mover_id) else {
            return Vec::new();
        };
        self.path_between(
            grid,
            players,
            mover_id,
            mover.position,
            destination,
            mover.remaining_moves,
        )
    }

    pub fn path_between(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        origin: Coord,
        destination: Coord,
        budget: i32,
    ) -> Vec<Coord> {
        if !grid.in_bounds(origin) || !grid.in_bounds(destination) {
            return Vec::new();
        }
        let reach = self.compute_reach(grid, players, mover_id, origin, budget);
        reach.path_to(grid, destination)
    }

    pub fn path_cost(&self, grid: &Grid, path: &[Coord]) -> i32 {
        path.iter()
            .skip(1)
            .map(|coord| grid.tile_cost(*coord, true).max(0))
            .sum()
    }

    pub fn is_accessible(
        &self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        from: Coord,
        to: Coord,
    ) -> bool {
        let Some(mover) = players.get(mover_id) else {
            return false;
        };
        if !grid.in_bounds(from) || !grid.in_bounds(to) {
            return false;
        }
        if from != to && players.is_occupied_by_other(to, mover_id) {
            return false;
        }
        self.compute_reach(grid, players, mover_id, from, mover.remaining_moves)
            .contains(grid, to)
    }

    pub fn has_slipped(&mut self, grid: &Grid, position: Coord, is_current_player: bool) -> bool {
        if self.debug_mode || !is_current_player || !grid.is_ice(position) {
            return false;
        }
        self.rng.chance(ICE_SLIP_CHANCE)
    }

    /// Walks `path` one tile at a time. Entering ice may end the walk through
    /// a slip. Items stop the walk only when the mover `can_pick_up`;
    /// otherwise they are walked over.
    pub fn execute_path(
        &mut self,
        grid: &Grid,
        players: &PlayerRegistry,
        mover_id: &str,
        path: &[Coord],
        is_current_player: bool,
        can_pick_up: bool,
    ) -> MoveExecution {
        let start = path
            .first()
            .copied()
            .or_else(|| players.get(mover_id).map(|player| player.position))
            .unwrap_or(Coord::new(0, 0));
        let mut execution = MoveExecution {
            visited: vec![start],
            final_position: start,
            cost: 0,
            slipped_at: None,
            stopped_on_item: None,
        };

        for next in path.iter().skip(1).copied() {
            if !execution.final_position.is_adjacent(next)
                || grid.tile_cost(next, false) < 0
                || players.is_occupied_by_other(next, mover_id)
            {
                break;
            }
            execution.cost += grid.tile_cost(next, false);
            execution.visited.push(next);
            execution.final_position = next;

            if self.has_slipped(grid, next, is_current_player) {
                tracing::debug!(mover_id, x = next.x, y = next.y, "movement.slipped");
                execution.slipped_at = Some(next);
                break;
            }
            if let Some(item) = grid.item(next).filter(|_| can_pick_up) {
                execution.stopped_on_item = Some(item);
                break;
            }
        }
        execution
    }
}

fn has_viable_neighbor(
    grid: &Grid,
    nodes: &[MovementNode],
    visited: &[bool],
    coord: Coord,
    remaining: i32,
) -> bool {
    grid.neighbors(coord).any(|next| {
        grid.key_of(next).is_some_and(|key| {
            let node = nodes[key];
            !visited[key] && node.cost >= 0 && node.cost <= remaining
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{PlayerRecord, StartPlayer};
    use crate::types::{DiceAssignment, TileKind};

    fn engine(seed: u64) -> MovementEngine {
        MovementEngine::new(GameRng::new(seed), false)
    }

    fn player(id: &str, at: Coord, moves: i32) -> PlayerRecord {
        let mut record = PlayerRecord::new(
            &StartPlayer {
                id: id.to_string(),
                name: id.to_string(),
                profile: None,
                dice: DiceAssignment::ATTACK_D6,
            },
            at,
        );
        record.remaining_moves = moves;
        record.speed = moves;
        record
    }

    fn solo(at: Coord, moves: i32) -> PlayerRegistry {
        PlayerRegistry::new(vec![player("p1", at, moves)])
    }

    fn random_grid(seed: u64, size: i32) -> Grid {
        let mut rng = GameRng::new(seed);
        let mut grid = Grid::empty(size);
        for y in 0..size {
            for x in 0..size {
                let roll = rng.int(0, 99);
                let kind = match roll {
                    0..=19 => TileKind::Wall,
                    20..=29 => TileKind::Ice,
                    30..=39 => TileKind::Water,
                    40..=44 => TileKind::DoorClosed,
                    45..=49 => TileKind::DoorOpen,
                    _ => TileKind::Normal,
                };
                grid.set_kind(Coord::new(x, y), kind);
            }
        }
        grid.set_kind(Coord::new(0, 0), TileKind::Normal);
        grid
    }

    #[test]
    fn zero_budget_reaches_only_origin() {
        let grid = Grid::empty(5);
        let origin = Coord::new(2, 2);
        let tiles = engine(1).reachable_tiles(&grid, &solo(origin, 0), "p1", origin, 0);
        assert_eq!(tiles.into_iter().collect::<Vec<_>>(), vec![origin]);
    }

    #[test]
    fn empty_twenty_grid_corner_budget_four_reaches_fifteen_tiles() {
        let grid = Grid::empty(20);
        let origin = Coord::new(0, 0);
        let tiles = engine(1).reachable_tiles(&grid, &solo(origin, 4), "p1", origin, 4);
        assert_eq!(tiles.len(), 15);
        assert!(tiles.iter().all(|tile| tile.x + tile.y <= 4));
    }

    #[test]
    fn origin_is_always_reachable() {
        let movement = engine(2);
        for seed in 0..40u64 {
            let grid = random_grid(seed, 8);
            let origin = Coord::new(0, 0);
            for budget in 0..6 {
                let tiles =
                    movement.reachable_tiles(&grid, &solo(origin, budget), "p1", origin, budget);
                assert!(tiles.contains(&origin), "seed={seed} budget={budget}");
            }
        }
    }

    #[test]
    fn enclosed_origin_yields_singleton() {
        let grid = Grid::parse_ascii(&[".#.", "#.#", ".D."]).expect("valid layout");
        let origin = Coord::new(1, 1);
        let tiles = engine(3).reachable_tiles(&grid, &solo(origin, 9), "p1", origin, 9);
        assert_eq!(tiles.len(), 1);
    }

    #[test]
    fn other_players_block_their_tile() {
        let grid = Grid::parse_ascii(&["...", "###", "..."]).expect("valid layout");
        let players = PlayerRegistry::new(vec![
            player("p1", Coord::new(0, 0), 5),
            player("p2", Coord::new(1, 0), 5),
        ]);
        let tiles = engine(4).reachable_tiles(&grid, &players, "p1", Coord::new(0, 0), 5);
        assert_eq!(tiles.len(), 1);
        assert!(!engine(4).is_accessible(
            &grid,
            &players,
            "p1",
            Coord::new(0, 0),
            Coord::new(2, 0)
        ));
    }

    #[test]
    fn water_costs_two_and_ice_is_free() {
        let grid = Grid::parse_ascii(&["._~..", ".....", ".....", ".....", "....."])
            .expect("valid layout");
        let movement = engine(5);
        let players = solo(Coord::new(0, 0), 2);
        let reach = movement.compute_reach(&grid, &players, "p1", Coord::new(0, 0), 2);
        assert_eq!(reach.remaining_at(&grid, Coord::new(1, 0)), Some(2));
        assert_eq!(reach.remaining_at(&grid, Coord::new(2, 0)), Some(0));
        assert_eq!(reach.remaining_at(&grid, Coord::new(3, 0)), None);
        assert_eq!(reach.remaining_at(&grid, Coord::new(1, 2)), Some(0));
    }

    #[test]
    fn closed_doors_block_unless_ignored_in_scope() {
        let grid = Grid::parse_ascii(&[".D.", "###", "..."]).expect("valid layout");
        let origin = Coord::new(0, 0);
        let players = solo(origin, 4);
        let mut movement = engine(6);

        let blocked = movement.reachable_tiles(&grid, &players, "p1", origin, 4);
        assert_eq!(blocked.len(), 1);

        let opened = movement.with_closed_doors_ignored(|movement| {
            movement.reachable_tiles(&grid, &players, "p1", origin, 4)
        });
        assert_eq!(opened.len(), 3);
        assert!(!movement.ignores_closed_doors());
    }

    #[test]
    fn walled_off_destination_yields_empty_path() {
        let grid = Grid::parse_ascii(&["..#..", "..#..", "..#..", "..#..", "..#.."])
            .expect("valid layout");
        let players = solo(Coord::new(0, 0), 30);
        let path = engine(7).path_to(&grid, &players, "p1", Coord::new(4, 4));
        assert!(path.is_empty());
    }

    #[test]
    fn paths_fit_budget_and_never_repeat_tiles() {
        let movement = engine(8);
        for seed in 0..60u64 {
            let grid = random_grid(seed, 9);
            let origin = Coord::new(0, 0);
            let budget = 6;
            let players = solo(origin, budget);
            for destination in movement.reachable_tiles(&grid, &players, "p1", origin, budget) {
                let path = movement.path_to(&grid, &players, "p1", destination);
                assert_eq!(path.first(), Some(&origin), "seed={seed}");
                assert_eq!(path.last(), Some(&destination), "seed={seed}");
                assert!(movement.path_cost(&grid, &path) <= budget, "seed={seed}");
                let unique: BTreeSet<Coord> = path.iter().copied().collect();
                assert_eq!(unique.len(), path.len(), "seed={seed}");
                for pair in path.windows(2) {
                    assert!(pair[0].is_adjacent(pair[1]), "seed={seed}");
                }
            }
        }
    }

    #[test]
    fn accessibility_matches_reachable_set() {
        let grid = Grid::parse_ascii(&["...", ".#.", "..."]).expect("valid layout");
        let origin = Coord::new(0, 0);
        let players = solo(origin, 2);
        let movement = engine(9);
        assert!(movement.is_accessible(&grid, &players, "p1", origin, Coord::new(2, 0)));
        assert!(!movement.is_accessible(&grid, &players, "p1", origin, Coord::new(2, 2)));
        assert!(!movement.is_accessible(&grid, &players, "p1", origin, Coord::new(1, 1)));
        assert!(!movement.is_accessible(&grid, &players, "p1", origin, Coord::new(9, 9)));
    }

    #[test]
    fn slipping_needs_ice_and_the_current_player() {
        let grid = Grid::parse_ascii(&["._", ".."]).expect("valid layout");
        let mut movement = engine(10);
        let ice = Coord::new(1, 0);
        for _ in 0..200 {
            assert!(!movement.has_slipped(&grid, Coord::new(0, 0), true));
            assert!(!movement.has_slipped(&grid, ice, false));
        }
        let slips = (0..2_000)
            .filter(|_| movement.has_slipped(&grid, ice, true))
            .count();
        assert!(slips > 100 && slips < 350, "slips={slips}");

        let mut debug = MovementEngine::new(GameRng::new(10), true);
        assert!((0..200).all(|_| !debug.has_slipped(&grid, ice, true)));
    }

    #[test]
    fn execution_stops_on_slip_or_item() {
        let grid = Grid::parse_ascii(&["._..S", ".....", ".....", ".....", "....."])
            .expect("valid layout");
        let players = solo(Coord::new(0, 0), 10);
        let path: Vec<Coord> = (0..5).map(|x| Coord::new(x, 0)).collect();

        let seed = (0..10_000u64)
            .find(|seed| {
                let mut rng = GameRng::new(*seed);
                rng.chance(ICE_SLIP_CHANCE)
            })
            .expect("some seed slips on first ice tile");
        let mut slipping = engine(seed);
        let slipped = slipping.execute_path(&grid, &players, "p1", &path, true, true);
        assert_eq!(slipped.slipped_at, Some(Coord::new(1, 0)));
        assert_eq!(slipped.final_position, Coord::new(1, 0));

        let mut steady = engine(seed);
        let walked = steady.execute_path(&grid, &players, "p1", &path, false, true);
        assert_eq!(walked.slipped_at, None);
        assert_eq!(walked.final_position, Coord::new(4, 0));
        assert_eq!(walked.stopped_on_item, Some(ItemKind::Sword));
        assert_eq!(walked.cost, 3);
    }

    #[test]
    fn full_inventory_walks_past_items() {
        let grid = Grid::parse_ascii(&["..S..", ".....", ".....", ".....", "....."])
            .expect("valid layout");
        let players = solo(Coord::new(0, 0), 10);
        let path: Vec<Coord> = (0..5).map(|x| Coord::new(x, 0)).collect();

        let walked = engine(1).execute_path(&grid, &players, "p1", &path, true, false);
        assert_eq!(walked.stopped_on_item, None);
        assert_eq!(walked.final_position, Coord::new(4, 0));
        assert_eq!(walked.cost, 4);
        assert_eq!(walked.visited.len(), 5);
    }
}
