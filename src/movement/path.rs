use std::collections::HashSet;

use crate::grid::Grid;
use crate::types::Coord;

use super::ReachMap;

impl ReachMap {
    pub fn path_to(&self, grid: &Grid, destination: Coord) -> Vec<Coord> {
        if !self.contains(grid, destination) {
            return Vec::new();
        }
        if destination == self.origin() {
            return vec![destination];
        }
        let mut path = self.walk_back(grid, destination);
        if path.is_empty() {
            return path;
        }
        path.reverse();
        optimize_path(path)
    }

    /// Depth-first walk from `destination` to the origin over tight
    /// predecessors: neighbors whose remaining moves minus the cost of the
    /// current tile equal the current tile's remaining moves. Prefers the
    /// predecessor with the most moves left and backtracks on dead ends.
    fn walk_back(&self, grid: &Grid, destination: Coord) -> Vec<Coord> {
        let origin = self.origin();
        let mut stack = vec![destination];
        let mut seen = HashSet::from([destination]);

        while let Some(&current) = stack.last() {
            if current == origin {
                return stack;
            }
            let Some(node) = self.node(grid, current) else {
                stack.pop();
                continue;
            };
            let predecessor = grid
                .neighbors(current)
                .filter(|prev| !seen.contains(prev))
                .filter_map(|prev| {
                    self.remaining_at(grid, prev)
                        .filter(|remaining| remaining - node.cost == node.remaining_moves)
                        .map(|remaining| (remaining, prev))
                })
                .fold(None::<(i32, Coord)>, |best, candidate| match best {
                    Some(best) if best.0 >= candidate.0 => Some(best),
                    _ => Some(candidate),
                });

            match predecessor {
                Some((_, prev)) => {
                    seen.insert(prev);
                    stack.push(prev);
                }
                None => {
                    stack.pop();
                }
            }
        }
        Vec::new()
    }
}

/// Removes detours from a walked path: whenever a later tile equals or touches
/// an earlier one, the stretch in between is cut. The result never repeats a
/// tile and never costs more than the input.
pub fn optimize_path(path: Vec<Coord>) -> Vec<Coord> {
    let mut optimized = Vec::with_capacity(path.len());
    let mut idx = 0;
    while idx < path.len() {
        let current = path[idx];
        optimized.push(current);
        let mut next = idx + 1;
        for later in (idx + 2..path.len()).rev() {
            if path[later] == current {
                next = later + 1;
                break;
            }
            if path[later].is_adjacent(current) {
                next = later;
                break;
            }
        }
        idx = next;
    }
    optimized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(raw: &[(i32, i32)]) -> Vec<Coord> {
        raw.iter().map(|(x, y)| Coord::new(*x, *y)).collect()
    }

    #[test]
    fn detour_through_a_loop_is_cut() {
        let walked = coords(&[(0, 0), (1, 0), (1, 1), (0, 1), (0, 2)]);
        assert_eq!(optimize_path(walked), coords(&[(0, 0), (0, 1), (0, 2)]));
    }

    #[test]
    fn repeated_tile_collapses() {
        let walked = coords(&[(0, 0), (1, 0), (2, 0), (1, 0), (1, 1)]);
        assert_eq!(optimize_path(walked), coords(&[(0, 0), (1, 0), (1, 1)]));
    }

    #[test]
    fn straight_path_is_untouched() {
        let walked = coords(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
        assert_eq!(optimize_path(walked.clone()), walked);
    }

    #[test]
    fn ice_plateau_walks_back_to_origin() {
        use crate::movement::MovementEngine;
        use crate::players::PlayerRegistry;
        use crate::rng::GameRng;

        let grid = Grid::parse_ascii(&[".___", "#__#", "....", "...."]).expect("valid layout");
        let movement = MovementEngine::new(GameRng::new(1), false);
        let players = PlayerRegistry::default();
        let origin = Coord::new(0, 0);
        let destination = Coord::new(2, 2);
        let path = movement.path_between(&grid, &players, "p1", origin, destination, 2);
        assert_eq!(path.first(), Some(&origin));
        assert_eq!(path.last(), Some(&destination));
        assert!(movement.path_cost(&grid, &path) <= 2);
    }
}
