use crate::constants::full_map_budget;
use crate::movement::{MovementEngine, ReachMap};
use crate::rng::GameRng;
use crate::types::{BotProfile, Coord, GameMode, ItemKind};

use super::{BoardView, VirtualPlayerState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Goal {
    Flag,
    AttackItem,
    DefenseItem,
    AnyItem,
    Player,
}

const AGGRESSIVE_CHAIN: [Goal; 3] = [Goal::Flag, Goal::AttackItem, Goal::Player];
const DEFENSIVE_CHAIN: [Goal; 5] = [
    Goal::Flag,
    Goal::DefenseItem,
    Goal::AttackItem,
    Goal::AnyItem,
    Goal::Player,
];

pub(super) fn survey(
    state: &VirtualPlayerState,
    board: BoardView<'_>,
    movement: &mut MovementEngine,
) -> ReachMap {
    let budget = full_map_budget(board.grid.size());
    movement.with_closed_doors_ignored(|movement| {
        movement.compute_reach(
            board.grid,
            board.players,
            &state.player.id,
            state.player.position,
            budget,
        )
    })
}

pub(super) fn resolve_target(
    state: &VirtualPlayerState,
    board: BoardView<'_>,
    reach: &ReachMap,
    rng: &mut GameRng,
    mode: GameMode,
) -> Option<Coord> {
    let chain: &[Goal] = match state.player.profile.unwrap_or(BotProfile::Aggressive) {
        BotProfile::Aggressive => &AGGRESSIVE_CHAIN,
        BotProfile::Defensive => &DEFENSIVE_CHAIN,
    };
    chain
        .iter()
        .find_map(|goal| resolve_goal(*goal, state, board, reach, rng, mode))
}

fn resolve_goal(
    goal: Goal,
    state: &VirtualPlayerState,
    board: BoardView<'_>,
    reach: &ReachMap,
    rng: &mut GameRng,
    mode: GameMode,
) -> Option<Coord> {
    let me = &state.player;
    match goal {
        Goal::Flag => {
            if mode != GameMode::CaptureTheFlag {
                return None;
            }
            if me.has_item(ItemKind::Flag) {
                if me.position == me.spawn {
                    return None;
                }
                return nearest(board, reach, &[me.spawn], rng);
            }
            if let Some(flag) = board.grid.flag_position() {
                return nearest(board, reach, &[flag], rng);
            }
            let carrier = board
                .players
                .flag_carrier()
                .filter(|carrier| carrier.id != me.id)?;
            engagement_point(board, reach, &me.id, &[carrier.position], rng)
        }
        Goal::AttackItem | Goal::DefenseItem | Goal::AnyItem => {
            if me.inventory_full() {
                return None;
            }
            let candidates: Vec<Coord> = board
                .grid
                .item_positions()
                .into_iter()
                .filter(|(_, item)| match goal {
                    Goal::AttackItem => item.boosts_attack(),
                    Goal::DefenseItem => item.boosts_defense(),
                    _ => *item != ItemKind::Flag,
                })
                .map(|(coord, _)| coord)
                .filter(|coord| *coord != me.position)
                .collect();
            nearest(board, reach, &candidates, rng)
        }
        Goal::Player => {
            let targets: Vec<Coord> = board
                .players
                .active()
                .filter(|player| player.id != me.id)
                .map(|player| player.position)
                .collect();
            engagement_point(board, reach, &me.id, &targets, rng)
        }
    }
}

fn nearest(
    board: BoardView<'_>,
    reach: &ReachMap,
    candidates: &[Coord],
    rng: &mut GameRng,
) -> Option<Coord> {
    let scored: Vec<(i32, Coord)> = candidates
        .iter()
        .filter_map(|coord| {
            reach
                .remaining_at(board.grid, *coord)
                .map(|remaining| (reach.budget() - remaining, *coord))
        })
        .collect();
    let best = scored.iter().map(|(cost, _)| *cost).min()?;
    let tied: Vec<Coord> = scored
        .into_iter()
        .filter(|(cost, _)| *cost == best)
        .map(|(_, coord)| coord)
        .collect();
    tied.get(rng.pick_index(tied.len())).copied()
}

fn engagement_point(
    board: BoardView<'_>,
    reach: &ReachMap,
    me_id: &str,
    targets: &[Coord],
    rng: &mut GameRng,
) -> Option<Coord> {
    let mut candidates = Vec::new();
    let mut owners = Vec::new();
    for target in targets {
        for next in board.grid.neighbors(*target) {
            if board.grid.is_passable(next) && !board.players.is_occupied_by_other(next, me_id) {
                candidates.push(next);
                owners.push(*target);
            }
        }
    }
    let point = nearest(board, reach, &candidates, rng)?;
    if board.grid.adjacent_closed_doors(point).is_empty() {
        return Some(point);
    }

    let owner = candidates
        .iter()
        .position(|candidate| *candidate == point)
        .map(|idx| owners[idx])?;
    let open: Vec<Coord> = board
        .grid
        .neighbors(owner)
        .filter(|next| {
            board.grid.is_passable(*next)
                && !board.players.is_occupied_by_other(*next, me_id)
                && board.grid.adjacent_closed_doors(*next).is_empty()
                && reach.contains(board.grid, *next)
        })
        .collect();
    if open.is_empty() {
        return Some(point);
    }
    open.get(rng.pick_index(open.len())).copied()
}

pub(super) fn step_toward(
    state: &VirtualPlayerState,
    board: BoardView<'_>,
    movement: &MovementEngine,
    reach: &ReachMap,
    target: Coord,
) -> Option<Coord> {
    let path = reach.path_to(board.grid, target);
    if path.is_empty() {
        return None;
    }
    let this_turn = movement.compute_reach(
        board.grid,
        board.players,
        &state.player.id,
        state.player.position,
        state.player.remaining_moves,
    );
    path.into_iter()
        .take_while(|coord| this_turn.contains(board.grid, *coord))
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::players::{PlayerRecord, PlayerRegistry, StartPlayer};
    use crate::types::DiceAssignment;

    fn seat(id: &str, profile: Option<BotProfile>, at: Coord) -> PlayerRecord {
        PlayerRecord::new(
            &StartPlayer {
                id: id.to_string(),
                name: id.to_string(),
                profile,
                dice: DiceAssignment::DEFENSE_D6,
            },
            at,
        )
    }

    #[test]
    fn point_touching_a_closed_door_moves_to_a_clear_neighbor() {
        let grid = Grid::parse_ascii(&[".....", "..D..", "#....", ".....", "....."])
            .expect("valid layout");
        let players = PlayerRegistry::new(vec![
            seat("bot", Some(BotProfile::Aggressive), Coord::new(0, 0)),
            seat("h", None, Coord::new(1, 2)),
        ]);
        let board = BoardView {
            grid: &grid,
            players: &players,
        };
        let state = VirtualPlayerState::load("bot", board).expect("bot loads");
        let mut movement = MovementEngine::new(GameRng::new(3), false);
        let reach = survey(&state, board, &mut movement);
        let mut rng = GameRng::new(3);

        let point = engagement_point(board, &reach, "bot", &[Coord::new(1, 2)], &mut rng);
        assert_eq!(point, Some(Coord::new(1, 3)));
    }

    #[test]
    fn nearest_ignores_unreachable_candidates() {
        let grid = Grid::parse_ascii(&["..#..", "..#..", "..#..", "..#..", "..#.."])
            .expect("valid layout");
        let players = PlayerRegistry::new(vec![seat(
            "bot",
            Some(BotProfile::Defensive),
            Coord::new(0, 0),
        )]);
        let board = BoardView {
            grid: &grid,
            players: &players,
        };
        let state = VirtualPlayerState::load("bot", board).expect("bot loads");
        let mut movement = MovementEngine::new(GameRng::new(4), false);
        let reach = survey(&state, board, &mut movement);
        let mut rng = GameRng::new(4);

        let candidates = [Coord::new(4, 0), Coord::new(1, 4), Coord::new(0, 3)];
        assert_eq!(
            nearest(board, &reach, &candidates, &mut rng),
            Some(Coord::new(0, 3))
        );
        assert!(!movement.ignores_closed_doors());
    }
}
