use std::collections::HashMap;

use crate::grid::Grid;
use crate::movement::MovementEngine;
use crate::players::{PlayerRecord, PlayerRegistry};
use crate::rng::GameRng;
use crate::scheduler::{Scheduler, TimerFired, TimerKey};
use crate::types::{Coord, GameMode, PlayerId};

mod targets;

#[derive(Clone, Copy, Debug)]
pub struct BoardView<'a> {
    pub grid: &'a Grid,
    pub players: &'a PlayerRegistry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotDecision {
    Fight { target_id: PlayerId, target_pos: Coord },
    OpenDoor { door: Coord },
    Move { destination: Coord },
    EndRound,
}

#[derive(Clone, Debug)]
pub struct VirtualPlayerState {
    pub player: PlayerRecord,
    occupancy: HashMap<usize, PlayerId>,
    last_target: Option<Coord>,
}

impl VirtualPlayerState {
    fn load(player_id: &str, board: BoardView<'_>) -> Option<Self> {
        let player = board
            .players
            .get(player_id)
            .filter(|player| player.active && player.is_virtual())?
            .clone();
        let occupancy = board
            .players
            .active()
            .filter(|other| other.id != player_id)
            .filter_map(|other| {
                board
                    .grid
                    .key_of(other.position)
                    .map(|key| (key, other.id.clone()))
            })
            .collect();
        Some(Self {
            player,
            occupancy,
            last_target: None,
        })
    }

    pub fn occupant(&self, grid: &Grid, coord: Coord) -> Option<&PlayerId> {
        grid.key_of(coord).and_then(|key| self.occupancy.get(&key))
    }

    pub fn last_target(&self) -> Option<Coord> {
        self.last_target
    }
}

pub struct VirtualPlayerEngine {
    party_id: String,
    mode: GameMode,
    scheduler: Box<dyn Scheduler>,
    rng: GameRng,
    delay_min_ms: u64,
    delay_max_ms: u64,
    states: HashMap<PlayerId, VirtualPlayerState>,
}

impl VirtualPlayerEngine {
    pub fn new(
        party_id: impl Into<String>,
        mode: GameMode,
        scheduler: Box<dyn Scheduler>,
        rng: GameRng,
        delay_range_ms: (u64, u64),
    ) -> Self {
        Self {
            party_id: party_id.into(),
            mode,
            scheduler,
            rng,
            delay_min_ms: delay_range_ms.0,
            delay_max_ms: delay_range_ms.1.max(delay_range_ms.0),
            states: HashMap::new(),
        }
    }

    pub fn is_playing(&self, player_id: &str) -> bool {
        self.states.contains_key(player_id)
    }

    pub fn state(&self, player_id: &str) -> Option<&VirtualPlayerState> {
        self.states.get(player_id)
    }

    pub fn armed_timers(&self) -> usize {
        self.scheduler.armed_count()
    }

    pub fn begin_round(&mut self, player_id: &str, board: BoardView<'_>) -> bool {
        let Some(state) = VirtualPlayerState::load(player_id, board) else {
            tracing::warn!(party_id = %self.party_id, player_id, "bot.begin_round_ignored");
            return false;
        };
        tracing::debug!(
            party_id = %self.party_id,
            player_id,
            x = state.player.position.x,
            y = state.player.position.y,
            moves = state.player.remaining_moves,
            "bot.begin_round"
        );
        self.states.insert(player_id.to_string(), state);
        self.arm_delay(player_id);
        true
    }

    pub fn resume(&mut self, player_id: &str, board: BoardView<'_>) -> bool {
        let Some(mut fresh) = VirtualPlayerState::load(player_id, board) else {
            self.end_round(player_id);
            return false;
        };
        let Some(state) = self.states.get_mut(player_id) else {
            return false;
        };
        fresh.last_target = state.last_target;
        *state = fresh;
        self.arm_delay(player_id);
        true
    }

    pub fn on_timer(
        &mut self,
        fired: &TimerFired,
        board: BoardView<'_>,
        movement: &mut MovementEngine,
    ) -> Option<(PlayerId, BotDecision)> {
        let TimerKey::BotAction { player_id } = &fired.key else {
            return None;
        };
        if !self.scheduler.settle(fired) {
            return None;
        }
        let decision = self.decide(player_id, board, movement)?;
        tracing::debug!(party_id = %self.party_id, player_id, ?decision, "bot.decision");
        Some((player_id.clone(), decision))
    }

    pub fn decide(
        &mut self,
        player_id: &str,
        board: BoardView<'_>,
        movement: &mut MovementEngine,
    ) -> Option<BotDecision> {
        let state = self.states.get_mut(player_id)?;
        let me = &state.player;

        if me.actions_left > 0 {
            let adjacent_enemy = board.grid.neighbors(me.position).find_map(|next| {
                state
                    .occupant(board.grid, next)
                    .map(|occupant| (occupant.clone(), next))
            });
            if let Some((target_id, target_pos)) = adjacent_enemy {
                return Some(BotDecision::Fight {
                    target_id,
                    target_pos,
                });
            }
            if let Some(door) = board.grid.adjacent_closed_doors(me.position).first() {
                return Some(BotDecision::OpenDoor { door: *door });
            }
        }

        if me.remaining_moves <= 0 {
            return Some(BotDecision::EndRound);
        }

        let reach = targets::survey(state, board, movement);
        let Some(target) = targets::resolve_target(state, board, &reach, &mut self.rng, self.mode)
        else {
            return Some(BotDecision::EndRound);
        };
        let Some(next) = targets::step_toward(state, board, movement, &reach, target) else {
            return Some(BotDecision::EndRound);
        };
        if next == state.player.position || Some(next) == state.last_target {
            return Some(BotDecision::EndRound);
        }
        state.last_target = Some(next);
        tracing::trace!(
            party_id = %self.party_id,
            player_id,
            target_x = target.x,
            target_y = target.y,
            "bot.target"
        );
        Some(BotDecision::Move { destination: next })
    }

    pub fn end_round(&mut self, player_id: &str) {
        self.scheduler.cancel(&TimerKey::BotAction {
            player_id: player_id.to_string(),
        });
        self.states.remove(player_id);
    }

    pub fn destroy(&mut self) {
        self.scheduler.cancel_all();
        self.states.clear();
    }

    fn arm_delay(&mut self, player_id: &str) {
        let delay_ms = self.rng.range_u64(self.delay_min_ms, self.delay_max_ms);
        self.scheduler.arm(
            TimerKey::BotAction {
                player_id: player_id.to_string(),
            },
            delay_ms,
        );
    }
}
