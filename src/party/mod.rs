use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::broadcast::PartyBroadcaster;
use crate::combat::{CombatEngine, FightLogEntry, RoundOutcome};
use crate::config::PartyConfig;
use crate::error::CombatError;
use crate::grid::Grid;
use crate::mapgen::GeneratedMap;
use crate::movement::MovementEngine;
use crate::players::{PlayerRecord, PlayerRegistry, StartPlayer};
use crate::rng::GameRng;
use crate::scheduler::{Scheduler, SchedulerSource, TimerFired, TimerKey};
use crate::types::{Coord, GameMode, InboundCommand, OutboundEvent, PlayerId, WirePos};
use crate::virtual_player::{BoardView, BotDecision, VirtualPlayerEngine};

mod resolution;
mod runner;

pub use self::runner::{run_manual, run_party};

#[derive(Clone, Copy, Debug, Default)]
pub struct PartyOptions {
    pub auto_acknowledge: bool,
    pub max_rounds: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Pending {
    Moving { player_id: PlayerId, slipped: bool },
    Door { player_id: PlayerId },
    Fight { ends_round: bool },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyStats {
    pub rounds: u32,
    pub moves: u32,
    pub fights: u32,
    pub escapes: u32,
    pub slips: u32,
    pub doors_toggled: u32,
    pub respawns: u32,
    pub items_picked: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySummary {
    pub party_id: String,
    pub mode: GameMode,
    pub winner: Option<PlayerId>,
    pub stalled: bool,
    pub stats: PartyStats,
    pub wins: BTreeMap<PlayerId, u32>,
    pub fight_log_entries: usize,
}

pub struct Party {
    id: String,
    config: PartyConfig,
    options: PartyOptions,
    grid: Grid,
    players: PlayerRegistry,
    movement: MovementEngine,
    combat: CombatEngine,
    bots: VirtualPlayerEngine,
    turns: Box<dyn Scheduler>,
    broadcaster: Arc<dyn PartyBroadcaster>,
    turn_order: Vec<PlayerId>,
    current: usize,
    turn_begun: bool,
    pending: Option<Pending>,
    winner: Option<PlayerId>,
    stalled: bool,
    stats: PartyStats,
    journal: Vec<FightLogEntry>,
}

impl Party {
    pub fn new(
        id: impl Into<String>,
        config: PartyConfig,
        map: GeneratedMap,
        starts: &[StartPlayer],
        timers: &dyn SchedulerSource,
        broadcaster: Arc<dyn PartyBroadcaster>,
        options: PartyOptions,
    ) -> Self {
        let id = id.into();
        let mut rng = GameRng::new(config.seed);
        let mut spawns = map.spawns;
        if spawns.is_empty() {
            spawns.push(Coord::new(0, 0));
        }
        let players = PlayerRegistry::new(
            starts
                .iter()
                .enumerate()
                .map(|(index, start)| PlayerRecord::new(start, spawns[index % spawns.len()]))
                .collect(),
        );
        let movement = MovementEngine::new(rng.fork(), config.debug_mode);
        let combat = CombatEngine::new(
            id.clone(),
            broadcaster.clone(),
            timers.scheduler(),
            rng.fork(),
            config.debug_mode,
        );
        let bots = VirtualPlayerEngine::new(
            id.clone(),
            config.mode,
            timers.scheduler(),
            rng.fork(),
            (config.bot_delay_min_ms, config.bot_delay_max_ms),
        );
        let turn_order = players.ids();

        Self {
            id,
            config,
            options,
            grid: map.grid,
            players,
            movement,
            combat,
            bots,
            turns: timers.scheduler(),
            broadcaster,
            turn_order,
            current: 0,
            turn_begun: false,
            pending: None,
            winner: None,
            stalled: false,
            stats: PartyStats::default(),
            journal: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn combat(&self) -> &CombatEngine {
        &self.combat
    }

    pub fn movement(&self) -> &MovementEngine {
        &self.movement
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some() || self.stalled
    }

    pub fn current_player_id(&self) -> Option<&str> {
        self.turn_order.get(self.current).map(String::as_str)
    }

    pub fn armed_timers(&self) -> usize {
        self.combat.armed_timers() + self.bots.armed_timers() + self.turns.armed_count()
    }

    pub fn drain_journal(&mut self) -> Vec<FightLogEntry> {
        std::mem::take(&mut self.journal)
    }

    pub fn summary(&self) -> PartySummary {
        PartySummary {
            party_id: self.id.clone(),
            mode: self.config.mode,
            winner: self.winner.clone(),
            stalled: self.stalled,
            stats: self.stats.clone(),
            wins: self
                .players
                .iter()
                .map(|player| (player.id.clone(), player.wins))
                .collect(),
            fight_log_entries: self.journal.len(),
        }
    }

    pub fn start(&mut self) {
        tracing::info!(
            party_id = %self.id,
            players = self.players.len(),
            mode = ?self.config.mode,
            size = self.grid.size(),
            "party.started"
        );
        self.announce_round();
    }

    pub fn destroy(&mut self) {
        self.combat.reset_all();
        self.bots.destroy();
        self.turns.cancel_all();
    }

    pub fn dispatch(&mut self, command: InboundCommand) {
        if self.is_finished() {
            tracing::warn!(party_id = %self.id, ?command, "party.command_after_finish");
            return;
        }
        match command {
            InboundCommand::BeginRound { player_id } => self.on_begin_round(&player_id),
            InboundCommand::Move {
                player_id,
                destination,
            } => self.on_move(&player_id, destination),
            InboundCommand::EndMoving { player_id } => self.on_end_moving(&player_id),
            InboundCommand::ToggleDoor { player_id, door } => {
                if !self.can_act(&player_id) || !self.toggle_door(&player_id, door.to_coord()) {
                    self.ignore(&player_id, "toggle_door");
                }
            }
            InboundCommand::DoorOpened { player_id, .. } => self.on_door_opened(&player_id),
            InboundCommand::Engage { player_id, target } => {
                if !self.can_act(&player_id) || !self.start_fight(&player_id, target.to_coord(), false)
                {
                    self.ignore(&player_id, "engage");
                }
            }
            InboundCommand::Attack { player_id } => {
                if !self.is_current_attacker(&player_id) {
                    return self.ignore(&player_id, "attack");
                }
                let result = self.combat.handle_attack();
                self.after_round(result);
            }
            InboundCommand::Evade { player_id } => {
                if !self.is_current_attacker(&player_id) {
                    return self.ignore(&player_id, "evade");
                }
                let result = self.combat.handle_evasion();
                self.after_round(result);
            }
            InboundCommand::GiveUp { player_id } => {
                if !self.combat.involves(&player_id) {
                    return self.ignore(&player_id, "give_up");
                }
                let result = self.combat.handle_give_up(&player_id);
                self.after_round(result);
            }
            InboundCommand::EndFight => self.on_end_fight(),
            InboundCommand::EndTurn { player_id } => {
                if !self.can_act(&player_id) {
                    return self.ignore(&player_id, "end_turn");
                }
                self.end_turn(&player_id);
            }
        }
    }

    pub fn on_timer(&mut self, fired: TimerFired) {
        if self.is_finished() {
            return;
        }
        match &fired.key {
            TimerKey::FightRound => match self.combat.on_timer(&fired) {
                Ok(Some(outcome)) => self.after_round(Ok(outcome)),
                Ok(None) => {}
                Err(error) => tracing::warn!(party_id = %self.id, %error, "party.combat_error"),
            },
            TimerKey::BotAction { .. } => {
                let board = BoardView {
                    grid: &self.grid,
                    players: &self.players,
                };
                if let Some((player_id, decision)) =
                    self.bots.on_timer(&fired, board, &mut self.movement)
                {
                    self.apply_bot_decision(&player_id, decision);
                }
            }
            TimerKey::TurnEnd { player_id } => {
                if self.turns.settle(&fired) {
                    self.on_turn_timeout(player_id);
                }
            }
        }
    }

    fn is_current(&self, player_id: &str) -> bool {
        self.current_player_id() == Some(player_id)
    }

    fn can_act(&self, player_id: &str) -> bool {
        self.is_current(player_id)
            && self.turn_begun
            && self.pending.is_none()
            && !self.combat.is_active()
    }

    fn is_current_attacker(&self, player_id: &str) -> bool {
        self.combat
            .current_attacker()
            .is_some_and(|fighter| fighter.id == player_id)
    }

    fn ignore(&self, player_id: &str, command: &'static str) {
        tracing::warn!(party_id = %self.id, player_id, command, "party.command_ignored");
    }

    fn emit(&self, event: OutboundEvent) {
        self.broadcaster.emit(&self.id, event);
    }

    fn announce_round(&mut self) {
        self.turn_begun = false;
        if !self.options.auto_acknowledge {
            return;
        }
        if let Some(player_id) = self.current_player_id().map(str::to_string) {
            self.dispatch(InboundCommand::BeginRound { player_id });
        }
    }

    fn on_begin_round(&mut self, player_id: &str) {
        if !self.is_current(player_id) || self.turn_begun {
            return self.ignore(player_id, "begin_round");
        }
        self.turn_begun = true;
        let is_virtual = match self.players.get_mut(player_id) {
            Some(player) => {
                player.reset_turn_budget();
                player.is_virtual()
            }
            None => false,
        };
        self.turns.arm(
            TimerKey::TurnEnd {
                player_id: player_id.to_string(),
            },
            self.config.turn_duration_ms,
        );
        tracing::debug!(party_id = %self.id, player_id, is_virtual, "party.round_begun");
        if is_virtual {
            let board = BoardView {
                grid: &self.grid,
                players: &self.players,
            };
            self.bots.begin_round(player_id, board);
        }
    }

    fn on_move(&mut self, player_id: &str, destination: WirePos) {
        if !self.can_act(player_id) {
            return self.ignore(player_id, "move");
        }
        let path = self
            .movement
            .path_to(&self.grid, &self.players, player_id, destination.to_coord());
        if path.len() < 2 {
            return self.ignore(player_id, "move");
        }
        self.emit(OutboundEvent::StartMoving {
            player_id: player_id.to_string(),
            destination,
        });
        let slipped = self.apply_move(player_id, &path);
        self.await_move(player_id, slipped);
    }

    fn await_move(&mut self, player_id: &str, slipped: bool) {
        if self.is_finished() {
            return;
        }
        self.pending = Some(Pending::Moving {
            player_id: player_id.to_string(),
            slipped,
        });
        if self.options.auto_acknowledge {
            self.dispatch(InboundCommand::EndMoving {
                player_id: player_id.to_string(),
            });
        }
    }

    fn apply_move(&mut self, player_id: &str, path: &[Coord]) -> bool {
        let can_pick_up = self
            .players
            .get(player_id)
            .is_some_and(|player| !player.inventory_full());
        let execution = self.movement.execute_path(
            &self.grid,
            &self.players,
            player_id,
            path,
            true,
            can_pick_up,
        );
        let Some(player) = self.players.get_mut(player_id) else {
            return false;
        };
        player.position = execution.final_position;
        player.remaining_moves = (player.remaining_moves - execution.cost).max(0);
        self.stats.moves += 1;

        if execution.stopped_on_item.is_some() && !player.inventory_full() {
            if let Some(item) = self.grid.take_item(execution.final_position) {
                player.items.push(item);
                self.stats.items_picked += 1;
                tracing::debug!(party_id = %self.id, player_id, ?item, "party.item_picked");
            }
        }

        let slipped = execution.slipped_at.is_some();
        if let Some(at) = execution.slipped_at {
            player.remaining_moves = 0;
            self.stats.slips += 1;
            self.emit(OutboundEvent::PlayerSlipped {
                player_id: player_id.to_string(),
                at: at.to_wire(),
            });
        }
        self.check_flag_victory(player_id);
        slipped
    }

    fn on_end_moving(&mut self, player_id: &str) {
        let slipped = match &self.pending {
            Some(Pending::Moving {
                player_id: mover,
                slipped,
            }) if mover == player_id => *slipped,
            _ => return self.ignore(player_id, "end_moving"),
        };
        self.pending = None;
        if slipped {
            self.end_turn(player_id);
        } else {
            self.resume_bot(player_id);
        }
    }

    fn toggle_door(&mut self, player_id: &str, door: Coord) -> bool {
        let Some(player) = self.players.get(player_id) else {
            return false;
        };
        if player.actions_left == 0
            || !player.position.is_adjacent(door)
            || !self.grid.kind(door).is_door()
            || self.players.occupant_at(door).is_some()
        {
            return false;
        }
        let Some(kind) = self.grid.toggle_door(door) else {
            return false;
        };
        if let Some(player) = self.players.get_mut(player_id) {
            player.actions_left -= 1;
        }
        self.stats.doors_toggled += 1;
        tracing::debug!(party_id = %self.id, player_id, ?kind, x = door.x, y = door.y, "party.door_toggled");
        self.emit(OutboundEvent::OpenDoor {
            player_id: player_id.to_string(),
            door_pos: door.to_wire(),
        });
        true
    }

    fn on_door_opened(&mut self, player_id: &str) {
        match &self.pending {
            Some(Pending::Door { player_id: opener }) if opener == player_id => {}
            _ => return self.ignore(player_id, "door_opened"),
        }
        self.pending = None;
        self.resume_bot(player_id);
    }

    fn start_fight(&mut self, player_id: &str, target_pos: Coord, is_bot: bool) -> bool {
        let Some(initiator) = self.players.get(player_id) else {
            return false;
        };
        let Some(opponent) = self.players.occupant_at(target_pos) else {
            return false;
        };
        if initiator.actions_left == 0
            || opponent.id == initiator.id
            || !initiator.position.is_adjacent(opponent.position)
        {
            return false;
        }
        if let Err(error) = self.combat.init_fight(initiator, opponent, is_bot) {
            tracing::warn!(party_id = %self.id, player_id, %error, "party.fight_rejected");
            return false;
        }
        if let Some(initiator) = self.players.get_mut(player_id) {
            initiator.actions_left -= 1;
        }
        self.stats.fights += 1;
        self.emit(OutboundEvent::StartFight {
            player_id: player_id.to_string(),
            target_pos: target_pos.to_wire(),
        });
        true
    }

    fn after_round(&mut self, result: Result<RoundOutcome, CombatError>) {
        match result {
            Ok(RoundOutcome::Continue) => {}
            Ok(RoundOutcome::Terminated(resolution)) => self.resolve_fight(*resolution),
            Err(error) => tracing::warn!(party_id = %self.id, %error, "party.combat_error"),
        }
    }

    fn on_end_fight(&mut self) {
        let ends_round = match &self.pending {
            Some(Pending::Fight { ends_round }) => *ends_round,
            _ => {
                tracing::warn!(party_id = %self.id, "party.end_fight_ignored");
                return;
            }
        };
        self.pending = None;
        let Some(current) = self.current_player_id().map(str::to_string) else {
            return;
        };
        if ends_round {
            self.end_turn(&current);
        } else {
            self.resume_bot(&current);
        }
    }

    fn resume_bot(&mut self, player_id: &str) {
        if !self.bots.is_playing(player_id) {
            return;
        }
        let board = BoardView {
            grid: &self.grid,
            players: &self.players,
        };
        self.bots.resume(player_id, board);
    }

    fn apply_bot_decision(&mut self, player_id: &str, decision: BotDecision) {
        if !self.can_act(player_id) {
            return self.ignore(player_id, "bot_decision");
        }
        match decision {
            BotDecision::Fight { target_pos, .. } => {
                if !self.start_fight(player_id, target_pos, true) {
                    self.end_turn(player_id);
                }
            }
            BotDecision::OpenDoor { door } => {
                if !self.toggle_door(player_id, door) {
                    return self.end_turn(player_id);
                }
                self.pending = Some(Pending::Door {
                    player_id: player_id.to_string(),
                });
                if self.options.auto_acknowledge {
                    self.dispatch(InboundCommand::DoorOpened {
                        player_id: player_id.to_string(),
                        door: door.to_wire(),
                    });
                }
            }
            BotDecision::Move { destination } => {
                let path = self
                    .movement
                    .path_to(&self.grid, &self.players, player_id, destination);
                if path.len() < 2 {
                    return self.end_turn(player_id);
                }
                self.emit(OutboundEvent::StartMoving {
                    player_id: player_id.to_string(),
                    destination: destination.to_wire(),
                });
                let slipped = self.apply_move(player_id, &path);
                self.await_move(player_id, slipped);
            }
            BotDecision::EndRound => self.end_turn(player_id),
        }
    }

    fn on_turn_timeout(&mut self, player_id: &str) {
        if !self.is_current(player_id) {
            return;
        }
        if self.combat.is_active() {
            tracing::debug!(party_id = %self.id, player_id, "party.turn_over_during_fight");
            self.combat.mark_turn_over();
            return;
        }
        tracing::debug!(party_id = %self.id, player_id, "party.turn_timeout");
        self.end_turn(player_id);
    }

    fn end_turn(&mut self, player_id: &str) {
        if !self.is_current(player_id) {
            return;
        }
        self.turns.cancel(&TimerKey::TurnEnd {
            player_id: player_id.to_string(),
        });
        self.bots.end_round(player_id);
        self.pending = None;
        self.emit(OutboundEvent::EndRound {
            player_id: player_id.to_string(),
        });
        self.stats.rounds += 1;

        if self
            .options
            .max_rounds
            .is_some_and(|max_rounds| self.stats.rounds >= max_rounds)
        {
            tracing::info!(party_id = %self.id, rounds = self.stats.rounds, "party.stalled");
            self.stalled = true;
            self.destroy();
            return;
        }

        let count = self.turn_order.len();
        for step in 1..=count {
            let candidate = (self.current + step) % count;
            let active = self
                .players
                .get(&self.turn_order[candidate])
                .is_some_and(|player| player.active);
            if active {
                self.current = candidate;
                break;
            }
        }
        self.announce_round();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::scheduler::ManualClock;
    use crate::types::{BotProfile, DiceAssignment, ItemKind, TileKind};

    pub(super) fn start(id: &str, profile: Option<BotProfile>) -> StartPlayer {
        StartPlayer {
            id: id.to_string(),
            name: id.to_string(),
            profile,
            dice: DiceAssignment::ATTACK_D6,
        }
    }

    pub(super) fn party_on(
        rows: &[&str],
        spawns: &[Coord],
        starts: &[StartPlayer],
        config: PartyConfig,
        options: PartyOptions,
    ) -> (Party, ManualClock, RecordingBroadcaster) {
        let clock = ManualClock::new();
        let broadcaster = RecordingBroadcaster::new();
        let map = GeneratedMap {
            grid: Grid::parse_ascii(rows).expect("valid layout"),
            spawns: spawns.to_vec(),
        };
        let party = Party::new(
            "party-1",
            config,
            map,
            starts,
            &clock,
            Arc::new(broadcaster.clone()),
            options,
        );
        (party, clock, broadcaster)
    }

    fn humans() -> (Party, ManualClock, RecordingBroadcaster) {
        party_on(
            &[".....", "..D..", "S....", ".....", "....."],
            &[Coord::new(0, 0), Coord::new(4, 4)],
            &[start("a", None), start("b", None)],
            PartyConfig {
                debug_mode: true,
                ..PartyConfig::default()
            },
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        )
    }

    fn wire(x: i32, y: i32) -> WirePos {
        Coord::new(x, y).to_wire()
    }

    #[test]
    fn start_begins_first_players_round() {
        let (mut party, clock, _) = humans();
        party.start();
        assert_eq!(party.current_player_id(), Some("a"));
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn commands_from_the_wrong_player_are_ignored() {
        let (mut party, _, broadcaster) = humans();
        party.start();
        party.dispatch(InboundCommand::Move {
            player_id: "b".to_string(),
            destination: wire(3, 4),
        });
        assert_eq!(
            party.players().get("b").map(|player| player.position),
            Some(Coord::new(4, 4))
        );
        assert_eq!(broadcaster.count("start_moving"), 0);
    }

    #[test]
    fn human_move_picks_up_item_and_spends_moves() {
        let (mut party, _, broadcaster) = humans();
        party.start();
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(0, 2),
        });
        let a = party.players().get("a").expect("a exists");
        assert_eq!(a.position, Coord::new(0, 2));
        assert_eq!(a.items, vec![ItemKind::Sword]);
        assert_eq!(a.remaining_moves, a.speed - 2);
        assert_eq!(party.grid().item(Coord::new(0, 2)), None);
        assert_eq!(broadcaster.count("start_moving"), 1);
    }

    #[test]
    fn full_inventory_walks_over_items() {
        let (mut party, _, _) = humans();
        party.start();
        if let Some(a) = party.players.get_mut("a") {
            a.items = vec![ItemKind::Shield, ItemKind::Potion];
        }
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(0, 3),
        });
        let a = party.players().get("a").expect("a exists");
        assert_eq!(a.position, Coord::new(0, 3));
        assert_eq!(a.items, vec![ItemKind::Shield, ItemKind::Potion]);
        assert_eq!(a.remaining_moves, a.speed - 3);
        assert_eq!(party.grid().item(Coord::new(0, 2)), Some(ItemKind::Sword));
    }

    #[test]
    fn door_toggle_spends_the_action() {
        let (mut party, _, broadcaster) = humans();
        party.start();
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(2, 0),
        });
        party.dispatch(InboundCommand::ToggleDoor {
            player_id: "a".to_string(),
            door: wire(2, 1),
        });
        assert_eq!(party.grid().kind(Coord::new(2, 1)), TileKind::DoorOpen);
        assert_eq!(broadcaster.count("open_door"), 1);

        party.dispatch(InboundCommand::ToggleDoor {
            player_id: "a".to_string(),
            door: wire(2, 1),
        });
        assert_eq!(party.grid().kind(Coord::new(2, 1)), TileKind::DoorOpen);
    }

    #[test]
    fn end_turn_rotates_to_next_player() {
        let (mut party, _, broadcaster) = humans();
        party.start();
        party.dispatch(InboundCommand::EndTurn {
            player_id: "a".to_string(),
        });
        assert_eq!(party.current_player_id(), Some("b"));
        assert_eq!(broadcaster.count("end_round"), 1);
        assert_eq!(party.summary().stats.rounds, 1);
    }

    #[test]
    fn turn_timer_ends_an_idle_turn() {
        let (mut party, clock, _) = humans();
        party.start();
        let fired = clock.advance().expect("turn timer armed");
        party.on_timer(fired);
        assert_eq!(party.current_player_id(), Some("b"));
    }

    #[test]
    fn give_up_respawns_loser_and_scatters_items() {
        let (mut party, _, broadcaster) = party_on(
            &[".....", ".....", ".....", ".....", "....."],
            &[Coord::new(0, 0), Coord::new(1, 0)],
            &[start("a", None), start("b", None)],
            PartyConfig::default(),
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        );
        party.start();
        if let Some(b) = party.players.get_mut("b") {
            b.items = vec![ItemKind::Wager, ItemKind::Shield];
            b.wins = 1;
        }
        party.dispatch(InboundCommand::Engage {
            player_id: "a".to_string(),
            target: wire(1, 0),
        });
        assert!(party.combat().is_active());
        party.dispatch(InboundCommand::GiveUp {
            player_id: "b".to_string(),
        });

        assert!(!party.combat().is_active());
        let b = party.players().get("b").expect("b exists");
        assert!(b.items.is_empty());
        assert_eq!(b.wins, 0);
        assert_eq!(party.players().get("a").map(|a| a.wins), Some(1));
        assert_eq!(party.grid().item_positions().len(), 2);
        assert_eq!(broadcaster.count("items_scattered"), 1);
        assert_eq!(broadcaster.count("player_respawned"), 1);
        assert_eq!(party.current_player_id(), Some("a"));
    }

    #[test]
    fn reaching_wins_to_victory_finishes_the_party() {
        let (mut party, _, broadcaster) = party_on(
            &["...", "...", "..."],
            &[Coord::new(0, 0), Coord::new(1, 0)],
            &[start("a", None), start("b", None)],
            PartyConfig {
                wins_to_victory: 1,
                ..PartyConfig::default()
            },
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        );
        party.start();
        party.dispatch(InboundCommand::Engage {
            player_id: "a".to_string(),
            target: wire(1, 0),
        });
        party.dispatch(InboundCommand::GiveUp {
            player_id: "b".to_string(),
        });
        assert!(party.is_finished());
        assert_eq!(party.winner(), Some("a"));
        assert_eq!(broadcaster.count("party_won"), 1);
        assert_eq!(party.armed_timers(), 0);
    }

    #[test]
    fn turn_timeout_during_fight_ends_round_after_fight() {
        let (mut party, clock, _) = party_on(
            &["...", "...", "..."],
            &[Coord::new(0, 0), Coord::new(1, 0)],
            &[start("a", None), start("b", None)],
            PartyConfig {
                turn_duration_ms: 1_000,
                ..PartyConfig::default()
            },
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        );
        party.start();
        party.dispatch(InboundCommand::Engage {
            player_id: "a".to_string(),
            target: wire(1, 0),
        });
        let fired = clock.advance().expect("turn timer due first");
        assert!(matches!(fired.key, TimerKey::TurnEnd { .. }));
        party.on_timer(fired);
        assert_eq!(party.current_player_id(), Some("a"));
        assert!(party.combat().fight().is_some_and(|fight| fight.is_turn_over()));

        party.dispatch(InboundCommand::GiveUp {
            player_id: "b".to_string(),
        });
        assert_eq!(party.current_player_id(), Some("b"));
    }

    #[test]
    fn manual_acknowledgement_waits_for_client() {
        let (mut party, _, _) = party_on(
            &[".....", ".....", ".....", ".....", "....."],
            &[Coord::new(0, 0), Coord::new(4, 4)],
            &[start("a", None), start("b", None)],
            PartyConfig::default(),
            PartyOptions::default(),
        );
        party.start();
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(1, 0),
        });
        assert_eq!(
            party.players().get("a").map(|a| a.position),
            Some(Coord::new(0, 0))
        );

        party.dispatch(InboundCommand::BeginRound {
            player_id: "a".to_string(),
        });
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(1, 0),
        });
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(2, 0),
        });
        assert_eq!(
            party.players().get("a").map(|a| a.position),
            Some(Coord::new(1, 0))
        );
        party.dispatch(InboundCommand::EndMoving {
            player_id: "a".to_string(),
        });
        party.dispatch(InboundCommand::Move {
            player_id: "a".to_string(),
            destination: wire(2, 0),
        });
        assert_eq!(
            party.players().get("a").map(|a| a.position),
            Some(Coord::new(2, 0))
        );
    }

    #[test]
    fn destroy_is_idempotent() {
        let (mut party, clock, _) = humans();
        party.start();
        party.destroy();
        party.destroy();
        assert_eq!(party.armed_timers(), 0);
        assert_eq!(clock.pending(), 0);
    }

    fn bot_against_human() -> (Party, ManualClock, RecordingBroadcaster) {
        party_on(
            &[".....", ".....", ".....", ".....", "....."],
            &[Coord::new(0, 0), Coord::new(4, 4)],
            &[start("bot", Some(BotProfile::Aggressive)), start("h", None)],
            PartyConfig::default(),
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        )
    }

    #[test]
    fn rejected_bot_fight_is_never_announced() {
        let (mut party, _, broadcaster) = bot_against_human();
        party.start();
        party.apply_bot_decision(
            "bot",
            BotDecision::Fight {
                target_id: "h".to_string(),
                target_pos: Coord::new(4, 4),
            },
        );
        assert!(!party.combat().is_active());
        assert_eq!(broadcaster.count("start_fight"), 0);
        assert_eq!(broadcaster.count("end_round"), 1);
        assert_eq!(party.current_player_id(), Some("h"));
    }

    #[test]
    fn accepted_bot_fight_is_announced_once() {
        let (mut party, _, broadcaster) = bot_against_human();
        party.start();
        if let Some(h) = party.players.get_mut("h") {
            h.position = Coord::new(1, 0);
        }
        party.apply_bot_decision(
            "bot",
            BotDecision::Fight {
                target_id: "h".to_string(),
                target_pos: Coord::new(1, 0),
            },
        );
        assert!(party.combat().is_active());
        assert_eq!(broadcaster.count("start_fight"), 1);
        assert_eq!(broadcaster.count("end_round"), 0);
    }
}
