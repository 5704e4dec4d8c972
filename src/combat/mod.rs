use std::sync::Arc;

use crate::broadcast::PartyBroadcaster;
use crate::constants::{dice_faces, escape_chance, round_duration_ms, POTION_BONUS_LIFE};
use crate::error::CombatError;
use crate::players::PlayerRecord;
use crate::rng::GameRng;
use crate::scheduler::{Scheduler, TimerFired, TimerKey};
use crate::types::{BotProfile, DiceKind, ItemKind, OutboundEvent, PlayerId};

mod fighter;
mod journal;

pub use self::fighter::{Fight, Fighter};
pub use self::journal::FightLogEntry;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FightPhase {
    #[default]
    Idle,
    Engaged,
    RoundInProgress,
    RoundResolved,
    Terminated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FightResolution {
    pub winner: Option<PlayerId>,
    pub loser: Option<PlayerId>,
    pub initiator_id: PlayerId,
    pub initiated_by_bot: bool,
    pub ends_outer_round: bool,
    pub loser_forfeits_win: bool,
    pub rounds: u32,
    pub fighters: [Fighter; 2],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    Continue,
    Terminated(Box<FightResolution>),
}

/// Strict comparison: ties favor the defender.
pub fn attack_succeeds(attack: i32, attack_roll: i32, defense: i32, defense_roll: i32) -> bool {
    attack + attack_roll > defense + defense_roll
}

pub struct CombatEngine {
    party_id: String,
    broadcaster: Arc<dyn PartyBroadcaster>,
    scheduler: Box<dyn Scheduler>,
    rng: GameRng,
    debug_mode: bool,
    fight: Option<Fight>,
    phase: FightPhase,
    journal: Vec<FightLogEntry>,
}

impl CombatEngine {
    pub fn new(
        party_id: impl Into<String>,
        broadcaster: Arc<dyn PartyBroadcaster>,
        scheduler: Box<dyn Scheduler>,
        rng: GameRng,
        debug_mode: bool,
    ) -> Self {
        Self {
            party_id: party_id.into(),
            broadcaster,
            scheduler,
            rng,
            debug_mode,
            fight: None,
            phase: FightPhase::Idle,
            journal: Vec::new(),
        }
    }

    pub fn phase(&self) -> FightPhase {
        self.phase
    }

    pub fn fight(&self) -> Option<&Fight> {
        self.fight.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.fight.is_some()
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.fight
            .as_ref()
            .is_some_and(|fight| fight.index_of(player_id).is_some())
    }

    pub fn current_attacker(&self) -> Option<&Fighter> {
        self.fight.as_ref().map(Fight::attacker)
    }

    pub fn is_escape_attempts_exhausted(&self) -> bool {
        self.current_attacker()
            .is_some_and(Fighter::is_escape_attempts_exhausted)
    }

    pub fn armed_timers(&self) -> usize {
        self.scheduler.armed_count()
    }

    pub fn drain_journal(&mut self) -> Vec<FightLogEntry> {
        std::mem::take(&mut self.journal)
    }

    pub fn init_fight(
        &mut self,
        initiator: &PlayerRecord,
        opponent: &PlayerRecord,
        is_bot: bool,
    ) -> Result<(), CombatError> {
        if self.fight.is_some() {
            return Err(CombatError::FightInProgress);
        }
        if initiator.id == opponent.id {
            return Err(CombatError::SelfFight);
        }

        let fight = Fight::new(
            Fighter::from_player(initiator),
            Fighter::from_player(opponent),
            is_bot,
        );
        let first_attacker = fight.attacker().id.clone();
        tracing::info!(
            party_id = %self.party_id,
            initiator = %initiator.id,
            opponent = %opponent.id,
            first_attacker = %first_attacker,
            is_bot,
            "fight.initiated"
        );
        self.log(0, format!("{} engages {}", initiator.id, opponent.id));
        self.emit(OutboundEvent::FightInitiated {
            initiator: initiator.id.clone(),
            opponent: opponent.id.clone(),
            first_attacker,
        });
        self.fight = Some(fight);
        self.phase = FightPhase::Engaged;
        self.configure_timer_events()
    }

    pub fn configure_timer_events(&mut self) -> Result<(), CombatError> {
        let fight = self.fight.as_ref().ok_or(CombatError::NoActiveFight)?;
        let attacker = fight.attacker();
        let round_ms = round_duration_ms(attacker.remain_escape, fight.both_virtual());
        let event = OutboundEvent::UpdateCurrentAttacker {
            player_id: attacker.id.clone(),
            round_ms,
            can_evade: !attacker.is_escape_attempts_exhausted(),
        };
        self.scheduler.arm(TimerKey::FightRound, round_ms);
        self.phase = FightPhase::RoundInProgress;
        self.emit(event);
        Ok(())
    }

    pub fn handle_attack(&mut self) -> Result<RoundOutcome, CombatError> {
        let mut fight = self.take_round()?;
        fight.round += 1;

        let attack_roll = self.roll(fight.attacker().dice.attack, true);
        let defense_roll = self.roll(fight.defender().dice.defense, false);
        let success = attack_succeeds(
            fight.attacker().attack,
            attack_roll,
            fight.defender().defense,
            defense_roll,
        );
        if success {
            let defender = fight.defender_mut();
            defender.life -= 1;
            defender.damage_taken += 1;
        }

        let attacker_id = fight.attacker().id.clone();
        let defender_id = fight.defender().id.clone();
        tracing::debug!(
            party_id = %self.party_id,
            round = fight.round,
            attacker = %attacker_id,
            defender = %defender_id,
            attack_roll,
            defense_roll,
            success,
            defender_life = fight.defender().life,
            "round.resolved"
        );
        self.log(
            fight.round,
            format!(
                "{attacker_id} rolls {attack_roll} against {defender_id} rolling {defense_roll}: {}",
                if success { "hit" } else { "blocked" }
            ),
        );
        self.emit(OutboundEvent::DiceRollResult {
            attacker: attacker_id,
            defender: defender_id,
            attack_roll,
            defense_roll,
            success,
            defender_life: fight.defender().life,
        });

        if success {
            self.apply_item_hooks(&mut fight);
        }

        if fight.defender().is_dead() {
            let winner = fight.attacker;
            return Ok(self.terminate(fight, Some(winner)));
        }
        self.next_round(fight)
    }

    /// Escape attempt by the current attacker. With no attempts left nothing
    /// is rolled and the attempt fails outright.
    pub fn handle_evasion(&mut self) -> Result<RoundOutcome, CombatError> {
        let mut fight = self.take_round()?;
        fight.round += 1;
        let exhausted = fight.attacker().is_escape_attempts_exhausted();
        let escaped =
            !exhausted && self.rng.chance(escape_chance(fight.attacker().remain_escape));
        let evader = fight.attacker_mut();
        evader.remain_escape = evader.remain_escape.saturating_sub(1);
        let evader_id = evader.id.clone();
        let remain_escape = evader.remain_escape;

        tracing::debug!(
            party_id = %self.party_id,
            player_id = %evader_id,
            escaped,
            remain_escape,
            exhausted,
            "fight.escape"
        );
        if escaped {
            self.log(fight.round, format!("{evader_id} escapes"));
            self.emit(OutboundEvent::EscapePassed {
                player_id: evader_id,
            });
            return Ok(self.terminate(fight, None));
        }

        self.log(fight.round, format!("{evader_id} fails to escape"));
        self.emit(OutboundEvent::EscapeFailed {
            player_id: evader_id,
            remain_escape,
        });
        self.next_round(fight)
    }

    pub fn handle_give_up(&mut self, player_id: &str) -> Result<RoundOutcome, CombatError> {
        let giver = self
            .fight
            .as_ref()
            .ok_or(CombatError::NoActiveFight)?
            .index_of(player_id)
            .ok_or_else(|| CombatError::UnknownFighter(player_id.to_string()))?;
        let fight = self.take_round()?;
        tracing::info!(party_id = %self.party_id, player_id, "fight.give_up");
        self.log(fight.round, format!("{player_id} gives up"));
        Ok(self.terminate(fight, Some(1 - giver)))
    }

    pub fn on_timer(&mut self, fired: &TimerFired) -> Result<Option<RoundOutcome>, CombatError> {
        if fired.key != TimerKey::FightRound || !self.scheduler.settle(fired) {
            return Ok(None);
        }
        let attacker = self
            .current_attacker()
            .ok_or(CombatError::NoActiveFight)?;
        let evades = attacker.profile == Some(BotProfile::Defensive)
            && attacker.damage_taken > 0
            && !attacker.is_escape_attempts_exhausted();
        tracing::debug!(
            party_id = %self.party_id,
            player_id = %attacker.id,
            evades,
            "round.timeout"
        );
        let outcome = if evades {
            self.handle_evasion()?
        } else {
            self.handle_attack()?
        };
        Ok(Some(outcome))
    }

    pub fn mark_turn_over(&mut self) {
        if let Some(fight) = self.fight.as_mut() {
            fight.is_turn_over = true;
        }
    }

    pub fn reset_all(&mut self) {
        self.scheduler.cancel_all();
        if self.fight.take().is_some() {
            tracing::debug!(party_id = %self.party_id, "fight.reset");
        }
        self.phase = FightPhase::Idle;
    }

    fn take_round(&mut self) -> Result<Fight, CombatError> {
        let fight = self.fight.take().ok_or(CombatError::NoActiveFight)?;
        self.scheduler.cancel(&TimerKey::FightRound);
        self.phase = FightPhase::RoundResolved;
        Ok(fight)
    }

    fn next_round(&mut self, mut fight: Fight) -> Result<RoundOutcome, CombatError> {
        fight.swap_roles();
        self.fight = Some(fight);
        self.phase = FightPhase::Engaged;
        self.configure_timer_events()?;
        Ok(RoundOutcome::Continue)
    }

    fn roll(&mut self, kind: DiceKind, attacking: bool) -> i32 {
        let faces = dice_faces(kind);
        match (self.debug_mode, attacking) {
            (true, true) => faces,
            (true, false) => 1,
            (false, _) => self.rng.int(1, faces),
        }
    }

    fn apply_item_hooks(&mut self, fight: &mut Fight) {
        let round = fight.round;
        let attacker_life = fight.attacker().life;
        let defender = fight.defender();
        if !fight.life_swap_used
            && defender.has_item(ItemKind::Mirror)
            && !defender.is_dead()
            && defender.life < attacker_life
        {
            fight.life_swap_used = true;
            let defender_life = fight.defender().life;
            fight.attacker_mut().life = defender_life;
            fight.defender_mut().life = attacker_life;
            let attacker_id = fight.attacker().id.clone();
            let defender_id = fight.defender().id.clone();
            self.log(round, format!("{defender_id} swaps life with {attacker_id}"));
            self.emit(OutboundEvent::LifeSwapped {
                attacker: attacker_id,
                defender: defender_id,
                attacker_life: defender_life,
                defender_life: attacker_life,
            });
        }

        let defender = fight.defender();
        if !fight.bonus_life_used && defender.has_item(ItemKind::Potion) && defender.is_dead() {
            fight.bonus_life_used = true;
            let defender = fight.defender_mut();
            defender.life = POTION_BONUS_LIFE;
            let player_id = defender.id.clone();
            self.log(round, format!("{player_id} drinks a potion"));
            self.emit(OutboundEvent::BonusLifeGranted {
                player_id,
                life: POTION_BONUS_LIFE,
            });
        }
    }

    fn terminate(&mut self, fight: Fight, winner: Option<usize>) -> RoundOutcome {
        self.scheduler.cancel_all();
        let winner_id = winner.map(|idx| fight.fighters[idx].id.clone());
        let loser = winner.map(|idx| &fight.fighters[1 - idx]);
        let loser_id = loser.map(|fighter| fighter.id.clone());
        let loser_forfeits_win = loser.is_some_and(|fighter| fighter.has_item(ItemKind::Wager));
        let ends_outer_round =
            fight.is_turn_over || winner_id.as_deref() != Some(fight.initiator_id.as_str());

        tracing::info!(
            party_id = %self.party_id,
            winner = winner_id.as_deref().unwrap_or("-"),
            loser = loser_id.as_deref().unwrap_or("-"),
            rounds = fight.round,
            ends_outer_round,
            "fight.terminated"
        );
        self.log(
            fight.round,
            match &winner_id {
                Some(id) => format!("{id} wins"),
                None => "fight ends without a winner".to_string(),
            },
        );
        self.emit(OutboundEvent::FightTerminated {
            winner: winner_id.clone(),
            loser: loser_id.clone(),
            ends_round: ends_outer_round,
        });
        self.phase = FightPhase::Terminated;

        RoundOutcome::Terminated(Box::new(FightResolution {
            winner: winner_id,
            loser: loser_id,
            initiator_id: fight.initiator_id,
            initiated_by_bot: fight.initiated_by_bot,
            ends_outer_round,
            loser_forfeits_win,
            rounds: fight.round,
            fighters: fight.fighters,
        }))
    }

    fn emit(&self, event: OutboundEvent) {
        self.broadcaster.emit(&self.party_id, event);
    }

    fn log(&mut self, round: u32, label: String) {
        self.journal.push(FightLogEntry::now(round, label));
    }
}
