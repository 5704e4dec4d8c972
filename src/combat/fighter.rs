use crate::constants::MAX_ESCAPE_ATTEMPTS;
use crate::players::PlayerRecord;
use crate::types::{BotProfile, DiceAssignment, ItemKind, PlayerId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fighter {
    pub id: PlayerId,
    pub attack: i32,
    pub defense: i32,
    pub life: i32,
    pub max_life: i32,
    pub speed: i32,
    pub remain_escape: u8,
    pub damage_taken: i32,
    pub dice: DiceAssignment,
    pub profile: Option<BotProfile>,
    pub items: Vec<ItemKind>,
}

impl Fighter {
    pub fn from_player(player: &PlayerRecord) -> Self {
        Self {
            id: player.id.clone(),
            attack: player.attack(),
            defense: player.defense(),
            life: player.max_life,
            max_life: player.max_life,
            speed: player.speed,
            remain_escape: MAX_ESCAPE_ATTEMPTS,
            damage_taken: 0,
            dice: player.dice,
            profile: player.profile,
            items: player.items.clone(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.profile.is_some()
    }

    pub fn has_item(&self, item: ItemKind) -> bool {
        self.items.contains(&item)
    }

    pub fn is_escape_attempts_exhausted(&self) -> bool {
        self.remain_escape == 0
    }

    pub fn is_dead(&self) -> bool {
        self.life <= 0
    }
}

#[derive(Clone, Debug)]
pub struct Fight {
    pub(crate) fighters: [Fighter; 2],
    pub(crate) attacker: usize,
    pub(crate) initiator_id: PlayerId,
    pub(crate) initiated_by_bot: bool,
    pub(crate) round: u32,
    pub(crate) is_turn_over: bool,
    pub(crate) life_swap_used: bool,
    pub(crate) bonus_life_used: bool,
}

impl Fight {
    /// The faster fighter opens; on equal speed the initiator does.
    pub fn new(initiator: Fighter, opponent: Fighter, initiated_by_bot: bool) -> Self {
        let attacker = if opponent.speed > initiator.speed { 1 } else { 0 };
        Self {
            initiator_id: initiator.id.clone(),
            fighters: [initiator, opponent],
            attacker,
            initiated_by_bot,
            round: 0,
            is_turn_over: false,
            life_swap_used: false,
            bonus_life_used: false,
        }
    }

    pub fn attacker(&self) -> &Fighter {
        &self.fighters[self.attacker]
    }

    pub fn defender(&self) -> &Fighter {
        &self.fighters[1 - self.attacker]
    }

    pub fn attacker_mut(&mut self) -> &mut Fighter {
        &mut self.fighters[self.attacker]
    }

    pub fn defender_mut(&mut self) -> &mut Fighter {
        &mut self.fighters[1 - self.attacker]
    }

    pub fn fighters(&self) -> &[Fighter; 2] {
        &self.fighters
    }

    pub fn initiator_id(&self) -> &str {
        &self.initiator_id
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_turn_over(&self) -> bool {
        self.is_turn_over
    }

    pub fn index_of(&self, player_id: &str) -> Option<usize> {
        self.fighters
            .iter()
            .position(|fighter| fighter.id == player_id)
    }

    pub fn both_virtual(&self) -> bool {
        self.fighters.iter().all(Fighter::is_virtual)
    }

    pub fn swap_roles(&mut self) {
        self.attacker = 1 - self.attacker;
    }
}
