use std::collections::HashMap;

use crate::constants::{
    ACTIONS_PER_TURN, BASE_ATTACK, BASE_DEFENSE, BASE_LIFE, BASE_SPEED, BONUS_STAT, MAX_INVENTORY,
};
use crate::types::{BotProfile, Coord, DiceAssignment, ItemKind, PlayerId};

#[derive(Clone, Debug)]
pub struct StartPlayer {
    pub id: PlayerId,
    pub name: String,
    pub profile: Option<BotProfile>,
    pub dice: DiceAssignment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub spawn: Coord,
    pub position: Coord,
    pub base_attack: i32,
    pub base_defense: i32,
    pub max_life: i32,
    pub speed: i32,
    pub remaining_moves: i32,
    pub actions_left: u8,
    pub items: Vec<ItemKind>,
    pub wins: u32,
    pub active: bool,
    pub dice: DiceAssignment,
    pub profile: Option<BotProfile>,
}

impl PlayerRecord {
    pub fn new(start: &StartPlayer, spawn: Coord) -> Self {
        Self {
            id: start.id.clone(),
            name: start.name.clone(),
            spawn,
            position: spawn,
            base_attack: BASE_ATTACK,
            base_defense: BASE_DEFENSE,
            max_life: BASE_LIFE,
            speed: BASE_SPEED,
            remaining_moves: BASE_SPEED,
            actions_left: ACTIONS_PER_TURN,
            items: Vec::new(),
            wins: 0,
            active: true,
            dice: start.dice,
            profile: start.profile,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.profile.is_some()
    }

    pub fn inventory_full(&self) -> bool {
        self.items.len() >= MAX_INVENTORY
    }

    pub fn has_item(&self, item: ItemKind) -> bool {
        self.items.contains(&item)
    }

    pub fn attack(&self) -> i32 {
        let bonus: i32 = self
            .items
            .iter()
            .map(|item| match item {
                ItemKind::Sword => BONUS_STAT,
                ItemKind::Wager => BONUS_STAT / 2,
                _ => 0,
            })
            .sum();
        self.base_attack + bonus
    }

    pub fn defense(&self) -> i32 {
        let bonus: i32 = self
            .items
            .iter()
            .filter(|item| item.boosts_defense())
            .map(|_| BONUS_STAT)
            .sum();
        self.base_defense + bonus
    }

    pub fn reset_turn_budget(&mut self) {
        self.remaining_moves = self.speed;
        self.actions_left = ACTIONS_PER_TURN;
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<PlayerRecord>,
    index: HashMap<PlayerId, usize>,
}

impl PlayerRegistry {
    pub fn new(players: Vec<PlayerRecord>) -> Self {
        let index = players
            .iter()
            .enumerate()
            .map(|(idx, player)| (player.id.clone(), idx))
            .collect();
        Self { players, index }
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.index.get(player_id).map(|idx| &self.players[*idx])
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut PlayerRecord> {
        self.index.get(player_id).map(|idx| &mut self.players[*idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().filter(|player| player.active)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|player| player.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn occupant_at(&self, coord: Coord) -> Option<&PlayerRecord> {
        self.active().find(|player| player.position == coord)
    }

    pub fn is_occupied_by_other(&self, coord: Coord, mover_id: &str) -> bool {
        self.active()
            .any(|player| player.position == coord && player.id != mover_id)
    }

    pub fn set_position(&mut self, player_id: &str, coord: Coord) -> bool {
        match self.get_mut(player_id) {
            Some(player) => {
                player.position = coord;
                true
            }
            None => false,
        }
    }

    pub fn flag_carrier(&self) -> Option<&PlayerRecord> {
        self.active().find(|player| player.has_item(ItemKind::Flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(id: &str) -> StartPlayer {
        StartPlayer {
            id: id.to_string(),
            name: id.to_uppercase(),
            profile: None,
            dice: DiceAssignment::ATTACK_D6,
        }
    }

    #[test]
    fn item_effects_raise_scores() {
        let mut player = PlayerRecord::new(&start("p1"), Coord::new(0, 0));
        assert_eq!(player.attack(), BASE_ATTACK);
        player.items.push(ItemKind::Sword);
        player.items.push(ItemKind::Shield);
        assert_eq!(player.attack(), BASE_ATTACK + BONUS_STAT);
        assert_eq!(player.defense(), BASE_DEFENSE + BONUS_STAT);
        assert!(player.inventory_full());
    }

    #[test]
    fn occupancy_ignores_inactive_and_self() {
        let mut a = PlayerRecord::new(&start("a"), Coord::new(1, 1));
        let b = PlayerRecord::new(&start("b"), Coord::new(2, 1));
        a.active = false;
        let registry = PlayerRegistry::new(vec![a, b]);
        assert!(registry.occupant_at(Coord::new(1, 1)).is_none());
        assert!(registry.is_occupied_by_other(Coord::new(2, 1), "a"));
        assert!(!registry.is_occupied_by_other(Coord::new(2, 1), "b"));
    }

    #[test]
    fn registry_updates_positions_by_id() {
        let mut registry = PlayerRegistry::new(vec![PlayerRecord::new(
            &start("p1"),
            Coord::new(0, 0),
        )]);
        assert!(registry.set_position("p1", Coord::new(3, 2)));
        assert!(!registry.set_position("ghost", Coord::new(3, 2)));
        assert_eq!(
            registry.get("p1").map(|player| player.position),
            Some(Coord::new(3, 2))
        );
    }
}
