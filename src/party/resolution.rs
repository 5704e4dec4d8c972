use crate::combat::FightResolution;
use crate::types::{GameMode, InboundCommand, ItemKind, OutboundEvent, TileKind};

use super::{Party, Pending};

impl Party {
    pub(super) fn resolve_fight(&mut self, resolution: FightResolution) {
        self.journal.extend(self.combat.drain_journal());
        self.combat.reset_all();

        match (&resolution.winner, &resolution.loser) {
            (Some(winner_id), Some(loser_id)) => {
                if let Some(winner) = self.players.get_mut(winner_id) {
                    winner.wins += 1;
                }
                if resolution.loser_forfeits_win {
                    if let Some(loser) = self.players.get_mut(loser_id) {
                        loser.wins = loser.wins.saturating_sub(1);
                    }
                }
                self.scatter_items(loser_id);
                self.respawn(loser_id);
                if self.check_wins_victory(winner_id) {
                    return;
                }
            }
            _ => self.stats.escapes += 1,
        }

        self.pending = Some(Pending::Fight {
            ends_round: resolution.ends_outer_round,
        });
        if self.options.auto_acknowledge {
            self.dispatch(InboundCommand::EndFight);
        }
    }

    fn scatter_items(&mut self, loser_id: &str) {
        let Some(loser) = self.players.get_mut(loser_id) else {
            return;
        };
        let origin = loser.position;
        let items = std::mem::take(&mut loser.items);
        if items.is_empty() {
            return;
        }

        let mut scattered = Vec::with_capacity(items.len());
        for item in items {
            let players = &self.players;
            let spot = self.grid.nearest_matching(origin, |coord, tile| {
                tile.item.is_none()
                    && matches!(tile.kind, TileKind::Normal | TileKind::Ice | TileKind::Water)
                    && !players.is_occupied_by_other(coord, loser_id)
            });
            match spot {
                Some(spot) if self.grid.place_item(spot, item) => {
                    scattered.push((item, spot.to_wire()));
                }
                _ => tracing::warn!(party_id = %self.id, loser_id, ?item, "party.item_lost"),
            }
        }
        self.emit(OutboundEvent::ItemsScattered {
            player_id: loser_id.to_string(),
            items: scattered,
        });
    }

    fn respawn(&mut self, loser_id: &str) {
        let Some(spawn) = self.players.get(loser_id).map(|player| player.spawn) else {
            return;
        };
        let players = &self.players;
        let at = self
            .grid
            .nearest_matching(spawn, |coord, tile| {
                !matches!(tile.kind, TileKind::Wall | TileKind::DoorClosed)
                    && !players.is_occupied_by_other(coord, loser_id)
            })
            .unwrap_or(spawn);
        if let Some(loser) = self.players.get_mut(loser_id) {
            loser.position = at;
            loser.remaining_moves = 0;
        }
        self.stats.respawns += 1;
        tracing::debug!(party_id = %self.id, loser_id, x = at.x, y = at.y, "party.respawned");
        self.emit(OutboundEvent::PlayerRespawned {
            player_id: loser_id.to_string(),
            at: at.to_wire(),
        });
    }

    fn check_wins_victory(&mut self, winner_id: &str) -> bool {
        if self.config.mode != GameMode::Classic {
            return false;
        }
        let wins = self
            .players
            .get(winner_id)
            .map_or(0, |winner| winner.wins);
        if wins < self.config.wins_to_victory {
            return false;
        }
        self.declare_winner(winner_id);
        true
    }

    pub(super) fn check_flag_victory(&mut self, player_id: &str) -> bool {
        if self.config.mode != GameMode::CaptureTheFlag {
            return false;
        }
        let home = self
            .players
            .get(player_id)
            .is_some_and(|player| player.has_item(ItemKind::Flag) && player.position == player.spawn);
        if home {
            self.declare_winner(player_id);
        }
        home
    }

    fn declare_winner(&mut self, player_id: &str) {
        tracing::info!(
            party_id = %self.id,
            player_id,
            rounds = self.stats.rounds,
            fights = self.stats.fights,
            "party.won"
        );
        self.winner = Some(player_id.to_string());
        self.pending = None;
        self.emit(OutboundEvent::PartyWon {
            player_id: player_id.to_string(),
        });
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{party_on, start};
    use super::*;
    use crate::config::PartyConfig;
    use crate::party::PartyOptions;
    use crate::types::{BotProfile, Coord};

    #[test]
    fn respawn_avoids_an_occupied_spawn() {
        let (mut party, _, broadcaster) = party_on(
            &["....", "....", "....", "...."],
            &[Coord::new(0, 0), Coord::new(3, 3)],
            &[start("a", None), start("b", None)],
            PartyConfig::default(),
            PartyOptions::default(),
        );
        if let Some(a) = party.players.get_mut("a") {
            a.position = Coord::new(3, 3);
        }
        if let Some(b) = party.players.get_mut("b") {
            b.position = Coord::new(1, 1);
        }
        party.respawn("b");

        let b = party.players().get("b").expect("b exists");
        assert_eq!(b.position.manhattan(Coord::new(3, 3)), 1);
        assert_eq!(broadcaster.count("player_respawned"), 1);
    }

    #[test]
    fn flag_carrier_home_wins_capture_the_flag() {
        let (mut party, _, broadcaster) = party_on(
            &["...", "...", "..."],
            &[Coord::new(0, 0), Coord::new(2, 2)],
            &[start("a", None), start("bot", Some(BotProfile::Aggressive))],
            PartyConfig {
                mode: GameMode::CaptureTheFlag,
                ..PartyConfig::default()
            },
            PartyOptions::default(),
        );
        if let Some(a) = party.players.get_mut("a") {
            a.items.push(ItemKind::Flag);
            a.position = Coord::new(1, 0);
        }
        assert!(!party.check_flag_victory("a"));

        if let Some(a) = party.players.get_mut("a") {
            a.position = Coord::new(0, 0);
        }
        assert!(party.check_flag_victory("a"));
        assert_eq!(party.winner(), Some("a"));
        assert_eq!(broadcaster.count("party_won"), 1);
    }

    #[test]
    fn classic_wins_do_not_count_in_capture_the_flag() {
        let (mut party, _, _) = party_on(
            &["...", "...", "..."],
            &[Coord::new(0, 0), Coord::new(2, 2)],
            &[start("a", None), start("b", None)],
            PartyConfig {
                mode: GameMode::CaptureTheFlag,
                wins_to_victory: 1,
                ..PartyConfig::default()
            },
            PartyOptions::default(),
        );
        if let Some(a) = party.players.get_mut("a") {
            a.wins = 5;
        }
        assert!(!party.check_wins_victory("a"));
        assert!(!party.is_finished());
    }
}
