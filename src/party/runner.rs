use tokio::sync::mpsc;

use crate::scheduler::{ManualClock, TimerFired};
use crate::types::InboundCommand;

use super::{Party, PartySummary};

pub async fn run_party(
    mut party: Party,
    mut commands: mpsc::UnboundedReceiver<InboundCommand>,
    mut timers: mpsc::UnboundedReceiver<TimerFired>,
) -> PartySummary {
    party.start();
    let mut commands_open = true;
    while !party.is_finished() {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(command) => party.dispatch(command),
                None => commands_open = false,
            },
            fired = timers.recv() => match fired {
                Some(fired) => party.on_timer(fired),
                None => break,
            },
        }
    }
    party.destroy();
    party.summary()
}

pub fn run_manual(party: &mut Party, clock: &ManualClock, max_events: usize) -> PartySummary {
    party.start();
    for _ in 0..max_events {
        if party.is_finished() {
            break;
        }
        let Some(fired) = clock.advance() else {
            break;
        };
        party.on_timer(fired);
    }
    party.summary()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::config::PartyConfig;
    use crate::constants::map_size_by_player_count;
    use crate::mapgen::generate_map;
    use crate::party::tests::start;
    use crate::party::PartyOptions;
    use crate::players::StartPlayer;
    use crate::scheduler::TokioTimers;
    use crate::types::{BotProfile, GameMode};

    fn bots(count: usize) -> Vec<StartPlayer> {
        (0..count)
            .map(|idx| {
                let profile = if idx % 2 == 0 {
                    BotProfile::Aggressive
                } else {
                    BotProfile::Defensive
                };
                start(&format!("bot-{idx}"), Some(profile))
            })
            .collect()
    }

    fn auto(max_rounds: u32) -> PartyOptions {
        PartyOptions {
            auto_acknowledge: true,
            max_rounds: Some(max_rounds),
        }
    }

    #[test]
    fn bots_only_party_keeps_board_consistent_until_finished() {
        for seed in 0..12u64 {
            let count = (seed % 3 + 2) as usize;
            let mode = if seed % 2 == 0 {
                GameMode::Classic
            } else {
                GameMode::CaptureTheFlag
            };
            let clock = ManualClock::new();
            let broadcaster = RecordingBroadcaster::new();
            let config = PartyConfig {
                mode,
                seed,
                ..PartyConfig::default()
            };
            let map = generate_map(map_size_by_player_count(count), count, seed, mode);
            let mut party = Party::new(
                format!("party-{seed}"),
                config,
                map,
                &bots(count),
                &clock,
                Arc::new(broadcaster.clone()),
                auto(120),
            );
            party.start();

            let mut fired_count = 0;
            while !party.is_finished() {
                let fired = clock.advance().expect("a running party keeps a timer armed");
                party.on_timer(fired);
                fired_count += 1;
                assert!(fired_count < 50_000, "seed={seed} runaway party");

                let positions: HashSet<_> = party.players().iter().map(|p| p.position).collect();
                assert_eq!(positions.len(), party.players().len(), "seed={seed}");
                for player in party.players().iter() {
                    assert!(player.items.len() <= 2, "seed={seed}");
                    assert!(party.grid().is_passable(player.position), "seed={seed}");
                }
            }

            let summary = party.summary();
            assert!(summary.winner.is_some() || summary.stalled, "seed={seed}");
            assert!(summary.stats.rounds > 0, "seed={seed}");
            assert_eq!(party.armed_timers(), 0, "seed={seed}");
            assert_eq!(clock.pending(), 0, "seed={seed}");
        }
    }

    #[test]
    fn run_manual_respects_event_cap() {
        let clock = ManualClock::new();
        let map = generate_map(10, 2, 5, GameMode::Classic);
        let mut party = Party::new(
            "capped",
            PartyConfig {
                seed: 5,
                ..PartyConfig::default()
            },
            map,
            &bots(2),
            &clock,
            Arc::new(RecordingBroadcaster::new()),
            PartyOptions {
                auto_acknowledge: true,
                max_rounds: None,
            },
        );
        let summary = run_manual(&mut party, &clock, 3);
        assert!(summary.stats.rounds <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_party_finishes_on_real_timers() {
        let (timers, timer_rx) = TokioTimers::channel();
        let (_commands_tx, commands_rx) = mpsc::unbounded_channel();
        let map = generate_map(10, 2, 11, GameMode::Classic);
        let party = Party::new(
            "tokio",
            PartyConfig {
                seed: 11,
                ..PartyConfig::default()
            },
            map,
            &bots(2),
            &timers,
            Arc::new(RecordingBroadcaster::new()),
            auto(40),
        );

        let summary = run_party(party, commands_rx, timer_rx).await;
        assert!(summary.winner.is_some() || summary.stalled);
        assert!(summary.stats.rounds > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_party_accepts_client_commands() {
        let (timers, timer_rx) = TokioTimers::channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let map = generate_map(10, 2, 2, GameMode::Classic);
        let party = Party::new(
            "humans",
            PartyConfig::default(),
            map,
            &[start("a", None), start("b", None)],
            &timers,
            Arc::new(RecordingBroadcaster::new()),
            PartyOptions {
                auto_acknowledge: false,
                max_rounds: Some(2),
            },
        );
        for player_id in ["a", "b"] {
            commands_tx
                .send(InboundCommand::BeginRound {
                    player_id: player_id.to_string(),
                })
                .expect("runner alive");
            commands_tx
                .send(InboundCommand::EndTurn {
                    player_id: player_id.to_string(),
                })
                .expect("runner alive");
        }

        let summary = run_party(party, commands_rx, timer_rx).await;
        assert!(summary.stalled);
        assert_eq!(summary.stats.rounds, 2);
    }
}
