use clap::Parser;
use grid_tactics_core::broadcast::RecordingBroadcaster;
use grid_tactics_core::config::PartyConfig;
use grid_tactics_core::constants::{map_size_by_player_count, MAX_INVENTORY};
use grid_tactics_core::mapgen::generate_map;
use grid_tactics_core::party::{run_party, Party, PartyOptions, PartySummary};
use grid_tactics_core::players::StartPlayer;
use grid_tactics_core::scheduler::{ManualClock, SchedulerSource, TokioTimers};
use grid_tactics_core::types::{BotProfile, DiceAssignment, GameMode, ItemKind, OutboundEvent};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

const EVENT_SAFETY_LIMIT: usize = 200_000;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    bots: Option<usize>,
    #[arg(long)]
    mode: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_rounds: Option<u32>,
    /// JSON party config; GRID_TACTICS_* environment variables still apply.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run on tokio timers in wall-clock time instead of the virtual clock.
    #[arg(long)]
    realtime: bool,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    name: String,
    bots: usize,
    mode: GameMode,
    seed: u64,
    max_rounds: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResultLine {
    scenario: String,
    seed: u64,
    bots: usize,
    mode: GameMode,
    outcome: String,
    winner: Option<String>,
    virtual_duration_ms: u64,
    rounds: u32,
    fights: u32,
    escapes: u32,
    slips: u32,
    doors_toggled: u32,
    respawns: u32,
    items_picked: u32,
    dice_rolls: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    event: usize,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    fired_events: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    match_id: String,
    started_at_ms: i64,
    finished_at_ms: i64,
    scenario_count: usize,
    anomaly_count: usize,
    average_rounds: u32,
    outcome_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredLogLine {
    timestamp_ms: i64,
    level: String,
    event: String,
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    details: Value,
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let base_config = match load_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            emit_log(
                "error",
                "config_invalid",
                "-",
                None,
                None,
                json!({ "error": message }),
            );
            std::process::exit(2);
        }
    };
    let scenarios = resolve_scenarios(&cli, &base_config);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut outcome_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            json!({
                "bots": scenario.bots,
                "mode": scenario.mode,
                "maxRounds": scenario.max_rounds,
                "realtime": cli.realtime,
            }),
        );
        let scenario_run = if cli.realtime {
            run_scenario_realtime(&scenario, &base_config)
        } else {
            run_scenario(&scenario, &base_config)
        };

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                json!({
                    "event": anomaly.event,
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        *outcome_counts
            .entry(scenario_run.result.outcome.clone())
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            json!({
                "outcome": scenario_run.result.outcome,
                "winner": scenario_run.result.winner,
                "rounds": scenario_run.result.rounds,
                "firedEvents": scenario_run.fired_events,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => tracing::error!(%error, "scenario result serialization failed"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        scenario_results,
        outcome_counts,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageRounds": summary.average_rounds,
            "outcomeCounts": summary.outcome_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<PartyConfig, String> {
    let config = match cli.config.as_deref() {
        Some(path) => PartyConfig::from_json_file(path).map_err(|error| error.to_string())?,
        None => PartyConfig::default(),
    };
    let config = config.with_env_overrides();
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

fn bot_players(count: usize) -> Vec<StartPlayer> {
    (0..count)
        .map(|idx| StartPlayer {
            id: format!("bot_{}", idx + 1),
            name: format!("BOT-{:02}", idx + 1),
            profile: Some(if idx % 2 == 0 {
                BotProfile::Aggressive
            } else {
                BotProfile::Defensive
            }),
            dice: if idx % 2 == 0 {
                DiceAssignment::ATTACK_D6
            } else {
                DiceAssignment::DEFENSE_D6
            },
        })
        .collect()
}

fn build_party(
    scenario: &Scenario,
    base_config: &PartyConfig,
    timers: &dyn SchedulerSource,
    broadcaster: &RecordingBroadcaster,
) -> Party {
    let config = PartyConfig {
        mode: scenario.mode,
        seed: scenario.seed,
        ..base_config.clone()
    };
    let map = generate_map(
        map_size_by_player_count(scenario.bots),
        scenario.bots,
        scenario.seed,
        scenario.mode,
    );
    Party::new(
        scenario.name.clone(),
        config,
        map,
        &bot_players(scenario.bots),
        timers,
        Arc::new(broadcaster.clone()),
        PartyOptions {
            auto_acknowledge: true,
            max_rounds: Some(scenario.max_rounds),
        },
    )
}

fn run_scenario(scenario: &Scenario, base_config: &PartyConfig) -> ScenarioRunResult {
    let clock = ManualClock::new();
    let broadcaster = RecordingBroadcaster::new();
    let mut party = build_party(scenario, base_config, &clock, &broadcaster);

    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut dice_rolls = 0usize;
    let mut fired_events = 0usize;

    party.start();
    while !party.is_finished() {
        let Some(fired) = clock.advance() else {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                fired_events,
                "party stopped with no timer armed".to_string(),
            );
            break;
        };
        party.on_timer(fired);
        fired_events += 1;
        for message in collect_board_anomalies(&party) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                fired_events,
                message,
            );
        }
        dice_rolls += broadcaster
            .drain()
            .iter()
            .filter(|event| matches!(event, OutboundEvent::DiceRollResult { .. }))
            .count();
        if fired_events > EVENT_SAFETY_LIMIT {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                fired_events,
                "event safety limit exceeded".to_string(),
            );
            break;
        }
    }
    party.destroy();

    ScenarioRunResult {
        result: result_line(
            scenario,
            &party.summary(),
            clock.now_ms(),
            dice_rolls,
            anomalies,
        ),
        anomaly_records,
        fired_events,
    }
}

fn run_scenario_realtime(scenario: &Scenario, base_config: &PartyConfig) -> ScenarioRunResult {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            let message = format!("tokio runtime failed to start: {error}");
            return ScenarioRunResult {
                result: result_line(
                    scenario,
                    &PartySummary {
                        party_id: scenario.name.clone(),
                        mode: scenario.mode,
                        winner: None,
                        stalled: false,
                        stats: Default::default(),
                        wins: BTreeMap::new(),
                        fight_log_entries: 0,
                    },
                    0,
                    0,
                    vec![message.clone()],
                ),
                anomaly_records: vec![AnomalyRecord { event: 0, message }],
                fired_events: 0,
            };
        }
    };
    let broadcaster = RecordingBroadcaster::new();
    let started = std::time::Instant::now();
    let summary = runtime.block_on(async {
        let (timers, timer_rx) = TokioTimers::channel();
        let (_commands_tx, commands_rx) = tokio::sync::mpsc::unbounded_channel();
        let party = build_party(scenario, base_config, &timers, &broadcaster);
        run_party(party, commands_rx, timer_rx).await
    });
    let dice_rolls = broadcaster.count("dice_roll_result");

    ScenarioRunResult {
        result: result_line(
            scenario,
            &summary,
            started.elapsed().as_millis() as u64,
            dice_rolls,
            Vec::new(),
        ),
        anomaly_records: Vec::new(),
        fired_events: broadcaster.snapshot().len(),
    }
}

fn result_line(
    scenario: &Scenario,
    summary: &PartySummary,
    virtual_duration_ms: u64,
    dice_rolls: usize,
    anomalies: Vec<String>,
) -> ScenarioResultLine {
    ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        bots: scenario.bots,
        mode: scenario.mode,
        outcome: outcome_key(summary).to_string(),
        winner: summary.winner.clone(),
        virtual_duration_ms,
        rounds: summary.stats.rounds,
        fights: summary.stats.fights,
        escapes: summary.stats.escapes,
        slips: summary.stats.slips,
        doors_toggled: summary.stats.doors_toggled,
        respawns: summary.stats.respawns,
        items_picked: summary.stats.items_picked,
        dice_rolls,
        anomalies,
    }
}

fn collect_board_anomalies(party: &Party) -> Vec<String> {
    let mut anomalies = Vec::new();
    let mut occupied = HashSet::new();
    let mut flags = party
        .grid()
        .item_positions()
        .iter()
        .filter(|(_, item)| *item == ItemKind::Flag)
        .count();

    for player in party.players().active() {
        if !occupied.insert(player.position) {
            anomalies.push(format!(
                "shared tile: {} at ({}, {})",
                player.id, player.position.x, player.position.y
            ));
        }
        if !party.grid().is_passable(player.position) {
            anomalies.push(format!("player on impassable tile: {}", player.id));
        }
        if player.items.len() > MAX_INVENTORY {
            anomalies.push(format!(
                "inventory overflow: {} holds {}",
                player.id,
                player.items.len()
            ));
        }
        if player.remaining_moves < 0 {
            anomalies.push(format!(
                "negative moves: {} {}",
                player.id, player.remaining_moves
            ));
        }
        flags += player
            .items
            .iter()
            .filter(|item| **item == ItemKind::Flag)
            .count();
    }

    if flags > 1 {
        anomalies.push(format!("duplicated flag: {flags} copies"));
    }
    if party.combat().is_active() && party.current_player_id().is_none() {
        anomalies.push("fight running without a current player".to_string());
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli, base_config: &PartyConfig) -> Vec<Scenario> {
    let seed = cli
        .seed
        .unwrap_or_else(|| if base_config.seed != 0 { base_config.seed } else { now_ms() as u64 });
    let mode = cli
        .mode
        .as_deref()
        .and_then(GameMode::parse)
        .unwrap_or(base_config.mode);
    let max_rounds = cli.max_rounds.unwrap_or(200).max(1);

    if cli.single || cli.bots.is_some() {
        let bots = cli.bots.unwrap_or(2).clamp(2, 8);
        return vec![Scenario {
            name: format!("custom-bots{bots}"),
            bots,
            mode,
            seed,
            max_rounds,
        }];
    }

    vec![
        Scenario {
            name: "duel-classic".to_string(),
            bots: 2,
            mode: GameMode::Classic,
            seed,
            max_rounds,
        },
        Scenario {
            name: "brawl-classic-bots4".to_string(),
            bots: 4,
            mode: GameMode::Classic,
            seed: seed.wrapping_add(1),
            max_rounds,
        },
        Scenario {
            name: "flag-bots4".to_string(),
            bots: 4,
            mode: GameMode::CaptureTheFlag,
            seed: seed.wrapping_add(2),
            max_rounds,
        },
    ]
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    event: usize,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        event,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u64, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: i64,
    finished_at_ms: i64,
    scenarios: Vec<ScenarioResultLine>,
    outcome_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let total_rounds: u32 = scenarios.iter().map(|scenario| scenario.rounds).sum();
    let average_rounds = if scenario_count == 0 {
        0
    } else {
        total_rounds / scenario_count as u32
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_rounds,
        outcome_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        details,
    };
    if let Ok(line) = serde_json::to_string(&log_line) {
        eprintln!("{line}");
    }
}

fn outcome_key(summary: &PartySummary) -> &'static str {
    if summary.winner.is_some() {
        "victory"
    } else if summary.stalled {
        "stalled"
    } else {
        "aborted"
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
