use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_BOT_DELAY_MAX_MS, DEFAULT_BOT_DELAY_MIN_MS, DEFAULT_TURN_MS, DEFAULT_WINS_TO_VICTORY,
};
use crate::error::ConfigError;
use crate::types::GameMode;

pub const DEBUG_ENV: &str = "GRID_TACTICS_DEBUG";
pub const SEED_ENV: &str = "GRID_TACTICS_SEED";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartyConfig {
    pub debug_mode: bool,
    pub mode: GameMode,
    pub wins_to_victory: u32,
    pub turn_duration_ms: u64,
    pub bot_delay_min_ms: u64,
    pub bot_delay_max_ms: u64,
    pub seed: u64,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            debug_mode: false,
            mode: GameMode::Classic,
            wins_to_victory: DEFAULT_WINS_TO_VICTORY,
            turn_duration_ms: DEFAULT_TURN_MS,
            bot_delay_min_ms: DEFAULT_BOT_DELAY_MIN_MS,
            bot_delay_max_ms: DEFAULT_BOT_DELAY_MAX_MS,
            seed: 0,
        }
    }
}

impl PartyConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `GRID_TACTICS_DEBUG` and `GRID_TACTICS_SEED` on top of the
    /// current values. Unparseable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(DEBUG_ENV).ok().as_deref(),
            std::env::var(SEED_ENV).ok().as_deref(),
        )
    }

    fn with_overrides(mut self, debug: Option<&str>, seed: Option<&str>) -> Self {
        if let Some(value) = debug.and_then(parse_flag) {
            self.debug_mode = value;
        }
        if let Some(value) = seed.and_then(|raw| raw.trim().parse::<u64>().ok()) {
            self.seed = value;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wins_to_victory == 0 {
            return Err(ConfigError::Invalid(
                "winsToVictory must be at least 1".to_string(),
            ));
        }
        if self.bot_delay_min_ms > self.bot_delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "botDelayMinMs ({}) exceeds botDelayMaxMs ({})",
                self.bot_delay_min_ms, self.bot_delay_max_ms
            )));
        }
        if self.turn_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "turnDurationMs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
