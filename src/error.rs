use std::path::PathBuf;

use thiserror::Error;

use crate::types::PlayerId;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid has no rows")]
    Empty,
    #[error("grid must be square: {rows} rows but row {row} has {cols} tiles")]
    NotSquare { rows: usize, row: usize, cols: usize },
    #[error("unknown tile kind digit {digit} in code {code}")]
    UnknownKind { code: u16, digit: u16 },
    #[error("unknown item digit {digit} in code {code}")]
    UnknownItem { code: u16, digit: u16 },
    #[error("unknown tile symbol {symbol:?} at row {row}, col {col}")]
    UnknownSymbol { symbol: char, row: usize, col: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombatError {
    #[error("no fight is active")]
    NoActiveFight,
    #[error("a fight is already active")]
    FightInProgress,
    #[error("player {0} is not part of the active fight")]
    UnknownFighter(PlayerId),
    #[error("a player cannot fight itself")]
    SelfFight,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
