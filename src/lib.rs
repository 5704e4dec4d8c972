pub mod broadcast;
pub mod combat;
pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod mapgen;
pub mod movement;
pub mod party;
pub mod players;
pub mod rng;
pub mod scheduler;
pub mod types;
pub mod virtual_player;
