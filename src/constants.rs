use crate::types::DiceKind;

pub const MAX_ESCAPE_ATTEMPTS: u8 = 2;
pub const ESCAPE_CHANCE: f64 = 0.3;

pub const ROUND_MS: u64 = 5_000;
pub const ROUND_NO_ESCAPE_MS: u64 = 3_000;
pub const BOT_ROUND_DISCOUNT_MS: u64 = 2_000;

pub const ICE_SLIP_CHANCE: f64 = 0.1;

pub const MAX_INVENTORY: usize = 2;
pub const DEFAULT_WINS_TO_VICTORY: u32 = 3;
pub const DEFAULT_TURN_MS: u64 = 30_000;
pub const DEFAULT_BOT_DELAY_MIN_MS: u64 = 600;
pub const DEFAULT_BOT_DELAY_MAX_MS: u64 = 1_500;

pub const BASE_LIFE: i32 = 4;
pub const BASE_SPEED: i32 = 4;
pub const BASE_ATTACK: i32 = 4;
pub const BASE_DEFENSE: i32 = 4;
pub const BONUS_STAT: i32 = 2;
pub const POTION_BONUS_LIFE: i32 = 2;

pub const ACTIONS_PER_TURN: u8 = 1;

pub fn dice_faces(kind: DiceKind) -> i32 {
    match kind {
        DiceKind::D4 => 4,
        DiceKind::D6 => 6,
    }
}

pub fn round_duration_ms(remain_escape: u8, both_virtual: bool) -> u64 {
    let base = if remain_escape == 0 {
        ROUND_NO_ESCAPE_MS
    } else {
        ROUND_MS
    };
    if both_virtual {
        base.saturating_sub(BOT_ROUND_DISCOUNT_MS)
    } else {
        base
    }
}

pub fn escape_chance(remain_escape: u8) -> f64 {
    if remain_escape == 0 {
        0.0
    } else {
        ESCAPE_CHANCE
    }
}

pub fn full_map_budget(size: i32) -> i32 {
    size.saturating_mul(size).saturating_mul(2)
}

pub fn map_size_by_player_count(player_count: usize) -> i32 {
    if player_count <= 2 {
        return 10;
    }
    if player_count <= 4 {
        return 15;
    }
    20
}
