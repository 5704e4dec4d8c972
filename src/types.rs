use serde::{Deserialize, Serialize};

pub type PlayerId = String;

/// Internal grid coordinate: `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn is_adjacent(self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }

    pub fn to_wire(self) -> WirePos {
        WirePos {
            row: self.y,
            col: self.x,
        }
    }
}

/// Transposed `(row, col)` position used by every inbound command and
/// outbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WirePos {
    pub row: i32,
    pub col: i32,
}

impl WirePos {
    pub fn to_coord(self) -> Coord {
        Coord {
            x: self.col,
            y: self.row,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Normal,
    Wall,
    DoorClosed,
    DoorOpen,
    Ice,
    Water,
}

impl TileKind {
    pub fn is_door(self) -> bool {
        matches!(self, Self::DoorClosed | Self::DoorOpen)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Flag,
    Sword,
    Shield,
    Mirror,
    Potion,
    Wager,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        Self::Flag,
        Self::Sword,
        Self::Shield,
        Self::Mirror,
        Self::Potion,
        Self::Wager,
    ];

    pub fn boosts_attack(self) -> bool {
        matches!(self, Self::Sword | Self::Wager)
    }

    pub fn boosts_defense(self) -> bool {
        matches!(self, Self::Shield)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotProfile {
    Aggressive,
    Defensive,
}

impl BotProfile {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aggressive" => Some(Self::Aggressive),
            "defensive" => Some(Self::Defensive),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiceKind {
    D4,
    D6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceAssignment {
    pub attack: DiceKind,
    pub defense: DiceKind,
}

impl DiceAssignment {
    pub const ATTACK_D6: Self = Self {
        attack: DiceKind::D6,
        defense: DiceKind::D4,
    };
    pub const DEFENSE_D6: Self = Self {
        attack: DiceKind::D4,
        defense: DiceKind::D6,
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Classic,
    CaptureTheFlag,
}

impl GameMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "classic" => Some(Self::Classic),
            "ctf" | "capture_the_flag" => Some(Self::CaptureTheFlag),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundCommand {
    BeginRound {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    EndMoving {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    DoorOpened {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        door: WirePos,
    },
    EndFight,
    Attack {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    Evade {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    GiveUp {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    Move {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        destination: WirePos,
    },
    ToggleDoor {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        door: WirePos,
    },
    Engage {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        target: WirePos,
    },
    EndTurn {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    StartMoving {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        destination: WirePos,
    },
    StartFight {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "targetPos")]
        target_pos: WirePos,
    },
    OpenDoor {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "doorPos")]
        door_pos: WirePos,
    },
    EndRound {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    FightInitiated {
        initiator: PlayerId,
        opponent: PlayerId,
        #[serde(rename = "firstAttacker")]
        first_attacker: PlayerId,
    },
    UpdateCurrentAttacker {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "roundMs")]
        round_ms: u64,
        #[serde(rename = "canEvade")]
        can_evade: bool,
    },
    DiceRollResult {
        attacker: PlayerId,
        defender: PlayerId,
        #[serde(rename = "attackRoll")]
        attack_roll: i32,
        #[serde(rename = "defenseRoll")]
        defense_roll: i32,
        success: bool,
        #[serde(rename = "defenderLife")]
        defender_life: i32,
    },
    LifeSwapped {
        attacker: PlayerId,
        defender: PlayerId,
        #[serde(rename = "attackerLife")]
        attacker_life: i32,
        #[serde(rename = "defenderLife")]
        defender_life: i32,
    },
    BonusLifeGranted {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        life: i32,
    },
    EscapePassed {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    EscapeFailed {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "remainEscape")]
        remain_escape: u8,
    },
    FightTerminated {
        winner: Option<PlayerId>,
        loser: Option<PlayerId>,
        #[serde(rename = "endsRound")]
        ends_round: bool,
    },
    PlayerSlipped {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        at: WirePos,
    },
    PlayerRespawned {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        at: WirePos,
    },
    ItemsScattered {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        items: Vec<(ItemKind, WirePos)>,
    },
    PartyWon {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

impl OutboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartMoving { .. } => "start_moving",
            Self::StartFight { .. } => "start_fight",
            Self::OpenDoor { .. } => "open_door",
            Self::EndRound { .. } => "end_round",
            Self::FightInitiated { .. } => "fight_initiated",
            Self::UpdateCurrentAttacker { .. } => "update_current_attacker",
            Self::DiceRollResult { .. } => "dice_roll_result",
            Self::LifeSwapped { .. } => "life_swapped",
            Self::BonusLifeGranted { .. } => "bonus_life_granted",
            Self::EscapePassed { .. } => "escape_passed",
            Self::EscapeFailed { .. } => "escape_failed",
            Self::FightTerminated { .. } => "fight_terminated",
            Self::PlayerSlipped { .. } => "player_slipped",
            Self::PlayerRespawned { .. } => "player_respawned",
            Self::ItemsScattered { .. } => "items_scattered",
            Self::PartyWon { .. } => "party_won",
        }
    }
}
